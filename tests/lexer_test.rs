use mylox::frontend::lexer::Lexer;
use mylox::frontend::lexer::token::TokenType;

fn scan_kinds(source: &str) -> Vec<TokenType> {
    let mut lexer = Lexer::new(source);
    let mut kinds = Vec::new();
    loop {
        let token = lexer.next_token();
        let kind = token.kind;
        kinds.push(kind);
        if kind == TokenType::Eof {
            break;
        }
    }
    kinds
}

#[test]
fn scans_punctuation_and_operators() {
    let kinds = scan_kinds("( ) { } , . - + ; / * ! != = == > >= < <=");
    assert_eq!(
        kinds,
        vec![
            TokenType::LParen,
            TokenType::RParen,
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::Comma,
            TokenType::Dot,
            TokenType::Minus,
            TokenType::Plus,
            TokenType::Semicolon,
            TokenType::Slash,
            TokenType::Asterisk,
            TokenType::Bang,
            TokenType::BangEq,
            TokenType::Assign,
            TokenType::Eq,
            TokenType::Gt,
            TokenType::Geq,
            TokenType::Lt,
            TokenType::Leq,
            TokenType::Eof,
        ]
    );
}

#[test]
fn keywords_and_near_keywords() {
    // trie 的边界：前缀命中但没走完、走完还有多余字符，都得回落成标识符
    let kinds = scan_kinds("class classy f fun fund this thistle super var varnish");
    assert_eq!(
        kinds,
        vec![
            TokenType::KwClass,
            TokenType::Ident,
            TokenType::Ident,
            TokenType::KwFun,
            TokenType::Ident,
            TokenType::KwThis,
            TokenType::Ident,
            TokenType::KwSuper,
            TokenType::KwVar,
            TokenType::Ident,
            TokenType::Eof,
        ]
    );
}

#[test]
fn all_keywords_recognized() {
    let kinds = scan_kinds(
        "and class else false for fun if nil or print return super this true var while",
    );
    assert_eq!(
        kinds,
        vec![
            TokenType::KwAnd,
            TokenType::KwClass,
            TokenType::KwElse,
            TokenType::KwFalse,
            TokenType::KwFor,
            TokenType::KwFun,
            TokenType::KwIf,
            TokenType::KwNil,
            TokenType::KwOr,
            TokenType::KwPrint,
            TokenType::KwReturn,
            TokenType::KwSuper,
            TokenType::KwThis,
            TokenType::KwTrue,
            TokenType::KwVar,
            TokenType::KwWhile,
            TokenType::Eof,
        ]
    );
}

#[test]
fn numbers_with_and_without_fraction() {
    let mut lexer = Lexer::new("123 45.67 89.");
    let a = lexer.next_token();
    assert_eq!(a.kind, TokenType::NumLit);
    assert_eq!(a.lexeme, "123");

    let b = lexer.next_token();
    assert_eq!(b.kind, TokenType::NumLit);
    assert_eq!(b.lexeme, "45.67");

    // 小数点后没有数字：点是独立 token
    let c = lexer.next_token();
    assert_eq!(c.kind, TokenType::NumLit);
    assert_eq!(c.lexeme, "89");
    assert_eq!(lexer.next_token().kind, TokenType::Dot);
    assert_eq!(lexer.next_token().kind, TokenType::Eof);
}

#[test]
fn strings_keep_quotes_in_lexeme_and_may_span_lines() {
    let mut lexer = Lexer::new("\"hello\n world\" x");
    let token = lexer.next_token();
    assert_eq!(token.kind, TokenType::StrLit);
    assert_eq!(token.lexeme, "\"hello\n world\"");
    // 字符串里的换行计入行号
    assert_eq!(lexer.next_token().line, 2);
}

#[test]
fn line_comments_are_skipped() {
    let kinds = scan_kinds("var x; // var y;\nprint x;");
    assert_eq!(
        kinds,
        vec![
            TokenType::KwVar,
            TokenType::Ident,
            TokenType::Semicolon,
            TokenType::KwPrint,
            TokenType::Ident,
            TokenType::Semicolon,
            TokenType::Eof,
        ]
    );
}

#[test]
fn line_numbers_advance_on_newlines() {
    let mut lexer = Lexer::new("a\nb\n\nc");
    assert_eq!(lexer.next_token().line, 1);
    assert_eq!(lexer.next_token().line, 2);
    assert_eq!(lexer.next_token().line, 4);
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let mut lexer = Lexer::new("\"no closing quote");
    let token = lexer.next_token();
    assert_eq!(token.kind, TokenType::Errno);
    assert_eq!(token.lexeme, "unterminated string");
}

#[test]
fn unexpected_character_is_a_lex_error() {
    let mut lexer = Lexer::new("@");
    let token = lexer.next_token();
    assert_eq!(token.kind, TokenType::Errno);
    assert_eq!(token.lexeme, "unexpected character");
}

#[test]
fn identifiers_allow_underscores_and_digits() {
    let mut lexer = Lexer::new("_private snake_case x2");
    for expected in ["_private", "snake_case", "x2"] {
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenType::Ident);
        assert_eq!(token.lexeme, expected);
    }
}
