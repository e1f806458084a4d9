// Mylox compiler Pratt rule table
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-06: Precedence ladder and the prefix/infix dispatch table; every token
//            kind maps to at most one prefix and one infix parselet plus the
//            binding power its infix form parses at.

use crate::frontend::compiler::Compiler;
use crate::frontend::lexer::token::TokenType;

/// 低到高的优先级阶梯。parse_precedence(level) 只消费
/// 绑定力 ≥ level 的中缀算子。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    /// 左结合算子的右操作数在高一级解析。
    pub(crate) fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

pub(crate) type ParseFn<'src, 'h> = fn(&mut Compiler<'src, 'h>, bool);

pub(crate) struct ParseRule<'src, 'h> {
    pub prefix: Option<ParseFn<'src, 'h>>,
    pub infix: Option<ParseFn<'src, 'h>>,
    pub precedence: Precedence,
}

fn rule<'src, 'h>(
    prefix: Option<ParseFn<'src, 'h>>,
    infix: Option<ParseFn<'src, 'h>>,
    precedence: Precedence,
) -> ParseRule<'src, 'h> {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

pub(crate) fn get_rule<'src, 'h>(kind: TokenType) -> ParseRule<'src, 'h> {
    match kind {
        TokenType::LParen => rule(
            Some(Compiler::grouping),
            Some(Compiler::call),
            Precedence::Call,
        ),
        TokenType::Dot => rule(None, Some(Compiler::dot), Precedence::Call),
        TokenType::Minus => rule(
            Some(Compiler::unary),
            Some(Compiler::binary),
            Precedence::Term,
        ),
        TokenType::Plus => rule(None, Some(Compiler::binary), Precedence::Term),
        TokenType::Slash | TokenType::Asterisk => {
            rule(None, Some(Compiler::binary), Precedence::Factor)
        }
        TokenType::Bang => rule(Some(Compiler::unary), None, Precedence::None),
        TokenType::BangEq | TokenType::Eq => {
            rule(None, Some(Compiler::binary), Precedence::Equality)
        }
        TokenType::Gt | TokenType::Geq | TokenType::Lt | TokenType::Leq => {
            rule(None, Some(Compiler::binary), Precedence::Comparison)
        }
        TokenType::Ident => rule(Some(Compiler::variable), None, Precedence::None),
        TokenType::StrLit => rule(Some(Compiler::string), None, Precedence::None),
        TokenType::NumLit => rule(Some(Compiler::number), None, Precedence::None),
        TokenType::KwAnd => rule(None, Some(Compiler::and_op), Precedence::And),
        TokenType::KwOr => rule(None, Some(Compiler::or_op), Precedence::Or),
        TokenType::KwNil | TokenType::KwTrue | TokenType::KwFalse => {
            rule(Some(Compiler::literal), None, Precedence::None)
        }
        TokenType::KwSuper => rule(Some(Compiler::super_expr), None, Precedence::None),
        TokenType::KwThis => rule(Some(Compiler::this_expr), None, Precedence::None),
        _ => rule(None, None, Precedence::None),
    }
}
