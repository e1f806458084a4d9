// Mylox compiler statements and declarations
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-08: Statement dispatch, var declarations, blocks, print/expression
//            statements; panic-mode recovery hooks at declaration boundaries.
// 2026-06-12: Control flow: if/else, while, and the three-clause for statement
//            with the increment compiled ahead of the body behind a jump.
// 2026-06-15: Function and class declarations; methods compile against the class
//            context so 'init' gets initializer semantics.

use crate::common::opcode::OpCode;
use crate::frontend::compiler::{ClassCompiler, Compiler, FunctionKind};
use crate::frontend::lexer::token::TokenType;

impl<'src, 'h> Compiler<'src, 'h> {
    pub(crate) fn declaration(&mut self) {
        if self.match_token(TokenType::KwClass) {
            self.class_declaration();
        } else if self.match_token(TokenType::KwFun) {
            self.fun_declaration();
        } else if self.match_token(TokenType::KwVar) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    pub(crate) fn statement(&mut self) {
        if self.match_token(TokenType::KwPrint) {
            self.print_statement();
        } else if self.match_token(TokenType::KwIf) {
            self.if_statement();
        } else if self.match_token(TokenType::KwReturn) {
            self.return_statement();
        } else if self.match_token(TokenType::KwWhile) {
            self.while_statement();
        } else if self.match_token(TokenType::KwFor) {
            self.for_statement();
        } else if self.match_token(TokenType::LBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("expect variable name");

        if self.match_token(TokenType::Assign) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(
            TokenType::Semicolon,
            "expect ';' after variable declaration",
        );

        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("expect function name");
        // 先标记已初始化，函数体内才能递归引用自己
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    fn class_declaration(&mut self) {
        self.consume(TokenType::Ident, "expect class name");
        let class_name = self.previous;
        let name_constant = self.identifier_constant(self.previous);
        self.declare_variable();

        self.emit_op_byte(OpCode::Class, name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassCompiler {
            has_superclass: false,
        });

        if self.match_token(TokenType::Lt) {
            self.consume(TokenType::Ident, "expect superclass name");
            self.variable(false);

            if class_name.lexeme == self.previous.lexeme {
                self.error("a class cannot inherit from itself");
            }

            // 'super' 活在只包住类体的局部作用域里
            self.begin_scope();
            self.add_local("super");
            self.define_variable(0);

            self.named_variable(class_name, false);
            self.emit_op(OpCode::Inherit);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        // 方法编译期间类对象要在栈顶
        self.named_variable(class_name, false);
        self.consume(TokenType::LBrace, "expect '{' before class body");
        while !self.check(TokenType::RBrace) && !self.check(TokenType::Eof) {
            self.method();
        }
        self.consume(TokenType::RBrace, "expect '}' after class body");
        self.emit_op(OpCode::Pop);

        if self.classes.last().unwrap().has_superclass {
            self.end_scope();
        }
        self.classes.pop();
    }

    fn method(&mut self) {
        self.consume(TokenType::Ident, "expect method name");
        let constant = self.identifier_constant(self.previous);

        let kind = if self.previous.lexeme == "init" {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };
        self.function(kind);

        self.emit_op_byte(OpCode::Method, constant);
    }

    pub(crate) fn function(&mut self, kind: FunctionKind) {
        self.push_func_compiler(kind);
        self.begin_scope();

        self.consume(TokenType::LParen, "expect '(' after function name");
        if !self.check(TokenType::RParen) {
            loop {
                if self.funcs.last().unwrap().function.arity == 255 {
                    self.error_at_current("cannot have more than 255 parameters");
                } else {
                    self.funcs.last_mut().unwrap().function.arity += 1;
                }
                let constant = self.parse_variable("expect parameter name");
                self.define_variable(constant);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "expect ')' after parameters");

        self.consume(TokenType::LBrace, "expect '{' before function body");
        self.block();

        // 编译帧弹出后作用域随之消失，不需要 end_scope
        let (function, upvalues) = self.end_compiler();
        let constant = self.make_constant(crate::common::object::Value::Function(function));
        self.emit_op_byte(OpCode::Closure, constant);

        for upvalue in upvalues {
            self.emit_byte(u8::from(upvalue.is_local));
            self.emit_byte(upvalue.index);
        }
    }

    pub(crate) fn block(&mut self) {
        while !self.check(TokenType::RBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::RBrace, "expect '}' after block");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "expect ';' after value");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "expect ';' after expression");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::LParen, "expect '(' after 'if'");
        self.expression();
        self.consume(TokenType::RParen, "expect ')' after condition");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenType::KwElse) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().code.len();

        self.consume(TokenType::LParen, "expect '(' after 'while'");
        self.expression();
        self.consume(TokenType::RParen, "expect ')' after condition");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    /// for 的三段都可选。增量子句先于循环体出现在字节码里，
    /// 用一个前跳绕过去，回跳链保证它在每轮循环体之后执行。
    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenType::LParen, "expect '(' after 'for'");

        if self.match_token(TokenType::Semicolon) {
            // 无初始化
        } else if self.match_token(TokenType::KwVar) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().code.len();

        let mut exit_jump = None;
        if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "expect ';' after loop condition");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenType::RParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code.len();

            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenType::RParen, "expect ')' after for clauses");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit) = exit_jump {
            self.patch_jump(exit);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.funcs.last().unwrap().kind == FunctionKind::Script {
            self.error("cannot return from top-level code");
        }

        if self.match_token(TokenType::Semicolon) {
            self.emit_return();
            return;
        }

        if self.funcs.last().unwrap().kind == FunctionKind::Initializer {
            self.error("cannot return a value from an initializer");
        }
        self.expression();
        self.consume(TokenType::Semicolon, "expect ';' after return value");
        self.emit_op(OpCode::Return);
    }
}
