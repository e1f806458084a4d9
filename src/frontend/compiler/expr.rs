// Mylox compiler expression parselets
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-07: Literals, grouping, unary/binary operators driven by the rule table.
// 2026-06-12: Variable access compiled against local → upvalue → global in that
//            order; assignment targets validated through the can_assign flag.
// 2026-06-15: Calls, property access with invoke fast path, 'this' and 'super'.

use crate::common::object::Value;
use crate::common::opcode::OpCode;
use crate::frontend::compiler::Compiler;
use crate::frontend::compiler::rules::{Precedence, get_rule};
use crate::frontend::lexer::token::{Token, TokenType};

impl<'src, 'h> Compiler<'src, 'h> {
    pub(crate) fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Pratt 主循环：先跑前缀，然后只要下一个 token 的中缀绑定力
    /// 不低于 level 就继续吃。收尾时吊着的 '=' 说明赋值目标不合法。
    pub(crate) fn parse_precedence(&mut self, level: Precedence) {
        self.advance();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error("expect expression");
            return;
        };

        let can_assign = level <= Precedence::Assignment;
        prefix(self, can_assign);

        while level <= get_rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = get_rule(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenType::Assign) {
            self.error("invalid assignment target");
        }
    }

    pub(crate) fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    pub(crate) fn string(&mut self, _can_assign: bool) {
        // 去掉首尾引号，内容原样 intern（不处理转义）
        let lexeme = self.previous.lexeme;
        let interior = &lexeme[1..lexeme.len() - 1];
        let interned = self.heap.intern(interior.to_string());
        self.emit_constant(Value::Str(interned));
    }

    pub(crate) fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenType::KwNil => self.emit_op(OpCode::Nil),
            TokenType::KwTrue => self.emit_op(OpCode::True),
            TokenType::KwFalse => self.emit_op(OpCode::False),
            _ => unreachable!("literal parselet on non-literal token"),
        }
    }

    pub(crate) fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenType::RParen, "expect ')' after expression");
    }

    pub(crate) fn unary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match op_kind {
            TokenType::Bang => self.emit_op(OpCode::Not),
            TokenType::Minus => self.emit_op(OpCode::Negate),
            _ => unreachable!("unary parselet on non-unary token"),
        }
    }

    pub(crate) fn binary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        let precedence = get_rule(op_kind).precedence;
        self.parse_precedence(precedence.next());

        match op_kind {
            TokenType::BangEq => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenType::Eq => self.emit_op(OpCode::Equal),
            TokenType::Gt => self.emit_op(OpCode::Greater),
            // a >= b 即 !(a < b)，a <= b 即 !(a > b)
            TokenType::Geq => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenType::Lt => self.emit_op(OpCode::Less),
            TokenType::Leq => self.emit_ops(OpCode::Greater, OpCode::Not),
            TokenType::Plus => self.emit_op(OpCode::Add),
            TokenType::Minus => self.emit_op(OpCode::Subtract),
            TokenType::Asterisk => self.emit_op(OpCode::Multiply),
            TokenType::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary parselet on non-binary token"),
        }
    }

    /// and 短路：左值为假直接跳过右侧，左值留在栈上当结果。
    pub(crate) fn and_op(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    /// or 短路：左值为假才落入右侧。
    pub(crate) fn or_op(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    pub(crate) fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op_byte(OpCode::Call, argc);
    }

    pub(crate) fn dot(&mut self, can_assign: bool) {
        self.consume(TokenType::Ident, "expect property name after '.'");
        let name = self.identifier_constant(self.previous);

        if can_assign && self.match_token(TokenType::Assign) {
            self.expression();
            self.emit_op_byte(OpCode::SetProperty, name);
        } else if self.match_token(TokenType::LParen) {
            // obj.m(...) 不物化 bound method，直接按方法调用
            let argc = self.argument_list();
            self.emit_op_byte(OpCode::Invoke, name);
            self.emit_byte(argc);
        } else {
            self.emit_op_byte(OpCode::GetProperty, name);
        }
    }

    pub(crate) fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.previous, can_assign);
    }

    pub(crate) fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let func_idx = self.funcs.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(func_idx, name.lexeme) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(index) = self.resolve_upvalue(func_idx, name.lexeme) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, index)
        } else {
            let constant = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenType::Assign) {
            self.expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }

    pub(crate) fn this_expr(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("cannot use 'this' outside of a class");
            return;
        }
        // 'this' 就是方法帧的 0 号局部变量，嵌套函数里会升级成 upvalue
        self.variable(false);
    }

    pub(crate) fn super_expr(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("cannot use 'super' outside of a class");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("cannot use 'super' in a class with no superclass");
        }

        self.consume(TokenType::Dot, "expect '.' after 'super'");
        self.consume(TokenType::Ident, "expect superclass method name");
        let name = self.identifier_constant(self.previous);

        self.named_variable(Token::synthetic("this"), false);
        if self.match_token(TokenType::LParen) {
            let argc = self.argument_list();
            self.named_variable(Token::synthetic("super"), false);
            self.emit_op_byte(OpCode::SuperInvoke, name);
            self.emit_byte(argc);
        } else {
            self.named_variable(Token::synthetic("super"), false);
            self.emit_op_byte(OpCode::GetSuper, name);
        }
    }

    pub(crate) fn argument_list(&mut self) -> u8 {
        let mut argc: usize = 0;
        if !self.check(TokenType::RParen) {
            loop {
                self.expression();
                if argc == 255 {
                    self.error("cannot have more than 255 arguments");
                } else {
                    argc += 1;
                }
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "expect ')' after arguments");
        argc as u8
    }
}
