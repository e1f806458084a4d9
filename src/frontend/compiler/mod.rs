// Mylox single-pass compiler
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-06: Initial Pratt parser skeleton emitting straight into a chunk; no AST,
//            one token of lookahead (previous/current), panic-mode error recovery
//            with synchronize() at statement boundaries.
// 2026-06-11: Lexical scope resolution: per-function local slots, shadowing checks,
//            read-in-own-initializer detection; nested function compilation as a
//            stack of FuncCompiler frames.
// 2026-06-13: Upvalue capture across arbitrary nesting depth with deduplication;
//            scope exit emits CloseUpvalue for captured locals and Pop otherwise.
// 2026-06-15: Class compilation: method tables, 'init' initializers, 'this' as the
//            reserved slot-zero local, superclass scope with the synthetic 'super'
//            local, and super dispatch.
// 2026-06-17: Backpatched jumps/loops with 16-bit big-endian operands; compile
//            errors are collected so one pass can report several of them.

pub mod expr;
pub mod rules;
pub mod stmt;

use crate::backend::vm::LogLevel;
use crate::backend::vm::heap::Heap;
use crate::common::chunk::Chunk;
use crate::common::disassemble::disassemble_chunk;
use crate::common::object::{FunctionData, Gc, Value};
use crate::common::opcode::OpCode;
use crate::frontend::lexer::Lexer;
use crate::frontend::lexer::token::{Token, TokenType};

/// 单个函数最多 256 个局部变量槽位 / 256 个 upvalue。
pub(crate) const MAX_LOCALS: usize = 256;
pub(crate) const MAX_UPVALUES: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

pub(crate) struct Local<'src> {
    pub name: &'src str,
    /// -1 表示已声明未初始化
    pub depth: i32,
    pub is_captured: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct UpvalueRef {
    pub index: u8,
    pub is_local: bool,
}

/// 每编译一个函数就压一层。槽位 0 保留给被调者自己：
/// 方法和 initializer 里它叫 "this"，其余场合是匿名的。
pub(crate) struct FuncCompiler<'src> {
    pub kind: FunctionKind,
    pub function: FunctionData,
    pub locals: Vec<Local<'src>>,
    pub upvalues: Vec<UpvalueRef>,
    pub scope_depth: i32,
}

pub(crate) struct ClassCompiler {
    pub has_superclass: bool,
}

pub struct Compiler<'src, 'h> {
    lexer: Lexer<'src>,
    pub(crate) previous: Token<'src>,
    pub(crate) current: Token<'src>,
    pub(crate) had_error: bool,
    pub(crate) panic_mode: bool,
    pub(crate) errors: Vec<CompileError>,
    pub(crate) funcs: Vec<FuncCompiler<'src>>,
    pub(crate) classes: Vec<ClassCompiler>,
    pub(crate) heap: &'h mut Heap,
    log_level: LogLevel,
}

/// 编译入口：成功返回顶层脚本的函数原型，失败返回收集到的全部错误。
pub fn compile<'h>(
    source: &str,
    heap: &'h mut Heap,
    log_level: LogLevel,
) -> Result<Gc<FunctionData>, Vec<CompileError>> {
    let mut compiler = Compiler::new(source, heap, log_level);
    compiler.advance();
    while !compiler.match_token(TokenType::Eof) {
        compiler.declaration();
    }
    compiler.finish()
}

impl<'src, 'h> Compiler<'src, 'h> {
    fn new(source: &'src str, heap: &'h mut Heap, log_level: LogLevel) -> Self {
        let placeholder = Token {
            kind: TokenType::Eof,
            lexeme: "",
            line: 0,
        };
        let mut compiler = Self {
            lexer: Lexer::new(source),
            previous: placeholder,
            current: placeholder,
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
            funcs: Vec::new(),
            classes: Vec::new(),
            heap,
            log_level,
        };
        compiler.push_func_compiler(FunctionKind::Script);
        compiler
    }

    fn finish(mut self) -> Result<Gc<FunctionData>, Vec<CompileError>> {
        let (function, _) = self.end_compiler();
        if self.had_error {
            return Err(self.errors);
        }
        if matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!("[DEBUG] Compilation finished without errors.");
        }
        Ok(function)
    }

    // ---------- token 流 ----------

    pub(crate) fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenType::Errno {
                break;
            }
            // Errno 的 lexeme 就是词法错误消息
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenType, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(crate) fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ---------- 错误报告 ----------

    pub(crate) fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    pub(crate) fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    /// panic 模式下后续错误一律吞掉，直到 synchronize() 清场。
    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let place = match token.kind {
            TokenType::Eof => " at end".to_string(),
            TokenType::Errno => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        self.errors.push(CompileError {
            line: token.line,
            message: format!("[line {}] error{}: {}", token.line, place, message),
        });
    }

    pub(crate) fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }
            match self.current.kind {
                TokenType::KwClass
                | TokenType::KwFun
                | TokenType::KwVar
                | TokenType::KwFor
                | TokenType::KwIf
                | TokenType::KwWhile
                | TokenType::KwPrint
                | TokenType::KwReturn => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ---------- 发射 ----------

    pub(crate) fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.funcs.last_mut().unwrap().function.chunk
    }

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    pub(crate) fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    pub(crate) fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    pub(crate) fn emit_op_byte(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    pub(crate) fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.current_chunk().add_constant(value);
        if index > u8::MAX as usize {
            self.error("too many constants in one chunk");
            return 0;
        }
        index as u8
    }

    pub(crate) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_byte(OpCode::Constant, index);
    }

    /// 写入 op 和两个 0xFF 占位字节，返回待回填的操作数 offset。
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code.len() - 2
    }

    pub(crate) fn patch_jump(&mut self, offset: usize) {
        // -2 抵掉操作数本身的两个字节
        let jump = self.current_chunk().code.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("too much code to jump over");
        }

        let code = &mut self.current_chunk().code;
        code[offset] = ((jump >> 8) & 0xff) as u8;
        code[offset + 1] = (jump & 0xff) as u8;
    }

    pub(crate) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);

        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("loop body too large");
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    pub(crate) fn emit_return(&mut self) {
        if self.funcs.last().unwrap().kind == FunctionKind::Initializer {
            // initializer 隐式返回实例自身（槽位 0）
            self.emit_op_byte(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    // ---------- 函数编译帧 ----------

    pub(crate) fn push_func_compiler(&mut self, kind: FunctionKind) {
        let name = if kind == FunctionKind::Script {
            std::ptr::null_mut()
        } else {
            self.heap.intern(self.previous.lexeme.to_string())
        };
        let slot_zero = if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
            "this"
        } else {
            ""
        };

        let mut locals = Vec::with_capacity(8);
        locals.push(Local {
            name: slot_zero,
            depth: 0,
            is_captured: false,
        });

        self.funcs.push(FuncCompiler {
            kind,
            function: FunctionData {
                arity: 0,
                upvalue_count: 0,
                chunk: Chunk::new(),
                name,
            },
            locals,
            upvalues: Vec::new(),
            scope_depth: 0,
        });
    }

    pub(crate) fn end_compiler(&mut self) -> (Gc<FunctionData>, Vec<UpvalueRef>) {
        self.emit_return();

        let frame = self.funcs.pop().unwrap();
        let mut function = frame.function;
        function.upvalue_count = frame.upvalues.len() as u16;

        if matches!(self.log_level, LogLevel::Trace) && !self.had_error {
            let name = if function.name.is_null() {
                "<script>".to_string()
            } else {
                unsafe { (*function.name).data.chars.clone() }
            };
            print!("{}", disassemble_chunk(&function.chunk, &name));
        }

        (self.heap.alloc_function(function), frame.upvalues)
    }

    // ---------- 作用域与变量 ----------

    pub(crate) fn begin_scope(&mut self) {
        self.funcs.last_mut().unwrap().scope_depth += 1;
    }

    pub(crate) fn end_scope(&mut self) {
        self.funcs.last_mut().unwrap().scope_depth -= 1;

        loop {
            let captured = {
                let func = self.funcs.last().unwrap();
                match func.locals.last() {
                    Some(local) if local.depth > func.scope_depth => local.is_captured,
                    _ => break,
                }
            };
            // 被捕获的局部变量离开作用域时要先搬进 upvalue 单元
            if captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.funcs.last_mut().unwrap().locals.pop();
        }
    }

    pub(crate) fn add_local(&mut self, name: &'src str) {
        if self.funcs.last().unwrap().locals.len() == MAX_LOCALS {
            self.error("too many local variables in function");
            return;
        }
        self.funcs.last_mut().unwrap().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    pub(crate) fn declare_variable(&mut self) {
        let name = self.previous.lexeme;
        let func = self.funcs.last().unwrap();
        if func.scope_depth == 0 {
            return;
        }

        let mut duplicate = false;
        for local in func.locals.iter().rev() {
            if local.depth != -1 && local.depth < func.scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("already a variable with this name in this scope");
        }
        self.add_local(name);
    }

    pub(crate) fn mark_initialized(&mut self) {
        let func = self.funcs.last_mut().unwrap();
        if func.scope_depth == 0 {
            return;
        }
        let depth = func.scope_depth;
        func.locals.last_mut().unwrap().depth = depth;
    }

    pub(crate) fn identifier_constant(&mut self, token: Token<'src>) -> u8 {
        let name = self.heap.intern(token.lexeme.to_string());
        self.make_constant(Value::Str(name))
    }

    pub(crate) fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenType::Ident, message);
        self.declare_variable();
        if self.funcs.last().unwrap().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(self.previous)
    }

    pub(crate) fn define_variable(&mut self, global: u8) {
        if self.funcs.last().unwrap().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_byte(OpCode::DefineGlobal, global);
    }

    /// 自顶向下扫当前函数的局部变量；命中未初始化的槽位说明
    /// 初始化表达式里引用了自己。
    pub(crate) fn resolve_local(&mut self, func_idx: usize, name: &str) -> Option<u8> {
        let mut result = None;
        let mut uninitialized = false;
        {
            let func = &self.funcs[func_idx];
            for (slot, local) in func.locals.iter().enumerate().rev() {
                if local.name == name {
                    if local.depth == -1 {
                        uninitialized = true;
                    }
                    result = Some(slot as u8);
                    break;
                }
            }
        }
        if uninitialized {
            self.error("cannot read local variable in its own initializer");
        }
        result
    }

    /// 逐层向外找：外层局部变量命中则标记捕获；否则递归到更外层的
    /// upvalue。每层都会在自己的 upvalue 表里去重登记。
    pub(crate) fn resolve_upvalue(&mut self, func_idx: usize, name: &str) -> Option<u8> {
        if func_idx == 0 {
            return None;
        }

        if let Some(local) = self.resolve_local(func_idx - 1, name) {
            self.funcs[func_idx - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(func_idx, local, true));
        }

        if let Some(upvalue) = self.resolve_upvalue(func_idx - 1, name) {
            return Some(self.add_upvalue(func_idx, upvalue, false));
        }

        None
    }

    pub(crate) fn add_upvalue(&mut self, func_idx: usize, index: u8, is_local: bool) -> u8 {
        {
            let upvalues = &self.funcs[func_idx].upvalues;
            for (i, upvalue) in upvalues.iter().enumerate() {
                if upvalue.index == index && upvalue.is_local == is_local {
                    return i as u8;
                }
            }
        }

        if self.funcs[func_idx].upvalues.len() == MAX_UPVALUES {
            self.error("too many closure variables in function");
            return 0;
        }

        self.funcs[func_idx]
            .upvalues
            .push(UpvalueRef { index, is_local });
        (self.funcs[func_idx].upvalues.len() - 1) as u8
    }
}
