// Mylox compiler opcode definitions
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-06-02: Initial version, single-byte stack machine encoding
//      26-06-09: Closure / upvalue instructions
//      26-06-15: Class, method and super dispatch instructions

use num_enum::TryFromPrimitive;

/// 字节码指令。操作数直接跟在 opcode 字节后面：
/// 常量类指令带 1 字节常量池下标，跳转类指令带 2 字节大端偏移，
/// Closure 在常量下标之后额外带 upvalue_count 对 (is_local, index) 字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    /// push K[byte]
    Constant,
    /// push nil
    Nil,
    /// push true
    True,
    /// push false
    False,
    /// drop the stack top
    Pop,

    /// push slots[byte]
    GetLocal,
    /// slots[byte] = peek(0)
    SetLocal,
    /// push globals[K[byte]]; runtime error when undefined
    GetGlobal,
    /// globals[K[byte]] = pop()
    DefineGlobal,
    /// globals[K[byte]] = peek(0); runtime error when undefined
    SetGlobal,
    /// push *upvalues[byte]
    GetUpvalue,
    /// *upvalues[byte] = peek(0)
    SetUpvalue,
    /// field read on peek(0), falls back to method binding
    GetProperty,
    /// peek(1).field = peek(0); pops the instance, leaves the value
    SetProperty,
    /// pop superclass, bind method K[byte] of it to peek(0)
    GetSuper,

    /// push a == b
    Equal,
    /// push a > b (numbers only)
    Greater,
    /// push a < b (numbers only)
    Less,
    /// numbers add, strings concatenate
    Add,
    Subtract,
    Multiply,
    Divide,
    /// push !truthy(pop())
    Not,
    /// arithmetic negate of the stack top
    Negate,

    /// print pop() followed by a newline
    Print,

    /// ip += u16
    Jump,
    /// ip += u16 when peek(0) is falsy; does not pop
    JumpIfFalse,
    /// ip -= u16
    Loop,

    /// callee at peek(argc); operand byte is argc
    Call,
    /// K[byte] property name + argc byte; receiver at peek(argc)
    Invoke,
    /// like Invoke, but dispatches on the popped superclass
    SuperInvoke,
    /// wrap K[byte] prototype in a closure, capturing its upvalues
    Closure,
    /// hoist the stack-top local into its upvalue cell and pop it
    CloseUpvalue,
    /// pop the result, close frame upvalues, unwind one call frame
    Return,

    /// push a new class named K[byte]
    Class,
    /// copy peek(1) superclass methods into peek(0) subclass; pops subclass
    Inherit,
    /// peek(1).methods[K[byte]] = peek(0); pops the closure
    Method,
}
