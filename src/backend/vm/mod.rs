// Mylox virtual machine
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-09: VM state: value stack, call frame array, globals table, heap and the
//            open-upvalue chain; interpret() drives compile -> top-level closure ->
//            dispatch loop and maps the outcome to an InterpretResult.
// 2026-06-14: Runtime errors capture a full stack trace ([line N] in f()) before
//            the stacks are reset, and the last error is retained for inspection.
// 2026-06-19: Garbage collection wired to the dispatch safepoint: roots are the
//            value stack, frame closures, open upvalues, globals and the reserved
//            "init" string; tracing goes through the heap's gray stack; sweep
//            statistics logged at --mode debug.
// 2026-06-21: Print output goes through an injectable writer so tests can capture
//            program output in-process; --gc-stress collects at every safepoint.

pub mod dispatch;
pub mod error;
pub mod heap;
pub mod stack;
mod std_lib;

use crate::backend::vm::error::{ErrorKind, TraceFrame, VMError};
use crate::backend::vm::heap::Heap;
use crate::backend::vm::stack::CallFrame;
use crate::common::hash::Table;
use crate::frontend::compiler::compile;
use clap::ValueEnum;
use crate::common::object::{Gc, StrData, UpvalueData, Value};
use std::io::Write;
use std::ptr::null_mut;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Release, // 仅输出程序结果
    Debug,   // 编译与 GC 里程碑
    Trace,   // 反汇编 + 全量指令追踪
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

pub const FRAMES_MAX: usize = 64;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

pub struct VirtualMachine {
    pub frames: Vec<CallFrame>,
    pub stack: Vec<Value>,
    pub globals: Table,
    pub heap: Heap,
    /// 按栈槽位降序排列的 open upvalue 链
    pub open_upvalues: Gc<UpvalueData>,
    /// 保留字 "init"，类调用时用它找 initializer
    pub init_string: Gc<StrData>,
    pub log_level: LogLevel,
    /// 每个安全点都强制收集，专供 GC 压力测试
    pub gc_stress: bool,
    /// 最近一次 interpret 的运行时错误，测试用
    pub last_error: Option<VMError>,
    out: Box<dyn Write>,
}

impl VirtualMachine {
    pub fn new(log_level: LogLevel) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init".to_string());

        let mut vm = Self {
            frames: Vec::with_capacity(FRAMES_MAX),
            stack: Vec::with_capacity(STACK_MAX),
            globals: Table::new(),
            heap,
            open_upvalues: null_mut(),
            init_string,
            log_level,
            gc_stress: false,
            last_error: None,
            out: Box::new(std::io::stdout()),
        };
        vm.load_standard_library();
        vm
    }

    /// 替换 print 的输出目标（默认标准输出）。
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// 编译并执行一段源码。编译错误打到 stderr；运行时错误
    /// 打印消息和栈回溯后重置两个栈，让 REPL 可以继续。
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        self.last_error = None;

        let function = match compile(source, &mut self.heap, self.log_level) {
            Ok(function) => function,
            Err(errors) => {
                for error in &errors {
                    eprintln!("{}", error);
                }
                return InterpretResult::CompileError;
            }
        };

        let closure = self.heap.alloc_closure(function);
        self.stack.push(Value::Closure(closure));

        let outcome = match self.call_closure(closure, 0) {
            Ok(()) => self.run(),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(()) => InterpretResult::Ok,
            Err(error) => {
                self.report_error(&error);
                self.last_error = Some(error);
                self.reset_stacks();
                InterpretResult::RuntimeError
            }
        }
    }

    fn reset_stacks(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = null_mut();
    }

    fn report_error(&self, error: &VMError) {
        eprint!("{}", error);
    }

    /// 带当前调用栈快照构造一个运行时错误。行号取各帧 ip 的前一个
    /// 字节：行号表按字节记账，落在指令中间也能取到正确的行。
    pub(crate) fn error(&self, kind: ErrorKind) -> VMError {
        let mut trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let (line, name) = unsafe {
                let function = &(*(*frame.closure).data.function).data;
                let line = function.chunk.get_line(frame.ip.saturating_sub(1));
                let name = if function.name.is_null() {
                    String::new()
                } else {
                    (*function.name).data.chars.clone()
                };
                (line, name)
            };
            trace.push(TraceFrame { line, name });
        }
        VMError { kind, trace }
    }

    // ---------- 栈与指令流 ----------

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Value {
        self.stack.pop().unwrap()
    }

    pub(crate) fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let byte = unsafe { (&(*(*frame.closure).data.function).data.chunk.code)[frame.ip] };
        frame.ip += 1;
        byte
    }

    pub(crate) fn read_short(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    pub(crate) fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = self.frames.last().unwrap();
        unsafe { (&(*(*frame.closure).data.function).data.chunk.constants)[index] }
    }

    /// 读一个常量并要求它是字符串（变量名、属性名都走这里）。
    pub(crate) fn read_string(&mut self) -> Result<Gc<StrData>, VMError> {
        match self.read_constant() {
            Value::Str(name) => Ok(name),
            other => Err(self.error(ErrorKind::InternalError(format!(
                "corrupt bytecode: expected string constant, found {:?}",
                other
            )))),
        }
    }

    // ---------- 垃圾收集 ----------

    pub fn collect_garbage(&mut self) {
        let before = self.heap.bytes_allocated;

        // 根集合：值栈、调用帧闭包、open upvalue 链、全局表、保留字
        for value in &self.stack {
            self.heap.mark_value(*value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure.cast());
        }
        let mut upvalue = self.open_upvalues;
        while !upvalue.is_null() {
            self.heap.mark_object(upvalue.cast());
            upvalue = unsafe { (*upvalue).data.next };
        }
        self.heap.mark_table(&self.globals);
        self.heap.mark_object(self.init_string.cast());

        self.heap.trace_references();
        self.heap.remove_white_strings();
        let (swept_count, swept_bytes) = self.heap.sweep();

        if swept_count > 0 && matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!(
                "[DEBUG] Sweep phase finished: reclaimed {} objects, {} bytes released ({} -> {} live). Next collection at {} bytes.",
                swept_count, swept_bytes, before, self.heap.bytes_allocated, self.heap.next_gc
            );
        }
    }
}
