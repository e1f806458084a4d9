// Mylox VM call and closure dispatch
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-12: callValue over the five callable shapes; closures get a frame whose
//            slot 0 is the callee, natives run inline against the argument window.
// 2026-06-13: Closure construction with upvalue capture; the open list stays
//            sorted by slot descending and each slot owns at most one cell.

use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::stack::CallFrame;
use crate::backend::vm::{FRAMES_MAX, VirtualMachine};
use crate::common::object::{ClosureData, Gc, UpvalueData, Value};
use std::ptr::null_mut;

impl VirtualMachine {
    pub(crate) fn handle_call(&mut self) -> Result<(), VMError> {
        let argc = self.read_byte();
        self.call_value(self.peek(argc as usize), argc)
    }

    pub(crate) fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), VMError> {
        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Native(native) => {
                // 原生函数直接吃栈上的实参窗口，不建帧、不查实参个数
                let function = unsafe { (*native).data.function };
                let first_arg = self.stack.len() - argc as usize;
                let result = function(&self.stack[first_arg..]);
                self.stack.truncate(first_arg - 1);
                self.push(result);
                Ok(())
            }
            Value::Class(class) => {
                // 被调者槽位直接换成新实例，initializer 的 this 就位
                let instance = self.heap.alloc_instance(class);
                let slot = self.stack.len() - argc as usize - 1;
                self.stack[slot] = Value::Instance(instance);

                let initializer = unsafe { (*class).data.methods.get(self.init_string) };
                if let Some(Value::Closure(init)) = initializer {
                    self.call_closure(init, argc)
                } else if argc != 0 {
                    Err(self.error(ErrorKind::ArityMismatch {
                        expected: 0,
                        got: argc,
                    }))
                } else {
                    Ok(())
                }
            }
            Value::BoundMethod(bound) => {
                let (receiver, method) =
                    unsafe { ((*bound).data.receiver, (*bound).data.method) };
                let slot = self.stack.len() - argc as usize - 1;
                self.stack[slot] = receiver;
                self.call_closure(method, argc)
            }
            _ => Err(self.error(ErrorKind::InvalidCall)),
        }
    }

    pub(crate) fn call_closure(
        &mut self,
        closure: Gc<ClosureData>,
        argc: u8,
    ) -> Result<(), VMError> {
        let arity = unsafe { (*(*closure).data.function).data.arity };
        if argc != arity {
            return Err(self.error(ErrorKind::ArityMismatch {
                expected: arity,
                got: argc,
            }));
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(self.error(ErrorKind::StackOverflow));
        }

        let slots = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame::new(closure, slots));
        Ok(())
    }

    pub(crate) fn handle_closure(&mut self) -> Result<(), VMError> {
        let function = match self.read_constant() {
            Value::Function(function) => function,
            other => {
                return Err(self.error(ErrorKind::InternalError(format!(
                    "corrupt bytecode: Closure operand is not a prototype ({:?})",
                    other
                ))));
            }
        };

        let closure = self.heap.alloc_closure(function);
        self.push(Value::Closure(closure));

        let upvalue_count = unsafe { (*function).data.upvalue_count } as usize;
        for i in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;

            let upvalue = if is_local {
                // 捕获的是正在执行的这一帧里的局部变量
                let slot = self.frames.last().unwrap().slots + index;
                self.capture_upvalue(slot)
            } else {
                unsafe { (&(*self.frames.last().unwrap().closure).data.upvalues)[index] }
            };
            unsafe {
                (&mut (*closure).data.upvalues)[i] = upvalue;
            }
        }
        Ok(())
    }

    pub(crate) fn handle_close_upvalue(&mut self) {
        self.close_upvalues(self.stack.len() - 1);
        self.pop();
    }

    /// 沿降序链找 slot。已有单元直接复用（同一槽位最多一个 open
    /// upvalue），否则按序插入新单元。
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> Gc<UpvalueData> {
        let mut prev: Gc<UpvalueData> = null_mut();
        let mut current = self.open_upvalues;

        unsafe {
            while !current.is_null()
                && (*current).data.location.is_some_and(|s| s > slot)
            {
                prev = current;
                current = (*current).data.next;
            }
            if !current.is_null() && (*current).data.location == Some(slot) {
                return current;
            }
        }

        let created = self.heap.alloc_upvalue(slot);
        unsafe {
            (*created).data.next = current;
            if prev.is_null() {
                self.open_upvalues = created;
            } else {
                (*prev).data.next = created;
            }
        }
        created
    }

    /// 关闭所有 location ≥ last 的 open upvalue：值从栈上搬进
    /// 单元自身，之后的读写都落在 closed 上。
    pub(crate) fn close_upvalues(&mut self, last: usize) {
        unsafe {
            while !self.open_upvalues.is_null() {
                let upvalue = self.open_upvalues;
                let Some(slot) = (*upvalue).data.location else {
                    break;
                };
                if slot < last {
                    break;
                }
                (*upvalue).data.closed = self.stack[slot];
                (*upvalue).data.location = None;
                self.open_upvalues = (*upvalue).data.next;
            }
        }
    }

    pub(crate) fn read_upvalue(&self, upvalue: Gc<UpvalueData>) -> Value {
        unsafe {
            match (*upvalue).data.location {
                Some(slot) => self.stack[slot],
                None => (*upvalue).data.closed,
            }
        }
    }

    pub(crate) fn write_upvalue(&mut self, upvalue: Gc<UpvalueData>, value: Value) {
        unsafe {
            match (*upvalue).data.location {
                Some(slot) => self.stack[slot] = value,
                None => (*upvalue).data.closed = value,
            }
        }
    }
}
