// Mylox VM dispatch loop
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-10: Fetch-decode-execute over the current frame's chunk; handlers live in
//            per-family submodules and all return Result so runtime errors unwind
//            to interpret() with the stack trace intact.
// 2026-06-19: GC safepoint at the top of the loop; --mode trace prints the value
//            stack and the decoded instruction before each dispatch.

mod access;
mod arithmetic;
mod class;
mod control;
mod fn_call;

use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::{LogLevel, VirtualMachine};
use crate::common::disassemble::disassemble_instruction;
use crate::common::object::format_value;
use crate::common::opcode::OpCode;

impl VirtualMachine {
    pub(crate) fn run(&mut self) -> Result<(), VMError> {
        loop {
            // 安全点：两次分配之间不会有收集发生，指令边界才会
            if self.gc_stress || self.heap.should_collect() {
                self.collect_garbage();
            }

            if matches!(self.log_level, LogLevel::Trace) {
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|_| {
                self.error(ErrorKind::InternalError(format!(
                    "corrupt bytecode: unknown opcode {:#04x}",
                    byte
                )))
            })?;

            match op {
                OpCode::Constant => self.handle_constant(),
                OpCode::Nil => self.handle_nil(),
                OpCode::True => self.handle_bool(true),
                OpCode::False => self.handle_bool(false),
                OpCode::Pop => self.handle_pop(),

                OpCode::GetLocal => self.handle_get_local(),
                OpCode::SetLocal => self.handle_set_local(),
                OpCode::GetGlobal => self.handle_get_global()?,
                OpCode::DefineGlobal => self.handle_define_global()?,
                OpCode::SetGlobal => self.handle_set_global()?,
                OpCode::GetUpvalue => self.handle_get_upvalue(),
                OpCode::SetUpvalue => self.handle_set_upvalue(),
                OpCode::GetProperty => self.handle_get_property()?,
                OpCode::SetProperty => self.handle_set_property()?,
                OpCode::GetSuper => self.handle_get_super()?,

                OpCode::Equal => self.handle_equal(),
                OpCode::Greater => self.handle_greater()?,
                OpCode::Less => self.handle_less()?,
                OpCode::Add => self.handle_add()?,
                OpCode::Subtract => self.handle_subtract()?,
                OpCode::Multiply => self.handle_multiply()?,
                OpCode::Divide => self.handle_divide()?,
                OpCode::Not => self.handle_not(),
                OpCode::Negate => self.handle_negate()?,

                OpCode::Print => self.handle_print(),

                OpCode::Jump => self.handle_jump(),
                OpCode::JumpIfFalse => self.handle_jump_if_false(),
                OpCode::Loop => self.handle_loop(),

                OpCode::Call => self.handle_call()?,
                OpCode::Invoke => self.handle_invoke()?,
                OpCode::SuperInvoke => self.handle_super_invoke()?,
                OpCode::Closure => self.handle_closure()?,
                OpCode::CloseUpvalue => self.handle_close_upvalue(),
                OpCode::Return => {
                    if self.handle_return() {
                        return Ok(());
                    }
                }

                OpCode::Class => self.handle_class()?,
                OpCode::Inherit => self.handle_inherit()?,
                OpCode::Method => self.handle_method()?,
            }
        }
    }

    fn trace_instruction(&self) {
        let mut stack_dump = String::new();
        for value in &self.stack {
            stack_dump.push_str(&format!("[ {} ]", format_value(*value)));
        }

        let frame = self.frames.last().unwrap();
        let chunk = unsafe { &(*(*frame.closure).data.function).data.chunk };
        let mut rendered = String::new();
        disassemble_instruction(chunk, frame.ip, &mut rendered);

        print!("[TRACE] {:<48} {}", stack_dump, rendered);
    }
}
