use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{Value, format_value};
use std::io::Write;

impl VirtualMachine {
    pub(crate) fn handle_constant(&mut self) {
        let value = self.read_constant();
        self.push(value);
    }

    pub(crate) fn handle_nil(&mut self) {
        self.push(Value::Nil);
    }

    pub(crate) fn handle_bool(&mut self, value: bool) {
        self.push(Value::Boolean(value));
    }

    pub(crate) fn handle_pop(&mut self) {
        self.pop();
    }

    pub(crate) fn handle_get_local(&mut self) {
        let slot = self.read_byte() as usize;
        let base = self.frames.last().unwrap().slots;
        let value = self.stack[base + slot];
        self.push(value);
    }

    pub(crate) fn handle_set_local(&mut self) {
        let slot = self.read_byte() as usize;
        let base = self.frames.last().unwrap().slots;
        // 赋值是表达式，值留在栈顶
        self.stack[base + slot] = self.peek(0);
    }

    pub(crate) fn handle_get_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        match self.globals.get(name) {
            Some(value) => {
                self.push(value);
                Ok(())
            }
            None => {
                let name = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedVariable(name)))
            }
        }
    }

    pub(crate) fn handle_define_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.peek(0);
        // 重复定义就是静默覆盖
        self.globals.set(name, value);
        self.pop();
        Ok(())
    }

    pub(crate) fn handle_set_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.peek(0);
        if self.globals.set(name, value) {
            // 赋值不能隐式定义：把刚插进去的条目删掉再报错
            self.globals.delete(name);
            let name = unsafe { (*name).data.chars.clone() };
            return Err(self.error(ErrorKind::UndefinedVariable(name)));
        }
        Ok(())
    }

    pub(crate) fn handle_get_upvalue(&mut self) {
        let slot = self.read_byte() as usize;
        let upvalue = unsafe { (&(*self.frames.last().unwrap().closure).data.upvalues)[slot] };
        let value = self.read_upvalue(upvalue);
        self.push(value);
    }

    pub(crate) fn handle_set_upvalue(&mut self) {
        let slot = self.read_byte() as usize;
        let upvalue = unsafe { (&(*self.frames.last().unwrap().closure).data.upvalues)[slot] };
        let value = self.peek(0);
        self.write_upvalue(upvalue, value);
    }

    pub(crate) fn handle_print(&mut self) {
        let value = self.pop();
        let _ = writeln!(self.out, "{}", format_value(value));
    }
}
