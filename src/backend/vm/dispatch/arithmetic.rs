use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::Value;

impl VirtualMachine {
    pub(crate) fn handle_equal(&mut self) {
        let b = self.pop();
        let a = self.pop();
        self.push(Value::Boolean(a == b));
    }

    /// ADD 是唯一的重载算子：双数字相加，双字符串拼接。
    /// 拼接结果照样 intern，和字面量共享身份。
    pub(crate) fn handle_add(&mut self) -> Result<(), VMError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Str(a), Value::Str(b)) => {
                let combined = unsafe { format!("{}{}", (*a).data.chars, (*b).data.chars) };
                let interned = self.heap.intern(combined);
                self.pop();
                self.pop();
                self.push(Value::Str(interned));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "operands must be two numbers or two strings".to_string(),
            ))),
        }
    }

    pub(crate) fn handle_subtract(&mut self) -> Result<(), VMError> {
        let (a, b) = self.numeric_operands()?;
        self.push(Value::Number(a - b));
        Ok(())
    }

    pub(crate) fn handle_multiply(&mut self) -> Result<(), VMError> {
        let (a, b) = self.numeric_operands()?;
        self.push(Value::Number(a * b));
        Ok(())
    }

    pub(crate) fn handle_divide(&mut self) -> Result<(), VMError> {
        let (a, b) = self.numeric_operands()?;
        // 除零交给 IEEE，得到 inf/nan
        self.push(Value::Number(a / b));
        Ok(())
    }

    pub(crate) fn handle_greater(&mut self) -> Result<(), VMError> {
        let (a, b) = self.numeric_operands()?;
        self.push(Value::Boolean(a > b));
        Ok(())
    }

    pub(crate) fn handle_less(&mut self) -> Result<(), VMError> {
        let (a, b) = self.numeric_operands()?;
        self.push(Value::Boolean(a < b));
        Ok(())
    }

    pub(crate) fn handle_not(&mut self) {
        let value = self.pop();
        self.push(Value::Boolean(value.is_falsy()));
    }

    pub(crate) fn handle_negate(&mut self) -> Result<(), VMError> {
        match self.peek(0) {
            Value::Number(n) => {
                self.pop();
                self.push(Value::Number(-n));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "operand must be a number".to_string(),
            ))),
        }
    }

    fn numeric_operands(&mut self) -> Result<(f64, f64), VMError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                Ok((a, b))
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "operands must be numbers".to_string(),
            ))),
        }
    }
}
