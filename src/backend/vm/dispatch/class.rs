// Mylox VM class and property dispatch
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-15: Class creation, method table population and inheritance-by-copy;
//            property reads fall back to method binding, Invoke skips the bound
//            method allocation unless a field shadows the method.

use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{ClassData, Gc, StrData, Value};

impl VirtualMachine {
    pub(crate) fn handle_class(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let class = self.heap.alloc_class(name);
        self.push(Value::Class(class));
        Ok(())
    }

    /// 继承即拷贝：把父类方法表整个灌进子类，之后父类再改不影响
    /// 子类。子类弹栈，父类留下来当 'super' 局部变量。
    pub(crate) fn handle_inherit(&mut self) -> Result<(), VMError> {
        let Value::Class(superclass) = self.peek(1) else {
            return Err(self.error(ErrorKind::TypeError(
                "superclass must be a class".to_string(),
            )));
        };
        let Value::Class(subclass) = self.peek(0) else {
            return Err(self.error(ErrorKind::InternalError(
                "corrupt bytecode: Inherit without a subclass on the stack".to_string(),
            )));
        };

        unsafe {
            let methods = &(*superclass).data.methods;
            (*subclass).data.methods.add_all(methods);
        }
        self.pop();
        Ok(())
    }

    pub(crate) fn handle_method(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let method = self.peek(0);
        let Value::Class(class) = self.peek(1) else {
            return Err(self.error(ErrorKind::InternalError(
                "corrupt bytecode: Method without a class on the stack".to_string(),
            )));
        };
        unsafe {
            (*class).data.methods.set(name, method);
        }
        self.pop();
        Ok(())
    }

    pub(crate) fn handle_get_property(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let Value::Instance(instance) = self.peek(0) else {
            return Err(self.error(ErrorKind::TypeError(
                "only instances have properties".to_string(),
            )));
        };

        // 字段优先于方法
        if let Some(value) = unsafe { (*instance).data.fields.get(name) } {
            self.pop();
            self.push(value);
            return Ok(());
        }

        let class = unsafe { (*instance).data.class };
        self.bind_method(class, name)
    }

    pub(crate) fn handle_set_property(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let Value::Instance(instance) = self.peek(1) else {
            return Err(self.error(ErrorKind::TypeError(
                "only instances have fields".to_string(),
            )));
        };

        let value = self.peek(0);
        unsafe {
            (*instance).data.fields.set(name, value);
        }
        // 实例出栈，赋出去的值留作表达式结果
        let value = self.pop();
        self.pop();
        self.push(value);
        Ok(())
    }

    pub(crate) fn handle_get_super(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let Value::Class(superclass) = self.pop() else {
            return Err(self.error(ErrorKind::InternalError(
                "corrupt bytecode: GetSuper without a superclass on the stack".to_string(),
            )));
        };
        self.bind_method(superclass, name)
    }

    /// obj.m(...) 的快路径：字段遮蔽方法时按字段调用，
    /// 否则跳过 bound method 的分配直接进方法。
    pub(crate) fn handle_invoke(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let argc = self.read_byte();

        let Value::Instance(instance) = self.peek(argc as usize) else {
            return Err(self.error(ErrorKind::TypeError(
                "only instances have methods".to_string(),
            )));
        };

        if let Some(field) = unsafe { (*instance).data.fields.get(name) } {
            let slot = self.stack.len() - argc as usize - 1;
            self.stack[slot] = field;
            return self.call_value(field, argc);
        }

        let class = unsafe { (*instance).data.class };
        self.invoke_from_class(class, name, argc)
    }

    pub(crate) fn handle_super_invoke(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let argc = self.read_byte();
        let Value::Class(superclass) = self.pop() else {
            return Err(self.error(ErrorKind::InternalError(
                "corrupt bytecode: SuperInvoke without a superclass on the stack".to_string(),
            )));
        };
        self.invoke_from_class(superclass, name, argc)
    }

    fn invoke_from_class(
        &mut self,
        class: Gc<ClassData>,
        name: Gc<StrData>,
        argc: u8,
    ) -> Result<(), VMError> {
        match unsafe { (*class).data.methods.get(name) } {
            Some(Value::Closure(method)) => self.call_closure(method, argc),
            _ => {
                let name = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedProperty(name)))
            }
        }
    }

    /// 栈顶的实例换成绑定了 receiver 的方法对象。
    fn bind_method(&mut self, class: Gc<ClassData>, name: Gc<StrData>) -> Result<(), VMError> {
        match unsafe { (*class).data.methods.get(name) } {
            Some(Value::Closure(method)) => {
                let receiver = self.peek(0);
                let bound = self.heap.alloc_bound_method(receiver, method);
                self.pop();
                self.push(Value::BoundMethod(bound));
                Ok(())
            }
            _ => {
                let name = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedProperty(name)))
            }
        }
    }
}
