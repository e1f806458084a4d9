use crate::backend::vm::VirtualMachine;
use crate::common::object::{NativeFn, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// clock() -> 从 Unix 纪元起的秒数（f64）。参数被忽略，原生函数不查实参个数。
pub fn native_clock(_args: &[Value]) -> Value {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Value::Number(elapsed.as_secs_f64())
}

impl VirtualMachine {
    pub(crate) fn load_standard_library(&mut self) {
        self.define_native("clock", native_clock);
    }

    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        let name = self.heap.intern(name.to_string());
        let native = self.heap.alloc_native(function);
        self.globals.set(name, Value::Native(native));
    }
}
