/*
   调用帧实现
*/
use crate::common::object::{ClosureData, Gc};

/// 一次活跃调用。slots 是本帧在值栈上的基址，
/// 0 号槽位放被调者自己（方法里就是 this）。
pub struct CallFrame {
    pub closure: Gc<ClosureData>,
    /// 下一条待取指令在 chunk.code 里的下标
    pub ip: usize,
    pub slots: usize,
}

impl CallFrame {
    pub fn new(closure: Gc<ClosureData>, slots: usize) -> Self {
        Self {
            closure,
            ip: 0,
            slots,
        }
    }
}
