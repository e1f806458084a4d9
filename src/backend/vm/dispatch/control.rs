use crate::backend::vm::VirtualMachine;

impl VirtualMachine {
    pub(crate) fn handle_jump(&mut self) {
        let offset = self.read_short() as usize;
        self.frames.last_mut().unwrap().ip += offset;
    }

    /// 条件跳转只看栈顶不弹栈，and/or 靠这一点把左值留作结果。
    pub(crate) fn handle_jump_if_false(&mut self) {
        let offset = self.read_short() as usize;
        if self.peek(0).is_falsy() {
            self.frames.last_mut().unwrap().ip += offset;
        }
    }

    pub(crate) fn handle_loop(&mut self) {
        let offset = self.read_short() as usize;
        self.frames.last_mut().unwrap().ip -= offset;
    }

    /// 返回 true 表示顶层脚本执行完毕。
    pub(crate) fn handle_return(&mut self) -> bool {
        let result = self.pop();
        let frame = self.frames.pop().unwrap();

        // 本帧还开着的 upvalue 全部关闭，再丢弃帧上的槽位
        self.close_upvalues(frame.slots);

        if self.frames.is_empty() {
            // 弹掉顶层脚本闭包本身
            self.pop();
            return true;
        }

        self.stack.truncate(frame.slots);
        self.push(result);
        false
    }
}
