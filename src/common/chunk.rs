// Mylox compiler chunk (compiled code unit)
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-06-02: Initial version
//      26-06-05: Run-length encoded line table

use crate::common::object::Value;

/// 行号表的一项：从 offset 开始的指令都属于 line，直到下一项生效。
#[derive(Debug, Clone, Copy)]
struct LineStart {
    offset: usize,
    line: u32,
}

/// 一段编译产物：字节码、常量池和行号表。
/// 每个函数原型持有自己的 Chunk，跳转目标不会跨出自己的 code。
#[derive(Debug)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    lines: Vec<LineStart>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// 追加一个字节；行号与上一条不同时才新增一条 RLE 记录。
    pub fn write(&mut self, byte: u8, line: u32) {
        let offset = self.code.len();
        self.code.push(byte);

        match self.lines.last() {
            Some(last) if last.line == line => {}
            _ => self.lines.push(LineStart { offset, line }),
        }
    }

    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// 返回 offset 所属指令的源码行号（最后一条 offset ≤ 目标 的记录）。
    pub fn get_line(&self, offset: usize) -> u32 {
        let idx = self.lines.partition_point(|entry| entry.offset <= offset);
        if idx == 0 {
            return 0;
        }
        self.lines[idx - 1].line
    }

    /// Heap bytes owned by this chunk, used for GC accounting.
    pub fn owned_bytes(&self) -> usize {
        self.code.capacity()
            + self.constants.capacity() * std::mem::size_of::<Value>()
            + self.lines.capacity() * std::mem::size_of::<LineStart>()
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_table_is_run_length_encoded() {
        let mut chunk = Chunk::new();
        chunk.write(0, 1);
        chunk.write(1, 1);
        chunk.write(2, 1);
        chunk.write(3, 2);
        chunk.write(4, 2);
        chunk.write(5, 4);

        assert_eq!(chunk.lines.len(), 3);
        for offset in 0..3 {
            assert_eq!(chunk.get_line(offset), 1);
        }
        assert_eq!(chunk.get_line(3), 2);
        assert_eq!(chunk.get_line(4), 2);
        assert_eq!(chunk.get_line(5), 4);
    }

    #[test]
    fn constants_are_appended_in_order() {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.add_constant(Value::Number(1.0)), 0);
        assert_eq!(chunk.add_constant(Value::Number(2.0)), 1);
        assert_eq!(chunk.add_constant(Value::Nil), 2);
        assert_eq!(chunk.constants.len(), 3);
    }

    #[test]
    fn get_line_returns_latest_prior_entry() {
        let mut chunk = Chunk::new();
        // 同一行写入一大段，再换行
        for _ in 0..10 {
            chunk.write(0, 7);
        }
        chunk.write(0, 9);
        assert_eq!(chunk.get_line(9), 7);
        assert_eq!(chunk.get_line(10), 9);
        // 越界 offset 也落在最后一条记录里
        assert_eq!(chunk.get_line(100), 9);
    }
}
