// Mylox bytecode disassembler
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-06-16: Initial version, used by --mode trace and the compiler tests

use crate::common::chunk::Chunk;
use crate::common::object::{Value, format_value};
use crate::common::opcode::OpCode;
use std::fmt::Write;

pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// 反汇编 offset 处的一条指令，返回下一条指令的 offset。
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let _ = write!(out, "{:04} ", offset);
    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{:4} ", line);
    }

    let byte = chunk.code[offset];
    let Ok(op) = OpCode::try_from(byte) else {
        let _ = writeln!(out, "unknown opcode {:#04x}", byte);
        return offset + 1;
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => constant_instruction(chunk, op, offset, out),
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(chunk, op, offset, out),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, 1, offset, out),
        OpCode::Loop => jump_instruction(chunk, op, -1, offset, out),
        OpCode::Invoke | OpCode::SuperInvoke => invoke_instruction(chunk, op, offset, out),
        OpCode::Closure => closure_instruction(chunk, offset, out),
        _ => {
            let _ = writeln!(out, "{:?}", op);
            offset + 1
        }
    }
}

fn constant_instruction(chunk: &Chunk, op: OpCode, offset: usize, out: &mut String) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let rendered = format_value(chunk.constants[index]);
    let _ = writeln!(out, "{:<16} {:4} '{}'", format!("{:?}", op), index, rendered);
    offset + 2
}

fn byte_instruction(chunk: &Chunk, op: OpCode, offset: usize, out: &mut String) -> usize {
    let slot = chunk.code[offset + 1];
    let _ = writeln!(out, "{:<16} {:4}", format!("{:?}", op), slot);
    offset + 2
}

fn jump_instruction(chunk: &Chunk, op: OpCode, sign: i64, offset: usize, out: &mut String) -> usize {
    let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
    let target = offset as i64 + 3 + sign * i64::from(jump);
    let _ = writeln!(out, "{:<16} {:4} -> {}", format!("{:?}", op), offset, target);
    offset + 3
}

fn invoke_instruction(chunk: &Chunk, op: OpCode, offset: usize, out: &mut String) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let argc = chunk.code[offset + 2];
    let rendered = format_value(chunk.constants[index]);
    let _ = writeln!(
        out,
        "{:<16} ({} args) {:4} '{}'",
        format!("{:?}", op),
        argc,
        index,
        rendered
    );
    offset + 3
}

fn closure_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let mut offset = offset + 1;
    let index = chunk.code[offset] as usize;
    offset += 1;
    let constant = chunk.constants[index];
    let _ = writeln!(out, "{:<16} {:4} {}", "Closure", index, format_value(constant));

    // 常量一定是函数原型，后面跟着它的 upvalue 描述对
    if let Value::Function(function) = constant {
        let upvalue_count = unsafe { (*function).data.upvalue_count } as usize;
        for _ in 0..upvalue_count {
            let is_local = chunk.code[offset] != 0;
            let target = chunk.code[offset + 1];
            let _ = writeln!(
                out,
                "{:04}    |                     {} {}",
                offset,
                if is_local { "local" } else { "upvalue" },
                target
            );
            offset += 2;
        }
    }
    offset
}
