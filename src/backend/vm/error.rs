// Mylox VM runtime errors
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-10: Initial VMError with the runtime error kinds and a captured stack
//            trace (line + function name per frame, innermost first).
// 2026-06-16: Message texts aligned with the interpreter's user-facing wording so
//            the test harness can match stderr literally.

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // 类型错误：比如 1 + "a"、对非实例取字段
    TypeError(String),
    // 读写未定义的全局变量
    UndefinedVariable(String),
    // 实例/类上不存在的属性
    UndefinedProperty(String),
    // 调用了函数和类之外的东西
    InvalidCall,
    // 实参数量不符
    ArityMismatch { expected: u8, got: u8 },
    // 调用帧打满：递归太深
    StackOverflow,
    // 字节码损坏或 VM 自身的 bug
    InternalError(String),
}

/// 一条栈回溯记录。name 为空表示顶层脚本。
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub line: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VMError {
    pub kind: ErrorKind,
    /// 最内层调用在前
    pub trace: Vec<TraceFrame>,
}

impl VMError {
    pub fn message(&self) -> String {
        match &self.kind {
            ErrorKind::TypeError(message) => message.clone(),
            ErrorKind::UndefinedVariable(name) => {
                format!("undefined variable '{}'", name)
            }
            ErrorKind::UndefinedProperty(name) => {
                format!("undefined property '{}'", name)
            }
            ErrorKind::InvalidCall => "can only call functions and classes".to_string(),
            ErrorKind::ArityMismatch { expected, got } => {
                format!("expected {} arguments but got {}", expected, got)
            }
            ErrorKind::StackOverflow => "stack overflow".to_string(),
            ErrorKind::InternalError(message) => message.clone(),
        }
    }
}

impl std::fmt::Display for VMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.message())?;
        for frame in &self.trace {
            if frame.name.is_empty() {
                writeln!(f, "[line {}] in script", frame.line)?;
            } else {
                writeln!(f, "[line {}] in {}()", frame.line, frame.name)?;
            }
        }
        Ok(())
    }
}
