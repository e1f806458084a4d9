use mylox::backend::vm::LogLevel;
use mylox::backend::vm::heap::Heap;
use mylox::common::disassemble::disassemble_chunk;
use mylox::common::object::{FunctionData, Gc};
use mylox::common::opcode::OpCode;
use mylox::frontend::compiler::{CompileError, compile};

fn compile_source(source: &str) -> (Heap, Gc<FunctionData>) {
    let mut heap = Heap::new();
    let function =
        compile(source, &mut heap, LogLevel::Release).expect("source should compile cleanly");
    (heap, function)
}

fn compile_errors(source: &str) -> Vec<CompileError> {
    let mut heap = Heap::new();
    compile(source, &mut heap, LogLevel::Release).expect_err("source should fail to compile")
}

fn code_of(function: Gc<FunctionData>) -> Vec<u8> {
    unsafe { (*function).data.chunk.code.clone() }
}

#[test]
fn expression_statement_bytecode() {
    let (_heap, function) = compile_source("1 + 2;");
    // 脚本末尾带隐式 return nil
    assert_eq!(
        code_of(function),
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Add as u8,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn local_variables_use_stack_slots() {
    let (_heap, function) = compile_source("{ var a = 1; print a; }");
    // 槽位 0 是保留位，块里的 a 落在槽位 1
    assert_eq!(
        code_of(function),
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::GetLocal as u8,
            1,
            OpCode::Print as u8,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn comparison_operators_compose_with_not() {
    let (_heap, function) = compile_source("1 <= 2;");
    assert_eq!(
        code_of(function),
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Greater as u8,
            OpCode::Not as u8,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
}

#[test]
fn if_statement_backpatches_forward_jump() {
    let (_heap, function) = compile_source("if (false) print 1;");
    let code = code_of(function);

    // False JumpIfFalse xx xx Pop Constant 0 Print Jump xx xx Pop Nil Return
    assert_eq!(code[0], OpCode::False as u8);
    assert_eq!(code[1], OpCode::JumpIfFalse as u8);
    let then_jump = u16::from_be_bytes([code[2], code[3]]) as usize;
    // 落点在 else 分支的 Pop 上
    assert_eq!(code[4 + then_jump], OpCode::Pop as u8);

    assert_eq!(code[8], OpCode::Jump as u8);
    let else_jump = u16::from_be_bytes([code[9], code[10]]) as usize;
    assert_eq!(code[11 + else_jump], OpCode::Nil as u8);
}

#[test]
fn while_loop_jumps_back_to_condition() {
    let (_heap, function) = compile_source("while (false) print 1;");
    let code = code_of(function);

    let loop_offset = code
        .iter()
        .position(|&b| b == OpCode::Loop as u8)
        .expect("loop instruction present");
    let distance = u16::from_be_bytes([code[loop_offset + 1], code[loop_offset + 2]]) as usize;
    // 回跳正好落在条件表达式的第一条指令上
    assert_eq!(loop_offset + 3 - distance, 0);
}

#[test]
fn closures_record_upvalue_descriptors() {
    let (_heap, function) = compile_source(
        "fun outer() { var x = 1; fun inner() { print x; } return inner; } outer();",
    );
    let listing = disassemble_chunk(unsafe { &(*function).data.chunk }, "<script>");
    assert!(listing.contains("Closure"));

    // outer 的 chunk 里 inner 捕获一个本地 upvalue
    let outer = unsafe { (*function).data.chunk.constants.iter() }
        .find_map(|value| match value {
            mylox::common::object::Value::Function(f) => Some(*f),
            _ => None,
        })
        .expect("outer prototype in constant pool");
    let outer_listing = disassemble_chunk(unsafe { &(*outer).data.chunk }, "outer");
    assert!(outer_listing.contains("local 1"));

    let inner = unsafe { (*outer).data.chunk.constants.iter() }
        .find_map(|value| match value {
            mylox::common::object::Value::Function(f) => Some(*f),
            _ => None,
        })
        .expect("inner prototype in constant pool");
    assert_eq!(unsafe { (*inner).data.upvalue_count }, 1);
}

#[test]
fn compilation_is_deterministic() {
    let source = "fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); } print fib(10);";
    let (_h1, first) = compile_source(source);
    let (_h2, second) = compile_source(source);
    assert_eq!(code_of(first), code_of(second));
}

#[test]
fn missing_expression_reports_at_offending_token() {
    let errors = compile_errors("var x = ;");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "[line 1] error at ';': expect expression");
}

#[test]
fn panic_mode_recovers_at_statement_boundaries() {
    let errors = compile_errors("var x = ;\nvar y = ;");
    // synchronize() 之后第二条错误照常报出
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line, 1);
    assert_eq!(errors[1].line, 2);
}

#[test]
fn return_outside_function_is_rejected() {
    let errors = compile_errors("return 1;");
    assert_eq!(
        errors[0].message,
        "[line 1] error at 'return': cannot return from top-level code"
    );
}

#[test]
fn initializer_cannot_return_a_value() {
    let errors = compile_errors("class C { init() { return 1; } }");
    assert!(
        errors[0]
            .message
            .contains("cannot return a value from an initializer")
    );
}

#[test]
fn duplicate_local_in_same_scope_is_rejected() {
    let errors = compile_errors("{ var a = 1; var a = 2; }");
    assert!(
        errors[0]
            .message
            .contains("already a variable with this name in this scope")
    );
}

#[test]
fn local_cannot_read_itself_in_initializer() {
    let errors = compile_errors("{ var a = a; }");
    assert!(
        errors[0]
            .message
            .contains("cannot read local variable in its own initializer")
    );
}

#[test]
fn class_cannot_inherit_from_itself() {
    let errors = compile_errors("class A < A {}");
    assert!(errors[0].message.contains("a class cannot inherit from itself"));
}

#[test]
fn this_and_super_require_class_context() {
    let errors = compile_errors("print this;");
    assert!(errors[0].message.contains("cannot use 'this' outside of a class"));

    let errors = compile_errors("class A { m() { super.m(); } }");
    assert!(
        errors[0]
            .message
            .contains("cannot use 'super' in a class with no superclass")
    );

    let errors = compile_errors("fun f() { super.m(); }");
    assert!(errors[0].message.contains("cannot use 'super' outside of a class"));
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let errors = compile_errors("1 + 2 = 3;");
    assert!(errors[0].message.contains("invalid assignment target"));
}

#[test]
fn lex_errors_surface_as_compile_errors() {
    let errors = compile_errors("var x = \"open;");
    assert!(errors[0].message.contains("unterminated string"));
}
