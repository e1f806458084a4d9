use mylox::backend::vm::heap::GC_INITIAL_THRESHOLD;
use mylox::backend::vm::{InterpretResult, LogLevel, VirtualMachine};
use mylox::common::object::Value;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn stress_vm() -> (VirtualMachine, SharedBuf) {
    let buf = SharedBuf::default();
    let mut vm = VirtualMachine::new(LogLevel::Release);
    vm.gc_stress = true;
    vm.set_output(Box::new(buf.clone()));
    (vm, buf)
}

#[test]
fn interning_gives_equal_strings_one_identity() {
    let mut vm = VirtualMachine::new(LogLevel::Release);
    let a = vm.heap.intern("hello".to_string());
    let b = vm.heap.intern("hello".to_string());
    let c = vm.heap.intern("world".to_string());
    assert_eq!(a, b);
    assert_ne!(a, c);
    // 集合里每个串只占一席
    assert_eq!(Value::Str(a), Value::Str(b));
}

#[test]
fn runtime_concatenation_reuses_interned_identity() {
    // "he" + "llo" 产出的新串必须和字面量 "hello" 同一身份，
    // == 是指针比较，为 true 就证明了 intern 生效
    let (mut vm, buf) = stress_vm();
    let result = vm.interpret("var a = \"he\" + \"llo\"; var b = \"hello\"; print a == b;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(String::from_utf8(buf.0.borrow().clone()).unwrap(), "true\n");
}

#[test]
fn collection_reclaims_unreachable_closures() {
    let (mut vm, _buf) = stress_vm();
    let source = "\
        fun make() {\n\
          var x = 10;\n\
          fun inner() { return x; }\n\
          return inner;\n\
        }\n\
        var i = 0;\n\
        while (i < 50) { make(); i = i + 1; }\n";
    assert_eq!(vm.interpret(source), InterpretResult::Ok);

    // 每轮 make() 产生的闭包和 upvalue 都成了垃圾；压力模式下
    // 它们活不过下一个安全点，存活对象数远小于分配总数
    vm.collect_garbage();
    assert!(
        vm.heap.object_count() < 40,
        "live objects: {}",
        vm.heap.object_count()
    );
    assert!(vm.heap.bytes_allocated < GC_INITIAL_THRESHOLD);
    // peak 会如实记录中途的分配高峰
    assert!(vm.heap.peak_allocated >= vm.heap.bytes_allocated);
}

#[test]
fn reachable_objects_survive_stress_collection() {
    let (mut vm, buf) = stress_vm();
    let source = "\
        fun f() {\n\
          var x = \"value\";\n\
          fun g() {\n\
            fun h() { print x; }\n\
            print \"create inner closure\";\n\
            return h;\n\
          }\n\
          print \"return from outer\";\n\
          return g;\n\
        }\n\
        f()()();";
    assert_eq!(vm.interpret(source), InterpretResult::Ok);
    assert_eq!(
        String::from_utf8(buf.0.borrow().clone()).unwrap(),
        "return from outer\ncreate inner closure\nvalue\n"
    );
}

#[test]
fn class_graphs_survive_stress_collection() {
    let (mut vm, buf) = stress_vm();
    let source = "\
        class Animal {\n\
          init(name) { this.name = name; }\n\
          speak() { print this.name; }\n\
        }\n\
        class Dog < Animal {\n\
          speak() { super.speak(); print \"woof\"; }\n\
        }\n\
        var d = Dog(\"rex\");\n\
        d.speak();\n\
        d.speak();";
    assert_eq!(vm.interpret(source), InterpretResult::Ok);
    assert_eq!(
        String::from_utf8(buf.0.borrow().clone()).unwrap(),
        "rex\nwoof\nrex\nwoof\n"
    );
}

#[test]
fn globals_keep_their_objects_alive_across_collections() {
    let (mut vm, buf) = stress_vm();
    assert_eq!(
        vm.interpret("var keep = \"pinned by a global\";"),
        InterpretResult::Ok
    );
    vm.collect_garbage();
    vm.collect_garbage();
    assert_eq!(vm.interpret("print keep;"), InterpretResult::Ok);
    assert_eq!(
        String::from_utf8(buf.0.borrow().clone()).unwrap(),
        "pinned by a global\n"
    );
}

#[test]
fn dead_strings_leave_the_intern_set() {
    let mut vm = VirtualMachine::new(LogLevel::Release);
    let before = vm.heap.object_count();

    // 没有任何根引用这个串
    vm.heap.intern("ephemeral-string".to_string());
    assert_eq!(vm.heap.object_count(), before + 1);

    vm.collect_garbage();
    assert_eq!(vm.heap.object_count(), before);
    // 表里也不能留悬垂键：同内容再 intern 得到的是新对象
    let revived = vm.heap.intern("ephemeral-string".to_string());
    assert_eq!(vm.heap.object_count(), before + 1);
    let again = vm.heap.intern("ephemeral-string".to_string());
    assert_eq!(revived, again);
}

#[test]
fn string_churn_script_under_stress() {
    let (mut vm, buf) = stress_vm();
    let source = std::fs::read_to_string("./lox_tests/string_churn.lox").expect("测试脚本不存在");
    assert_eq!(vm.interpret(&source), InterpretResult::Ok);
    assert_eq!(String::from_utf8(buf.0.borrow().clone()).unwrap(), "true\n");

    // 40 个中间前缀串都已经死了，只有最终串被全局变量钉住
    vm.collect_garbage();
    assert!(
        vm.heap.object_count() < 30,
        "live objects: {}",
        vm.heap.object_count()
    );
}

#[test]
fn sweep_updates_byte_accounting() {
    let mut vm = VirtualMachine::new(LogLevel::Release);
    let before_bytes = vm.heap.bytes_allocated;

    vm.heap.intern("garbage-a".to_string());
    vm.heap.intern("garbage-b".to_string());
    assert!(vm.heap.bytes_allocated > before_bytes);

    vm.collect_garbage();
    assert_eq!(vm.heap.bytes_allocated, before_bytes);
    // 阈值重置为存活字节的两倍
    assert_eq!(vm.heap.next_gc, vm.heap.bytes_allocated * 2);
}
