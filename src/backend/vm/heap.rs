// Mylox VM heap
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-09: Initial implementation: every managed object goes through a single
//            alloc_object path that threads it onto the sweep list and charges its
//            size against bytes_allocated; string interning with the weak intern
//            table so equal strings share identity.
// 2026-06-14: Allocators for the full object family; sizes account for owned
//            container capacities (string bytes, chunk arrays, closure upvalue
//            vectors, class/instance tables) so alloc and free stay symmetric.
// 2026-06-19: Tri-color machinery moved in: mark/blacken over the gray stack,
//            white-string removal and the sweep walk with threshold doubling.
// 2026-06-21: peak_allocated kept for GC tuning; Drop frees the whole object list
//            so one-shot embedders do not leak.

use crate::common::hash::{Table, hash_string};
use crate::common::object::{
    BoundMethodData, ClassData, ClosureData, FunctionData, Gc, GcObject, Header, InstanceData,
    NativeData, NativeFn, ObjectKind, RawObj, StrData, UpvalueData, Value,
};
use std::mem::size_of;
use std::ptr::null_mut;

/// 首次触发 GC 的阈值：1 MiB。
pub const GC_INITIAL_THRESHOLD: usize = 1024 * 1024;

pub struct Heap {
    /// 所有存活对象的侵入式链表，sweep 阶段顺着它走。
    pub objects: RawObj,
    /// intern 集合。键是字符串对象本身，值恒为 nil；GC 对它弱引用。
    pub strings: Table,
    pub bytes_allocated: usize,
    pub next_gc: usize,
    // 仅用于调试与 GC 调参，不参与回收决策
    pub peak_allocated: usize,
    gray_stack: Vec<RawObj>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: null_mut(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: GC_INITIAL_THRESHOLD,
            peak_allocated: 0,
            gray_stack: Vec::new(),
        }
    }

    // ---------- 分配 ----------

    /// 字符串一律经过 intern：同样内容必然拿到同一个对象。
    pub fn intern(&mut self, chars: String) -> Gc<StrData> {
        let hash = hash_string(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(&chars, hash) {
            return existing;
        }

        let size = size_of::<GcObject<StrData>>() + chars.capacity();
        let ptr = self.alloc_object(StrData { chars, hash }, ObjectKind::Str, size);
        self.strings.set(ptr, Value::Nil);
        ptr
    }

    pub fn alloc_function(&mut self, function: FunctionData) -> Gc<FunctionData> {
        let size = size_of::<GcObject<FunctionData>>() + function.chunk.owned_bytes();
        self.alloc_object(function, ObjectKind::Function, size)
    }

    pub fn alloc_native(&mut self, function: NativeFn) -> Gc<NativeData> {
        let size = size_of::<GcObject<NativeData>>();
        self.alloc_object(NativeData { function }, ObjectKind::Native, size)
    }

    pub fn alloc_closure(&mut self, function: Gc<FunctionData>) -> Gc<ClosureData> {
        let upvalue_count = unsafe { (*function).data.upvalue_count } as usize;
        let upvalues: Vec<Gc<UpvalueData>> = vec![null_mut(); upvalue_count];
        let size = size_of::<GcObject<ClosureData>>()
            + upvalues.capacity() * size_of::<Gc<UpvalueData>>();
        self.alloc_object(ClosureData { function, upvalues }, ObjectKind::Closure, size)
    }

    pub fn alloc_upvalue(&mut self, slot: usize) -> Gc<UpvalueData> {
        let size = size_of::<GcObject<UpvalueData>>();
        self.alloc_object(
            UpvalueData {
                location: Some(slot),
                closed: Value::Nil,
                next: null_mut(),
            },
            ObjectKind::Upvalue,
            size,
        )
    }

    pub fn alloc_class(&mut self, name: Gc<StrData>) -> Gc<ClassData> {
        let size = size_of::<GcObject<ClassData>>();
        self.alloc_object(
            ClassData {
                name,
                methods: Table::new(),
            },
            ObjectKind::Class,
            size,
        )
    }

    pub fn alloc_instance(&mut self, class: Gc<ClassData>) -> Gc<InstanceData> {
        let size = size_of::<GcObject<InstanceData>>();
        self.alloc_object(
            InstanceData {
                class,
                fields: Table::new(),
            },
            ObjectKind::Instance,
            size,
        )
    }

    pub fn alloc_bound_method(
        &mut self,
        receiver: Value,
        method: Gc<ClosureData>,
    ) -> Gc<BoundMethodData> {
        let size = size_of::<GcObject<BoundMethodData>>();
        self.alloc_object(
            BoundMethodData { receiver, method },
            ObjectKind::BoundMethod,
            size,
        )
    }

    fn alloc_object<T>(&mut self, data: T, kind: ObjectKind, size: usize) -> Gc<T> {
        let boxed = Box::new(GcObject {
            kind,
            mark: false,
            size,
            next: self.objects,
            data,
        });
        let ptr = Box::into_raw(boxed);
        self.objects = ptr.cast::<GcObject<Header>>();

        self.bytes_allocated += size;
        if self.bytes_allocated > self.peak_allocated {
            self.peak_allocated = self.bytes_allocated;
        }

        ptr
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    /// 存活对象链表长度，测试和调试用。
    pub fn object_count(&self) -> usize {
        let mut count = 0;
        let mut obj = self.objects;
        while !obj.is_null() {
            count += 1;
            obj = unsafe { (*obj).next };
        }
        count
    }

    // ---------- 标记 ----------

    pub fn mark_value(&mut self, value: Value) {
        match value {
            Value::Nil | Value::Boolean(_) | Value::Number(_) => {}
            Value::Str(p) => self.mark_object(p.cast()),
            Value::Function(p) => self.mark_object(p.cast()),
            Value::Native(p) => self.mark_object(p.cast()),
            Value::Closure(p) => self.mark_object(p.cast()),
            Value::Class(p) => self.mark_object(p.cast()),
            Value::Instance(p) => self.mark_object(p.cast()),
            Value::BoundMethod(p) => self.mark_object(p.cast()),
        }
    }

    /// 置灰：标记并入队，等待 blacken 追踪出边。重复标记是幂等的。
    pub fn mark_object(&mut self, ptr: RawObj) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            if (*ptr).mark {
                return;
            }
            (*ptr).mark = true;
        }
        self.gray_stack.push(ptr);
    }

    pub fn mark_table(&mut self, table: &Table) {
        for entry in table.entries() {
            if !entry.key.is_null() {
                self.mark_object(entry.key.cast());
                self.mark_value(entry.value);
            }
        }
    }

    pub fn trace_references(&mut self) {
        while let Some(ptr) = self.gray_stack.pop() {
            self.blacken(ptr);
        }
    }

    /// 转黑：标记 ptr 指向的所有对象。String 和 Native 没有出边。
    fn blacken(&mut self, ptr: RawObj) {
        let kind = unsafe { (*ptr).kind };
        match kind {
            ObjectKind::Str | ObjectKind::Native => {}
            ObjectKind::Function => {
                let function = unsafe { &(*ptr.cast::<GcObject<FunctionData>>()).data };
                self.mark_object(function.name.cast());
                for index in 0..function.chunk.constants.len() {
                    self.mark_value(function.chunk.constants[index]);
                }
            }
            ObjectKind::Closure => {
                let closure = unsafe { &(*ptr.cast::<GcObject<ClosureData>>()).data };
                self.mark_object(closure.function.cast());
                for &upvalue in &closure.upvalues {
                    self.mark_object(upvalue.cast());
                }
            }
            ObjectKind::Upvalue => {
                // open 时 closed 只是 nil，标记它总是安全的
                let closed = unsafe { (*ptr.cast::<GcObject<UpvalueData>>()).data.closed };
                self.mark_value(closed);
            }
            ObjectKind::Class => {
                let class = unsafe { &(*ptr.cast::<GcObject<ClassData>>()).data };
                self.mark_object(class.name.cast());
                self.mark_table(&class.methods);
            }
            ObjectKind::Instance => {
                let instance = unsafe { &(*ptr.cast::<GcObject<InstanceData>>()).data };
                self.mark_object(instance.class.cast());
                self.mark_table(&instance.fields);
            }
            ObjectKind::BoundMethod => {
                let bound = unsafe { &(*ptr.cast::<GcObject<BoundMethodData>>()).data };
                self.mark_value(bound.receiver);
                self.mark_object(bound.method.cast());
            }
        }
    }

    // ---------- 清扫 ----------

    /// intern 表对键是弱引用：白字符串在 sweep 之前先从表里摘掉，
    /// 否则表里会留下悬垂指针。
    pub fn remove_white_strings(&mut self) {
        let dead: Vec<Gc<StrData>> = self
            .strings
            .entries()
            .iter()
            .filter(|entry| !entry.key.is_null() && unsafe { !(*entry.key).mark })
            .map(|entry| entry.key)
            .collect();
        for key in dead {
            self.strings.delete(key);
        }
    }

    /// 释放所有未标记对象，清掉幸存者的标记位，
    /// 并把下次触发阈值调到存活字节数的两倍。
    pub fn sweep(&mut self) -> (usize, usize) {
        let mut swept_count = 0;
        let mut swept_bytes = 0;

        unsafe {
            let mut prev: RawObj = null_mut();
            let mut current = self.objects;

            while !current.is_null() {
                if (*current).mark {
                    (*current).mark = false;
                    prev = current;
                    current = (*current).next;
                } else {
                    let next = (*current).next;
                    if prev.is_null() {
                        self.objects = next;
                    } else {
                        (*prev).next = next;
                    }

                    let size = free_object(current);
                    swept_count += 1;
                    swept_bytes += size;
                    self.bytes_allocated = self.bytes_allocated.saturating_sub(size);

                    current = next;
                }
            }
        }

        self.next_gc = self.bytes_allocated * 2;
        (swept_count, swept_bytes)
    }

    fn free_all(&mut self) {
        // 先放弃 intern 表，里面的键马上会变成悬垂指针
        self.strings = Table::new();
        self.gray_stack.clear();

        let mut current = self.objects;
        while !current.is_null() {
            unsafe {
                let next = (*current).next;
                free_object(current);
                current = next;
            }
        }
        self.objects = null_mut();
        self.bytes_allocated = 0;
    }
}

/// 按对象的真实类型重建 Box 并释放，返回记账字节数。
unsafe fn free_object(ptr: RawObj) -> usize {
    unsafe {
        let kind = (*ptr).kind;
        let size = (*ptr).size;
        match kind {
            ObjectKind::Str => drop(Box::from_raw(ptr.cast::<GcObject<StrData>>())),
            ObjectKind::Function => drop(Box::from_raw(ptr.cast::<GcObject<FunctionData>>())),
            ObjectKind::Native => drop(Box::from_raw(ptr.cast::<GcObject<NativeData>>())),
            ObjectKind::Closure => drop(Box::from_raw(ptr.cast::<GcObject<ClosureData>>())),
            ObjectKind::Upvalue => drop(Box::from_raw(ptr.cast::<GcObject<UpvalueData>>())),
            ObjectKind::Class => drop(Box::from_raw(ptr.cast::<GcObject<ClassData>>())),
            ObjectKind::Instance => drop(Box::from_raw(ptr.cast::<GcObject<InstanceData>>())),
            ObjectKind::BoundMethod => {
                drop(Box::from_raw(ptr.cast::<GcObject<BoundMethodData>>()));
            }
        }
        size
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.free_all();
    }
}
