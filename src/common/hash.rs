// Mylox open-addressing hash table
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-05: Initial implementation keyed by interned string pointers; linear
//            probing over a power-of-two bucket array with tombstone entries so
//            deletions do not break probe chains.
// 2026-06-08: Load factor capped at 0.75 counting tombstones; growth rehashes all
//            live entries and drops tombstones, recomputing the count.
// 2026-06-12: Added find_string for the intern set: the only lookup that compares
//            string contents instead of pointer identity.

use crate::common::object::{Gc, StrData, Value};

/// FNV-1a，和 StrData.hash 保持一致。
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// 一个桶。空桶 key 为 null 且 value 为 nil；
/// 墓碑 key 为 null 且 value 为 true。
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub key: Gc<StrData>,
    pub value: Value,
}

const EMPTY: Entry = Entry {
    key: std::ptr::null_mut(),
    value: Value::Nil,
};

/// String 键的开放寻址表，用于 intern 集合、全局变量、实例字段和方法表。
/// 键一定是 intern 过的字符串，所以查找比较指针就够了。
pub struct Table {
    entries: Vec<Entry>,
    /// 含墓碑的占用数，负载因子按它算。
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// GC 标记阶段遍历用。
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn owned_bytes(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<Entry>()
    }

    /// 线性探测：命中返回该桶；未命中返回途中的第一个墓碑
    /// （供插入复用），否则返回终结的空桶。
    fn find_entry(entries: &[Entry], key: Gc<StrData>) -> usize {
        let mask = entries.len() - 1;
        let mut index = unsafe { (*key).data.hash } as usize & mask;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &entries[index];
            if entry.key.is_null() {
                if matches!(entry.value, Value::Nil) {
                    return tombstone.unwrap_or(index);
                }
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            } else if entry.key == key {
                return index;
            }
            index = (index + 1) & mask;
        }
    }

    pub fn get(&self, key: Gc<StrData>) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = &self.entries[Self::find_entry(&self.entries, key)];
        if entry.key.is_null() {
            return None;
        }
        Some(entry.value)
    }

    /// 返回 true 表示新键（含复用墓碑的情况）。
    pub fn set(&mut self, key: Gc<StrData>, value: Value) -> bool {
        if (self.count + 1) * 4 > self.entries.len() * 3 {
            self.grow();
        }

        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_null();
        // 占了真正的空桶才推进计数，墓碑本来就计过了
        if is_new && matches!(entry.value, Value::Nil) {
            self.count += 1;
        }
        entry.key = key;
        entry.value = value;
        is_new
    }

    /// 删除成功返回 true。桶变成墓碑，计数不减。
    pub fn delete(&mut self, key: Gc<StrData>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_null() {
            return false;
        }
        entry.key = std::ptr::null_mut();
        entry.value = Value::Boolean(true);
        true
    }

    /// 整表拷贝，OP_INHERIT 用它复制方法表。
    pub fn add_all(&mut self, from: &Table) {
        for entry in &from.entries {
            if !entry.key.is_null() {
                self.set(entry.key, entry.value);
            }
        }
    }

    /// intern 专用：按内容找字符串，唯一一处不比较指针的查找。
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Gc<StrData>> {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;

        loop {
            let entry = &self.entries[index];
            if entry.key.is_null() {
                // 到达空桶说明不存在；墓碑要跨过去继续探测
                if matches!(entry.value, Value::Nil) {
                    return None;
                }
            } else {
                let existing = unsafe { &(*entry.key).data };
                if existing.hash == hash && existing.chars == chars {
                    return Some(entry.key);
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let capacity = if self.entries.is_empty() {
            8
        } else {
            self.entries.len() * 2
        };
        let old = std::mem::replace(&mut self.entries, vec![EMPTY; capacity]);

        // 重哈希只搬活条目，墓碑被丢弃，计数重算
        self.count = 0;
        for entry in old {
            if entry.key.is_null() {
                continue;
            }
            let index = Self::find_entry(&self.entries, entry.key);
            self.entries[index] = entry;
            self.count += 1;
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::object::{GcObject, ObjectKind};
    use proptest::prelude::*;
    use std::collections::HashMap;

    // 测试用的简陋 intern：同样内容必须拿到同一个指针，模仿 VM 的 intern 集合。
    // 测试进程不回收这些对象。
    struct TestInterner {
        pool: HashMap<String, Gc<StrData>>,
    }

    impl TestInterner {
        fn new() -> Self {
            Self {
                pool: HashMap::new(),
            }
        }

        fn intern(&mut self, chars: &str) -> Gc<StrData> {
            if let Some(&existing) = self.pool.get(chars) {
                return existing;
            }
            let hash = hash_string(chars.as_bytes());
            let obj = Box::new(GcObject {
                kind: ObjectKind::Str,
                mark: false,
                size: 0,
                next: std::ptr::null_mut(),
                data: StrData {
                    chars: chars.to_string(),
                    hash,
                },
            });
            let ptr = Box::into_raw(obj);
            self.pool.insert(chars.to_string(), ptr);
            ptr
        }
    }

    #[test]
    fn get_after_set_returns_last_value() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        let key = interner.intern("answer");

        assert!(table.set(key, Value::Number(1.0)));
        assert!(!table.set(key, Value::Number(42.0)));
        assert_eq!(table.get(key), Some(Value::Number(42.0)));
    }

    #[test]
    fn missing_key_is_a_miss() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        table.set(interner.intern("a"), Value::Nil);
        assert_eq!(table.get(interner.intern("b")), None);
    }

    #[test]
    fn delete_leaves_probe_chain_intact() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        let keys: Vec<_> = (0..32).map(|i| interner.intern(&format!("k{}", i))).collect();
        for (i, &key) in keys.iter().enumerate() {
            table.set(key, Value::Number(i as f64));
        }

        // 删掉一半，剩下的必须仍然可达
        for &key in keys.iter().step_by(2) {
            assert!(table.delete(key));
            assert!(!table.delete(key));
        }
        for (i, &key) in keys.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(table.get(key), None);
            } else {
                assert_eq!(table.get(key), Some(Value::Number(i as f64)));
            }
        }
    }

    #[test]
    fn tombstones_are_reused_by_insertion() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        let key = interner.intern("ghost");
        table.set(key, Value::Boolean(true));
        let count_before = table.len();
        table.delete(key);
        // 墓碑仍计数
        assert_eq!(table.len(), count_before);
        assert!(table.set(key, Value::Boolean(false)));
        assert_eq!(table.len(), count_before);
        assert_eq!(table.get(key), Some(Value::Boolean(false)));
    }

    #[test]
    fn find_string_matches_by_content() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        let key = interner.intern("hello");
        table.set(key, Value::Nil);

        let hash = hash_string(b"hello");
        assert_eq!(table.find_string("hello", hash), Some(key));
        assert_eq!(table.find_string("world", hash_string(b"world")), None);
    }

    #[test]
    fn capacity_stays_power_of_two_and_load_bounded() {
        let mut interner = TestInterner::new();
        let mut table = Table::new();
        for i in 0..100 {
            table.set(interner.intern(&format!("key{}", i)), Value::Number(i as f64));
        }
        assert!(table.capacity().is_power_of_two());
        assert!(table.len() * 4 <= table.capacity() * 3);
    }

    proptest! {
        #[test]
        fn set_get_round_trip(entries in proptest::collection::hash_map("[a-z]{1,8}", 0.0f64..1e9, 0..64)) {
            let mut interner = TestInterner::new();
            let mut table = Table::new();
            for (name, number) in &entries {
                table.set(interner.intern(name), Value::Number(*number));
            }
            for (name, number) in &entries {
                prop_assert_eq!(table.get(interner.intern(name)), Some(Value::Number(*number)));
            }
        }

        #[test]
        fn deleted_keys_miss_surviving_keys_hit(names in proptest::collection::hash_set("[a-z]{1,8}", 1..48)) {
            let mut interner = TestInterner::new();
            let mut table = Table::new();
            let names: Vec<_> = names.into_iter().collect();
            for (i, name) in names.iter().enumerate() {
                table.set(interner.intern(name), Value::Number(i as f64));
            }
            for name in names.iter().step_by(3) {
                table.delete(interner.intern(name));
            }
            for (i, name) in names.iter().enumerate() {
                let got = table.get(interner.intern(name));
                if i % 3 == 0 {
                    prop_assert_eq!(got, None);
                } else {
                    prop_assert_eq!(got, Some(Value::Number(i as f64)));
                }
            }
        }
    }
}
