//! 值树（Value Tree）：SNBT 文本解析后的内存表示
//!
//! 只区分翻译需要的几类：复合（Compound）、列表（List）、字符串（String），
//! 其余标签一律作为不透明值（Opaque）原样保留，保证回写时不丢信息。

use std::collections::HashMap;

/// 节点类型（与展示/错误信息解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Compound,
    List,
    String,
    Opaque,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Compound => "compound",
            ValueKind::List => "list",
            ValueKind::String => "string",
            ValueKind::Opaque => "opaque",
        }
    }
}

/// SNBT 值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Compound(Compound),
    List(Vec<Value>),
    /// 已反转义的字面文本（`\n` 在内存中是真实换行）
    String(String),
    /// 数字、布尔、类型数组等：保存源文本
    Opaque(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Compound(_) => ValueKind::Compound,
            Value::List(_) => ValueKind::List,
            Value::String(_) => ValueKind::String,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Value::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// 子元素数量（复合字段数 / 列表长度），标量为 0
    pub fn children(&self) -> usize {
        match self {
            Value::Compound(c) => c.len(),
            Value::List(items) => items.len(),
            _ => 0,
        }
    }
}

/// 保持声明顺序的键值表，键在同一复合内唯一
#[derive(Debug, Clone, Default)]
pub struct Compound {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// 追加新键；键已存在时原样返回值，不覆盖
    pub fn insert(&mut self, key: String, value: Value) -> Result<(), Value> {
        if self.contains_key(&key) {
            return Err(value);
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    /// 取得已有值，缺失时按 `make` 创建并追加到末尾
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> Value) -> &mut Value {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.index.insert(key.to_string(), i);
                self.entries.push((key.to_string(), make()));
                i
            }
        };
        &mut self.entries[i].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_keeps_declaration_order() {
        let mut c = Compound::new();
        c.insert("zeta".into(), Value::Opaque("1".into())).unwrap();
        c.insert("alpha".into(), Value::String("a".into())).unwrap();
        c.insert("mid".into(), Value::List(vec![])).unwrap();

        let keys: Vec<&str> = c.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"], "键顺序应与插入顺序一致");
        assert_eq!(c.get("alpha").and_then(Value::as_str), Some("a"));
    }

    #[test]
    fn test_compound_rejects_duplicate_key() {
        let mut c = Compound::new();
        c.insert("title".into(), Value::String("一".into())).unwrap();
        let rejected = c.insert("title".into(), Value::String("二".into()));

        assert_eq!(rejected, Err(Value::String("二".into())), "重复键应被拒绝");
        assert_eq!(c.get("title").and_then(Value::as_str), Some("一"), "原值不应被覆盖");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_get_or_insert_with_creates_once() {
        let mut c = Compound::new();
        c.get_or_insert_with("quest", || Value::Compound(Compound::new()));
        c.get_or_insert_with("quest", || Value::String("不会用到".into()));

        assert_eq!(c.len(), 1);
        assert_eq!(c.get("quest").map(Value::kind), Some(ValueKind::Compound));
    }

    #[test]
    fn test_equality_ignores_index_internals() {
        let mut a = Compound::new();
        a.insert("k".into(), Value::Opaque("1b".into())).unwrap();
        let mut b = Compound::new();
        b.get_or_insert_with("k", || Value::Opaque("1b".into()));

        assert_eq!(Value::Compound(a), Value::Compound(b));
    }
}
