//! 序列化：值树 -> SNBT 文本
//!
//! 输出规范化：每个条目独占一行、按层缩进、字符串统一用双引号、文件以换行结尾。
//! 键顺序、嵌套结构和叶子内容与值树完全一致。

use thiserror::Error;

use crate::config::SerializeOptions;
use crate::model::parser::is_bare_char;
use crate::model::value::{Compound, Value};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("字符串含无法转义的控制字符 {0:?}")]
    Unescapable(char),
    #[error("不透明值无效: {0:?}")]
    InvalidOpaque(String),
}

/// 用默认格式序列化
pub fn serialize(tree: &Value) -> Result<String, SerializeError> {
    serialize_with(tree, &SerializeOptions::default())
}

pub fn serialize_with(tree: &Value, options: &SerializeOptions) -> Result<String, SerializeError> {
    let mut w = Writer {
        options,
        out: String::new(),
    };
    w.value(tree, 0)?;
    w.out.push('\n');
    Ok(w.out)
}

/// 转义字符串字面量内容（不含引号）
pub fn escape_string(text: &str) -> Result<String, SerializeError> {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => return Err(SerializeError::Unescapable(c)),
            c => out.push(c),
        }
    }
    Ok(out)
}

struct Writer<'o> {
    options: &'o SerializeOptions,
    out: String,
}

impl<'o> Writer<'o> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.options.indent);
        }
    }

    fn separator(&mut self, is_last: bool) {
        if self.options.commas && !is_last {
            self.out.push(',');
        }
        self.out.push('\n');
    }

    fn value(&mut self, v: &Value, depth: usize) -> Result<(), SerializeError> {
        match v {
            Value::Compound(c) => self.compound(c, depth),
            Value::List(items) => self.list(items, depth),
            Value::String(s) => self.string(s),
            Value::Opaque(raw) => {
                if raw.is_empty() || raw.contains(['\n', '\r']) {
                    return Err(SerializeError::InvalidOpaque(raw.clone()));
                }
                self.out.push_str(raw);
                Ok(())
            }
        }
    }

    fn string(&mut self, s: &str) -> Result<(), SerializeError> {
        let escaped = escape_string(s)?;
        self.out.push('"');
        self.out.push_str(&escaped);
        self.out.push('"');
        Ok(())
    }

    fn key(&mut self, k: &str) -> Result<(), SerializeError> {
        if !k.is_empty() && k.chars().all(is_bare_char) {
            self.out.push_str(k);
            Ok(())
        } else {
            self.string(k)
        }
    }

    fn compound(&mut self, c: &Compound, depth: usize) -> Result<(), SerializeError> {
        if c.is_empty() {
            self.out.push_str("{ }");
            return Ok(());
        }
        self.out.push_str("{\n");
        let last = c.len() - 1;
        for (i, (k, v)) in c.iter().enumerate() {
            self.indent(depth + 1);
            self.key(k)?;
            self.out.push_str(": ");
            self.value(v, depth + 1)?;
            self.separator(i == last);
        }
        self.indent(depth);
        self.out.push('}');
        Ok(())
    }

    fn list(&mut self, items: &[Value], depth: usize) -> Result<(), SerializeError> {
        if items.is_empty() {
            self.out.push_str("[ ]");
            return Ok(());
        }
        self.out.push_str("[\n");
        let last = items.len() - 1;
        for (i, item) in items.iter().enumerate() {
            self.indent(depth + 1);
            self.value(item, depth + 1)?;
            self.separator(i == last);
        }
        self.indent(depth);
        self.out.push(']');
        Ok(())
    }
}
