//! 字符串抽取：遍历值树，按声明顺序产出可翻译单元
//!
//! 遍历顺序（复合按键声明顺序、列表按下标）决定译者看到字符串的顺序，
//! 对未修改的输入必须稳定。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExtractOptions;
use crate::model::path::{Path, Segment};
use crate::model::value::Value;

/// 一个可翻译单元：地址 + 原文 + 上下文（仅供译者参考，不参与寻址）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringUnit {
    pub identifier: String,
    pub text: String,
    pub context: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("标识符 `{identifier}` 对应多个字符串（{context}）")]
    DuplicateIdentifier { identifier: String, context: String },
}

/// 抽取全部字符串叶子（按配置过滤空串/排除键）
pub fn extract(tree: &Value, options: &ExtractOptions) -> Result<Vec<StringUnit>, ExtractError> {
    let mut walker = Walker {
        options,
        seen: HashSet::new(),
        out: Vec::new(),
    };
    let mut path = Path::root();
    walker.walk(tree, &mut path, None, String::new())?;
    Ok(walker.out)
}

struct Walker<'o> {
    options: &'o ExtractOptions,
    /// 所有字符串叶子的标识符（含被过滤掉的，它们仍可被回写寻址）
    seen: HashSet<String>,
    out: Vec<StringUnit>,
}

impl<'o> Walker<'o> {
    /// `nearest_key`：最近的复合键；`locator`：该键加其后的下标，如 `quest_desc[1]`
    fn walk(
        &mut self,
        v: &Value,
        path: &mut Path,
        nearest_key: Option<&str>,
        locator: String,
    ) -> Result<(), ExtractError> {
        match v {
            Value::Compound(map) => {
                for (k, child) in map.iter() {
                    let depth = path.len();
                    path.extend_key(k);
                    self.walk(child, path, Some(k), k.to_string())?;
                    path.truncate(depth);
                }
            }
            Value::List(items) => {
                for (idx, child) in items.iter().enumerate() {
                    path.push(Segment::Index(idx));
                    self.walk(child, path, nearest_key, format!("{}[{}]", locator, idx))?;
                    path.pop();
                }
            }
            Value::String(text) => {
                let identifier = path.encode();
                if !self.seen.insert(identifier.clone()) {
                    return Err(ExtractError::DuplicateIdentifier {
                        identifier,
                        context: locator,
                    });
                }
                if self.options.keeps(nearest_key, text) {
                    self.out.push(StringUnit {
                        identifier,
                        text: text.clone(),
                        context: locator,
                    });
                }
            }
            Value::Opaque(_) => {}
        }
        Ok(())
    }
}
