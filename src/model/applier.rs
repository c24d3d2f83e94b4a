//! 译文回写：按标识符替换字符串叶子，不改变树形
//!
//! 另含 `assemble`：仅凭译文条目从零构建一棵树（目标语言文件尚不存在时）。

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::model::parser::MAX_DEPTH;
use crate::model::path::{is_bare_segment, DecodeError, Path, Segment};
use crate::model::value::{Compound, Value};

/// 标识符 -> 译文
pub type Translations = BTreeMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("标识符 `{identifier}` 无法解码: {source}")]
    Decode { identifier: String, source: DecodeError },
    #[error("标识符 `{identifier}` 在源文件中不存在（源文件结构可能已变化）")]
    Dangling { identifier: String },
    #[error("标识符 `{identifier}` 指向的是 {kind}，不是字符串")]
    NotAString { identifier: String, kind: &'static str },
    #[error("标识符 `{identifier}` 同时匹配多个字符串")]
    Ambiguous { identifier: String },
    #[error("标识符 `{identifier}` 与已有结构冲突: {reason}")]
    ShapeConflict { identifier: String, reason: String },
    #[error("标识符 `{identifier}` 嵌套 {depth} 层，超过上限 {}", MAX_DEPTH)]
    TooDeep { identifier: String, depth: usize },
}

/// 应用译文，返回更新后的树；任一标识符悬空则整体失败
pub fn apply(mut tree: Value, translations: &Translations) -> Result<Value, ApplyError> {
    apply_in_place(&mut tree, translations)?;
    Ok(tree)
}

/// 原地应用，返回替换的叶子数。先全部解析再修改，失败时树保持不变
pub fn apply_in_place(tree: &mut Value, translations: &Translations) -> Result<usize, ApplyError> {
    let mut routes = Vec::with_capacity(translations.len());
    let mut targets = HashSet::new();
    for (identifier, text) in translations {
        let route = resolve(tree, identifier)?;
        if !targets.insert(route.clone()) {
            // 不同写法指向同一叶子（如 `title` 与 `"title"`），按顺序后者覆盖
            tracing::warn!("多个标识符指向同一字符串，保留最后一条: {}", identifier);
        }
        routes.push((identifier, route, text));
    }

    for (identifier, route, text) in &routes {
        let Some(Value::String(slot)) = node_mut(tree, route) else {
            return Err(ApplyError::Dangling {
                identifier: identifier.to_string(),
            });
        };
        *slot = text.to_string();
        tracing::debug!("回写 {} -> {:?}", identifier, text);
    }
    Ok(targets.len())
}

/// 把逻辑路径解析为树中实际的键/下标序列。
/// 扁平键（如 `quest.0D6D.title`）在逻辑路径里被拆成多段，这里回溯尝试所有分组方式，
/// 要求恰好一种到达字符串叶子。
pub fn resolve(tree: &Value, identifier: &str) -> Result<Path, ApplyError> {
    let logical = Path::decode_against(identifier, tree).map_err(|source| ApplyError::Decode {
        identifier: identifier.to_string(),
        source,
    })?;

    let mut search = Search {
        found: Vec::new(),
        wrong_kind: None,
    };
    let mut route = Vec::new();
    search.walk(tree, logical.segments(), &mut route);

    match search.found.len() {
        1 => Ok(Path::from_segments(search.found.remove(0))),
        0 => match search.wrong_kind {
            Some(kind) => Err(ApplyError::NotAString {
                identifier: identifier.to_string(),
                kind,
            }),
            None => Err(ApplyError::Dangling {
                identifier: identifier.to_string(),
            }),
        },
        _ => Err(ApplyError::Ambiguous {
            identifier: identifier.to_string(),
        }),
    }
}

struct Search {
    found: Vec<Vec<Segment>>,
    wrong_kind: Option<&'static str>,
}

impl Search {
    fn walk(&mut self, node: &Value, rest: &[Segment], route: &mut Vec<Segment>) {
        if self.found.len() > 1 {
            return;
        }
        let Some(first) = rest.first() else {
            match node {
                Value::String(_) => self.found.push(route.clone()),
                other => self.wrong_kind = Some(other.kind().name()),
            }
            return;
        };
        match (node, first) {
            (Value::List(items), Segment::Index(i)) => {
                if let Some(child) = items.get(*i) {
                    route.push(Segment::Index(*i));
                    self.walk(child, &rest[1..], route);
                    route.pop();
                }
            }
            (Value::Compound(map), Segment::Key(_)) => {
                let run = rest.iter().take_while(|s| matches!(s, Segment::Key(_))).count();
                // 只有全部由裸段组成的键才会被拆开，合并时同样只接受连续的裸段
                let bare = rest[..run]
                    .iter()
                    .take_while(|s| matches!(s, Segment::Key(p) if is_bare_segment(p)))
                    .count();
                let mut key = String::new();
                for (n, seg) in rest[..run].iter().enumerate() {
                    if let Segment::Key(part) = seg {
                        if n > 0 {
                            if n >= bare {
                                break;
                            }
                            key.push('.');
                        }
                        key.push_str(part);
                    }
                    if let Some(child) = map.get(&key) {
                        route.push(Segment::Key(key.clone()));
                        self.walk(child, &rest[n + 1..], route);
                        route.pop();
                    }
                }
            }
            _ => {}
        }
    }
}

fn node_mut<'v>(tree: &'v mut Value, route: &Path) -> Option<&'v mut Value> {
    let mut node = tree;
    for seg in route.segments() {
        node = match (node, seg) {
            (Value::Compound(map), Segment::Key(k)) => map.get_mut(k)?,
            (Value::List(items), Segment::Index(i)) => items.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(node)
}

/// 仅凭译文构建新树。按路径顺序插入（键按字典序、下标按数值），
/// 列表只允许在末尾追加，跳号视为结构冲突。
pub fn assemble(translations: &Translations, flat_keys: bool) -> Result<Value, ApplyError> {
    let mut decoded = Vec::with_capacity(translations.len());
    for (identifier, text) in translations {
        let path = Path::decode(identifier).map_err(|source| ApplyError::Decode {
            identifier: identifier.clone(),
            source,
        })?;
        let path = if flat_keys { merge_key_runs(&path) } else { path };
        // 与解析器同样的嵌套上限，过深的树在序列化和释放时会耗尽栈
        if path.len() > MAX_DEPTH {
            return Err(ApplyError::TooDeep {
                identifier: identifier.clone(),
                depth: path.len(),
            });
        }
        decoded.push((path, identifier, text));
    }
    decoded.sort_by(|a, b| a.0.cmp(&b.0));

    let mut root = match decoded.first().and_then(|(p, _, _)| p.segments().first()) {
        Some(Segment::Index(_)) => Value::List(Vec::new()),
        _ => Value::Compound(Compound::new()),
    };
    for (path, identifier, text) in decoded {
        Path::decode_against(identifier, &root).map_err(|source| ApplyError::Decode {
            identifier: identifier.clone(),
            source,
        })?;
        insert_at(&mut root, &path, text.clone()).map_err(|reason| ApplyError::ShapeConflict {
            identifier: identifier.clone(),
            reason,
        })?;
    }
    Ok(root)
}

/// 连续的裸键段合并为一个带点的键；带引号的键段保持独立
fn merge_key_runs(path: &Path) -> Path {
    let mut out: Vec<Segment> = Vec::with_capacity(path.len());
    let mut last_bare = false;
    for seg in path.segments() {
        let bare = matches!(seg, Segment::Key(k) if is_bare_segment(k));
        if let (true, true, Segment::Key(k), Some(Segment::Key(acc))) = (bare, last_bare, seg, out.last_mut()) {
            acc.push('.');
            acc.push_str(k);
            continue;
        }
        last_bare = bare;
        out.push(seg.clone());
    }
    Path::from_segments(out)
}

/// 沿路径逐段下行，键段缺失时建复合、下标段缺失时建列表，最后写入字符串叶子
pub fn insert_at(root: &mut Value, path: &Path, text: String) -> Result<(), String> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err("空路径".to_string());
    };
    let mut node = root;
    for (i, seg) in parents.iter().enumerate() {
        let next = &path.segments()[i + 1];
        let make = || match next {
            Segment::Key(_) => Value::Compound(Compound::new()),
            Segment::Index(_) => Value::List(Vec::new()),
        };
        node = match (node, seg) {
            (Value::Compound(map), Segment::Key(k)) => map.get_or_insert_with(k, make),
            (Value::List(items), Segment::Index(idx)) => list_slot(items, *idx, make)?,
            (other, seg) => return Err(format!("无法在 {} 上使用段 {:?}", other.kind().name(), seg)),
        };
    }
    match (node, last) {
        (Value::Compound(map), Segment::Key(k)) => map
            .insert(k.clone(), Value::String(text))
            .map_err(|_| format!("键 `{}` 已存在", k)),
        (Value::List(items), Segment::Index(i)) => {
            if *i == items.len() {
                items.push(Value::String(text));
                Ok(())
            } else if *i < items.len() {
                Err(format!("下标 {} 已存在", i))
            } else {
                Err(format!("下标 {} 跳号（当前长度 {}）", i, items.len()))
            }
        }
        (other, seg) => Err(format!("无法在 {} 上使用段 {:?}", other.kind().name(), seg)),
    }
}

fn list_slot(items: &mut Vec<Value>, i: usize, make: impl FnOnce() -> Value) -> Result<&mut Value, String> {
    if i == items.len() {
        items.push(make());
    }
    let len = items.len();
    items
        .get_mut(i)
        .ok_or_else(|| format!("下标 {} 跳号（当前长度 {}）", i, len))
}
