//! 降级模式：逐行正则扫描
//!
//! 只认固定形状的行：`key: "text"`、`key: ["a", "b"]`，以及
//! `key: [` ... `]` 之间每行一个字符串的块。其余行原样保留。
//! 回写时只替换命中的字面量内容，其他字节不变。
//! 与值树模式共用 `StringUnit` / 译文契约，但不共用代码路径。

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ExtractOptions;
use crate::model::applier::{ApplyError, Translations};
use crate::model::extractor::{ExtractError, StringUnit};
use crate::model::parser::{unescape, ParseError, Position};
use crate::model::path::{Path, Segment};
use crate::model::serializer::escape_string;
use crate::model::transcoder::TranscodeError;

const KEY: &str = r"[A-Za-z0-9_.+\-]+";
const LITERAL: &str = r#""((?:[^"\\]|\\.)*)""#;

struct Patterns {
    single: Regex,
    inline_list: Regex,
    block_start: Regex,
    block_item: Regex,
    block_end: Regex,
    literal: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: String| Regex::new(&p).expect("内置正则无效");
        Patterns {
            single: re(format!(r"^\s*({KEY})\s*:\s*{LITERAL}\s*,?\s*$")),
            inline_list: re(format!(r"^\s*({KEY})\s*:\s*\[(.*)\]\s*,?\s*$")),
            block_start: re(format!(r"^\s*({KEY})\s*:\s*\[\s*$")),
            block_item: re(format!(r"^\s*{LITERAL}\s*,?\s*$")),
            block_end: re(r"^\s*\]\s*,?\s*$".to_string()),
            literal: re(LITERAL.to_string()),
        }
    })
}

/// 一个命中的字面量：单元 + 字面量内容（不含引号）在全文中的字节区间
#[derive(Debug, Clone)]
struct Hit {
    unit: StringUnit,
    key: String,
    span: Range<usize>,
}

struct Block {
    key: String,
    items: Vec<(usize, Range<usize>)>,
}

/// 扫描全文，返回所有命中（不做过滤）
fn scan(text: &str) -> Result<Vec<Hit>, TranscodeError> {
    let pats = patterns();
    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    let mut block: Option<Block> = None;
    let mut offset = 0;

    for (line_no, raw_line) in text.split_inclusive('\n').enumerate() {
        let line_no = line_no + 1;
        let line_start = offset;
        offset += raw_line.len();
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let abs = |r: Range<usize>| line_start + r.start..line_start + r.end;

        if let Some(mut b) = block.take() {
            if let Some(caps) = pats.block_item.captures(line) {
                if let Some(m) = caps.get(1) {
                    b.items.push((line_no, abs(m.range())));
                }
                block = Some(b);
                continue;
            }
            if pats.block_end.is_match(line) {
                for (i, (item_line, span)) in b.items.into_iter().enumerate() {
                    push_hit(text, &mut hits, &mut seen, &b.key, Some(i), item_line, span)?;
                }
                continue;
            }
            // 块内出现非字符串行：不是纯字符串列表，放弃整块，本行按顶层规则处理
        }

        if let Some(caps) = pats.single.captures(line) {
            if let (Some(k), Some(m)) = (caps.get(1), caps.get(2)) {
                push_hit(text, &mut hits, &mut seen, k.as_str(), None, line_no, abs(m.range()))?;
            }
        } else if let Some(caps) = pats.block_start.captures(line) {
            if let Some(k) = caps.get(1) {
                block = Some(Block {
                    key: k.as_str().to_string(),
                    items: Vec::new(),
                });
            }
        } else if let Some(caps) = pats.inline_list.captures(line) {
            if let (Some(k), Some(body)) = (caps.get(1), caps.get(2)) {
                let spans = inline_literals(body.as_str());
                if let Some(spans) = spans {
                    for (i, r) in spans.into_iter().enumerate() {
                        let span = abs(body.start() + r.start..body.start() + r.end);
                        push_hit(text, &mut hits, &mut seen, k.as_str(), Some(i), line_no, span)?;
                    }
                }
            }
        }
    }
    Ok(hits)
}

/// 行内列表中每个字面量内容的区间；元素之间只能是空白和逗号，否则不是字符串列表。
/// 逐个匹配完整字面量，字符串内的 `","` 或转义引号不会被误拆
fn inline_literals(body: &str) -> Option<Vec<Range<usize>>> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for caps in patterns().literal.captures_iter(body) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !is_list_gap(&body[cursor..whole.start()]) {
            return None;
        }
        spans.push(inner.range());
        cursor = whole.end();
    }
    if !is_list_gap(&body[cursor..]) {
        return None;
    }
    Some(spans)
}

fn is_list_gap(s: &str) -> bool {
    s.chars().all(|c| c.is_whitespace() || c == ',')
}

fn push_hit(
    text: &str,
    hits: &mut Vec<Hit>,
    seen: &mut HashSet<String>,
    key: &str,
    index: Option<usize>,
    line_no: usize,
    span: Range<usize>,
) -> Result<(), TranscodeError> {
    let unescaped = unescape(&text[span.clone()]).map_err(|(at, reason)| ParseError {
        position: Position::from_offset(text, span.start + at),
        reason,
    })?;

    let mut path = Path::root();
    path.extend_key(key);
    if let Some(i) = index {
        path.push(Segment::Index(i));
    }
    let identifier = path.encode();
    let context = format!("line {}", line_no);
    if !seen.insert(identifier.clone()) {
        return Err(ExtractError::DuplicateIdentifier { identifier, context }.into());
    }

    hits.push(Hit {
        unit: StringUnit {
            identifier,
            text: unescaped,
            context,
        },
        key: key.to_string(),
        span,
    });
    Ok(())
}

/// 行模式抽取
pub fn extract(text: &str, options: &ExtractOptions) -> Result<Vec<StringUnit>, TranscodeError> {
    Ok(scan(text)?
        .into_iter()
        .filter(|h| options.keeps(Some(&h.key), &h.unit.text))
        .map(|h| h.unit)
        .collect())
}

/// 行模式回写：只替换命中字面量的内容，其余字节原样保留
pub fn apply(text: &str, translations: &Translations) -> Result<String, TranscodeError> {
    let by_id: BTreeMap<String, Range<usize>> = scan(text)?
        .into_iter()
        .map(|h| (h.unit.identifier, h.span))
        .collect();

    // 按规范标识符去重：`title` 与 `"title"` 指向同一字面量，后者覆盖
    let mut edits: BTreeMap<String, (Range<usize>, String)> = BTreeMap::new();
    for (identifier, translated) in translations {
        let canonical = Path::decode(identifier)
            .map_err(|source| ApplyError::Decode {
                identifier: identifier.clone(),
                source,
            })?
            .encode();
        let Some(span) = by_id.get(&canonical) else {
            return Err(ApplyError::Dangling {
                identifier: identifier.clone(),
            }
            .into());
        };
        let replacement = escape_string(translated)?;
        if edits.insert(canonical, (span.clone(), replacement)).is_some() {
            tracing::warn!("多个标识符指向同一字符串，保留最后一条: {}", identifier);
        }
        tracing::debug!("行模式回写 {} -> {:?}", identifier, translated);
    }
    let mut edits: Vec<(Range<usize>, String)> = edits.into_values().collect();
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        if span.start < cursor {
            tracing::warn!("跳过重叠的替换区间 {:?}", span);
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}
