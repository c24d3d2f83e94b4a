//! 路径寻址：树中位置 <-> 规范标识符字符串（如 `quest.0D6D.quest_desc[2]`）
//!
//! 标识符是抽取与回写之间唯一需要持久化的契约，编码必须稳定。

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::value::Value;

/// 路径段：复合键或列表下标
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("标识符为空")]
    Empty,
    #[error("位置 {position}: 键段为空")]
    EmptyKey { position: usize },
    #[error("位置 {position}: 意外字符 '{found}'")]
    UnexpectedChar { position: usize, found: char },
    #[error("位置 {position}: 方括号未闭合")]
    UnbalancedBracket { position: usize },
    #[error("位置 {position}: 下标不能为负数")]
    NegativeIndex { position: usize },
    #[error("位置 {position}: 无效下标 `{text}`")]
    InvalidIndex { position: usize, text: String },
    #[error("位置 {position}: 引号未闭合")]
    UnterminatedQuote { position: usize },
    #[error("位置 {position}: 无效转义 '\\{found}'")]
    InvalidEscape { position: usize, found: char },
    #[error("首段为{found}，但根节点是{root}")]
    RootMismatch { found: &'static str, root: &'static str },
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// 复合键对应的逻辑段：`quest.0D6D.title` 这类扁平语言文件键，
    /// 每一部分都能作为裸段时拆成多个键段，否则整体作为一个（带引号的）键段
    pub fn key_segments(key: &str) -> Vec<Segment> {
        if key.contains('.') {
            let parts: Vec<&str> = key.split('.').collect();
            if parts.iter().all(|p| is_bare_segment(p)) {
                return parts.into_iter().map(|p| Segment::Key(p.to_string())).collect();
            }
        }
        vec![Segment::Key(key.to_string())]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    pub fn extend_key(&mut self, key: &str) {
        self.segments.extend(Self::key_segments(key));
    }

    pub fn truncate(&mut self, len: usize) {
        self.segments.truncate(len);
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Key(k) => {
                    if i > 0 {
                        out.push('.');
                    }
                    write_key(&mut out, k);
                }
                Segment::Index(n) => {
                    out.push('[');
                    out.push_str(&n.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// 严格解码：拒绝尾随垃圾、负数/非数字下标、空键段
    pub fn decode(identifier: &str) -> Result<Path, DecodeError> {
        if identifier.is_empty() {
            return Err(DecodeError::Empty);
        }
        Decoder { src: identifier, pos: 0 }.run()
    }

    /// 解码并按根节点类型校验首段：首段为下标时根必须是列表，首段为键时根必须是复合
    pub fn decode_against(identifier: &str, root: &Value) -> Result<Path, DecodeError> {
        let path = Self::decode(identifier)?;
        match (path.segments.first(), root) {
            (Some(Segment::Index(_)), Value::List(_)) | (Some(Segment::Key(_)), Value::Compound(_)) => {
                Ok(path)
            }
            (Some(Segment::Index(_)), other) => Err(DecodeError::RootMismatch {
                found: "下标",
                root: other.kind().name(),
            }),
            (_, other) => Err(DecodeError::RootMismatch {
                found: "键",
                root: other.kind().name(),
            }),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Path {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::decode(s)
    }
}

/// 可以不加引号写出的键段
pub(crate) fn is_bare_segment(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| !matches!(c, '.' | '[' | ']' | '"' | '\\') && !c.is_whitespace() && !c.is_control())
}

fn write_key(out: &mut String, key: &str) {
    if is_bare_segment(key) {
        out.push_str(key);
        return;
    }
    out.push('"');
    for c in key.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

struct Decoder<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn run(mut self) -> Result<Path, DecodeError> {
        let mut segments = Vec::new();
        // 首段可以是键或下标
        match self.peek() {
            Some('[') => segments.push(self.index()?),
            _ => segments.push(self.key()?),
        }
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.bump();
                    segments.push(self.key()?);
                }
                '[' => segments.push(self.index()?),
                other => {
                    return Err(DecodeError::UnexpectedChar {
                        position: self.pos,
                        found: other,
                    })
                }
            }
        }
        Ok(Path { segments })
    }

    fn key(&mut self) -> Result<Segment, DecodeError> {
        let start = self.pos;
        match self.peek() {
            Some('"') => {
                self.bump();
                let mut key = String::new();
                loop {
                    match self.bump() {
                        None => return Err(DecodeError::UnterminatedQuote { position: start }),
                        Some('"') => return Ok(Segment::Key(key)),
                        Some('\\') => {
                            let at = self.pos;
                            match self.bump() {
                                Some(c @ ('"' | '\\')) => key.push(c),
                                Some(other) => {
                                    return Err(DecodeError::InvalidEscape {
                                        position: at,
                                        found: other,
                                    })
                                }
                                None => return Err(DecodeError::UnterminatedQuote { position: start }),
                            }
                        }
                        Some(c) => key.push(c),
                    }
                }
            }
            _ => {
                while let Some(c) = self.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    if matches!(c, ']' | '"' | '\\') || c.is_whitespace() || c.is_control() {
                        return Err(DecodeError::UnexpectedChar {
                            position: self.pos,
                            found: c,
                        });
                    }
                    self.bump();
                }
                if self.pos == start {
                    return Err(DecodeError::EmptyKey { position: start });
                }
                Ok(Segment::Key(self.src[start..self.pos].to_string()))
            }
        }
    }

    fn index(&mut self) -> Result<Segment, DecodeError> {
        let open = self.pos;
        self.bump(); // '['
        let digits_start = self.pos;
        let Some(close) = self.src[digits_start..].find(']').map(|i| digits_start + i) else {
            return Err(DecodeError::UnbalancedBracket { position: open });
        };
        let text = &self.src[digits_start..close];
        if text.starts_with('-') {
            return Err(DecodeError::NegativeIndex { position: digits_start });
        }
        let canonical = !text.is_empty()
            && text.chars().all(|c| c.is_ascii_digit())
            && (text == "0" || !text.starts_with('0'));
        if !canonical {
            return Err(DecodeError::InvalidIndex {
                position: digits_start,
                text: text.to_string(),
            });
        }
        let n = text.parse::<usize>().map_err(|_| DecodeError::InvalidIndex {
            position: digits_start,
            text: text.to_string(),
        })?;
        self.pos = close + 1;
        Ok(Segment::Index(n))
    }
}
