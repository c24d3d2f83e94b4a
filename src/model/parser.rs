//! 结构化解析器：SNBT 文本 -> 值树
//!
//! 手写递归下降。支持复合 `{ k: v }`、列表 `[ v ]`、类型数组 `[I; 1, 2]`、
//! 单/双引号字符串以及裸标量；条目之间用逗号或换行分隔（FTB Quests 的写法）。
//! 失败时返回带行列号的错误，不返回部分结果。

use std::fmt;

use thiserror::Error;

use crate::model::value::{Compound, Value};

/// 嵌套深度上限，防止恶意输入耗尽栈
pub const MAX_DEPTH: usize = 128;

/// 源文本位置：字节偏移 + 1 起始的行列号（列按字符计）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn from_offset(src: &str, offset: usize) -> Self {
        let offset = offset.min(src.len());
        let before = &src[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = src[line_start..offset].chars().count() + 1;
        Self { offset, line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "第 {} 行第 {} 列", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorReason {
    UnterminatedString,
    InvalidEscape(char),
    ControlCharacter(char),
    UnexpectedToken { expected: &'static str, found: Option<char> },
    UnclosedDelimiter(char),
    MismatchedDelimiter { expected: char, found: char },
    DuplicateKey(String),
    TrailingContent,
    RootNotContainer,
    TooDeep,
}

impl fmt::Display for ParseErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => write!(f, "字符串未闭合"),
            Self::InvalidEscape(c) => write!(f, "无效转义 '\\{}'", c),
            Self::ControlCharacter(c) => write!(f, "字符串中出现控制字符 U+{:04X}", *c as u32),
            Self::UnexpectedToken { expected, found: Some(c) } => {
                write!(f, "期望{}，实际为 '{}'", expected, c)
            }
            Self::UnexpectedToken { expected, found: None } => {
                write!(f, "期望{}，实际已到文件末尾", expected)
            }
            Self::UnclosedDelimiter(c) => write!(f, "'{}' 未闭合", c),
            Self::MismatchedDelimiter { expected, found } => {
                write!(f, "括号不匹配：期望 '{}'，实际为 '{}'", expected, found)
            }
            Self::DuplicateKey(k) => write!(f, "重复的键 `{}`", k),
            Self::TrailingContent => write!(f, "根节点之后还有多余内容"),
            Self::RootNotContainer => write!(f, "根节点必须是复合或列表"),
            Self::TooDeep => write!(f, "嵌套超过 {} 层", MAX_DEPTH),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{position}: {reason}")]
pub struct ParseError {
    pub position: Position,
    pub reason: ParseErrorReason,
}

/// 解析整个文档
pub fn parse(src: &str) -> Result<Value, ParseError> {
    let mut p = Parser { src, pos: 0, depth: 0 };
    p.skip_ws();
    match p.peek() {
        Some('{') | Some('[') => {}
        Some(_) => return Err(p.error_at(p.pos, ParseErrorReason::RootNotContainer)),
        None => {
            return Err(p.error_at(
                p.pos,
                ParseErrorReason::UnexpectedToken { expected: "'{' 或 '['", found: None },
            ))
        }
    }
    let root = p.value()?;
    p.skip_ws();
    if p.peek().is_some() {
        return Err(p.error_at(p.pos, ParseErrorReason::TrailingContent));
    }
    Ok(root)
}

/// 反转义字符串字面量内容（不含引号），供行模式复用；错误偏移相对于 `raw`
pub(crate) fn unescape(raw: &str) -> Result<String, (usize, ParseErrorReason)> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, e)) => out.push(escape_target(e).ok_or((i, ParseErrorReason::InvalidEscape(e)))?),
                None => return Err((i, ParseErrorReason::UnterminatedString)),
            },
            c if c.is_control() && c != '\t' => {
                return Err((i, ParseErrorReason::ControlCharacter(c)))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn escape_target(e: char) -> Option<char> {
    match e {
        '"' => Some('"'),
        '\'' => Some('\''),
        '\\' => Some('\\'),
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        _ => None,
    }
}

/// 裸键/裸标量允许的字符
pub(crate) fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error_at(&self, offset: usize, reason: ParseErrorReason) -> ParseError {
        ParseError {
            position: Position::from_offset(self.src, offset),
            reason,
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        self.error_at(
            self.pos,
            ParseErrorReason::UnexpectedToken { expected, found: self.peek() },
        )
    }

    /// 跳过空白，返回其中是否含换行
    fn skip_ws(&mut self) -> bool {
        let mut newline = false;
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            newline |= c == '\n';
            self.bump();
        }
        newline
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        match self.peek() {
            Some('{') => self.nested(|p| p.compound()),
            Some('[') => self.nested(|p| p.list()),
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some(c) if is_bare_char(c) => Ok(Value::Opaque(self.bare().to_string())),
            _ => Err(self.unexpected("值")),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<Value, ParseError>) -> Result<Value, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_at(self.pos, ParseErrorReason::TooDeep));
        }
        self.depth += 1;
        let v = f(self);
        self.depth -= 1;
        v
    }

    fn bare(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_bare_char(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let Some(quote) = self.bump() else {
            return Err(self.unexpected("字符串"));
        };
        let mut out = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error_at(start, ParseErrorReason::UnterminatedString))
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.error_at(start, ParseErrorReason::UnterminatedString)),
                    Some(e) => match escape_target(e) {
                        Some(t) => out.push(t),
                        None => return Err(self.error_at(at, ParseErrorReason::InvalidEscape(e))),
                    },
                },
                Some(c) if c.is_control() && c != '\t' => {
                    return Err(self.error_at(at, ParseErrorReason::ControlCharacter(c)))
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn key(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some('"') | Some('\'') => self.string(),
            Some(c) if is_bare_char(c) => Ok(self.bare().to_string()),
            _ => Err(self.unexpected("键")),
        }
    }

    /// 条目之间的分隔：逗号，或至少一个换行；返回 true 表示遇到了闭合符
    fn separator(&mut self, open: usize, close: char) -> Result<bool, ParseError> {
        let newline = self.skip_ws();
        if self.peek() == Some(',') {
            self.bump();
            self.skip_ws();
            return self.at_close(open, close);
        }
        match self.peek() {
            Some('}') | Some(']') | None => self.at_close(open, close),
            Some(_) if newline => Ok(false),
            Some(_) => Err(self.unexpected("',' 或换行")),
        }
    }

    /// 检查当前位置是否为闭合符；遇到另一种闭合符视为括号不匹配
    fn at_close(&self, open: usize, close: char) -> Result<bool, ParseError> {
        match self.peek() {
            Some(c) if c == close => Ok(true),
            Some(c @ ('}' | ']')) => Err(self.error_at(
                self.pos,
                ParseErrorReason::MismatchedDelimiter { expected: close, found: c },
            )),
            None => Err(self.error_at(open, ParseErrorReason::UnclosedDelimiter(opening(close)))),
            Some(_) => Ok(false),
        }
    }

    fn compound(&mut self) -> Result<Value, ParseError> {
        let open = self.pos;
        self.bump(); // '{'
        let mut compound = Compound::new();
        self.skip_ws();
        let mut done = self.at_close(open, '}')?;
        while !done {
            let key_at = self.pos;
            let key = self.key()?;
            self.skip_ws();
            if self.peek() != Some(':') {
                return Err(self.unexpected("':'"));
            }
            self.bump();
            self.skip_ws();
            let value = self.value()?;
            if compound.insert(key.clone(), value).is_err() {
                return Err(self.error_at(key_at, ParseErrorReason::DuplicateKey(key)));
            }
            done = self.separator(open, '}')?;
        }
        self.bump(); // '}'
        Ok(Value::Compound(compound))
    }

    fn list(&mut self) -> Result<Value, ParseError> {
        let open = self.pos;
        self.bump(); // '['
        if let Some(tag) = self.typed_array_tag() {
            return self.typed_array(open, tag);
        }
        let mut items = Vec::new();
        self.skip_ws();
        let mut done = self.at_close(open, ']')?;
        while !done {
            items.push(self.value()?);
            done = self.separator(open, ']')?;
        }
        self.bump(); // ']'
        Ok(Value::List(items))
    }

    /// `[B;` / `[I;` / `[L;` 前缀：命中时消费到分号之后
    fn typed_array_tag(&mut self) -> Option<char> {
        let rest = &self.src[self.pos..];
        let mut chars = rest.char_indices();
        let (_, tag) = chars.next()?;
        if !matches!(tag, 'B' | 'I' | 'L') {
            return None;
        }
        for (i, c) in chars {
            if c == ';' {
                self.pos += i + 1;
                return Some(tag);
            }
            if !c.is_whitespace() {
                return None;
            }
        }
        None
    }

    fn typed_array(&mut self, open: usize, tag: char) -> Result<Value, ParseError> {
        let mut elements: Vec<&str> = Vec::new();
        self.skip_ws();
        let mut done = self.at_close(open, ']')?;
        while !done {
            match self.peek() {
                Some(c) if is_bare_char(c) => elements.push(self.bare()),
                _ => return Err(self.unexpected("数组元素")),
            }
            done = self.separator(open, ']')?;
        }
        self.bump(); // ']'
        let body = elements.join(", ");
        let text = if body.is_empty() {
            format!("[{};]", tag)
        } else {
            format!("[{}; {}]", tag, body)
        };
        Ok(Value::Opaque(text))
    }
}

fn opening(close: char) -> char {
    match close {
        '}' => '{',
        _ => '[',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::ValueKind;

    fn reason(src: &str) -> ParseErrorReason {
        parse(src).expect_err("应该解析失败").reason
    }

    #[test]
    fn test_parse_lang_file() {
        let src = r#"{
	quest.0D6D45DBA64E612D.title: "Old Title"
	quest.0D6D45DBA64E612D.quest_desc: [
		"Line one"
		"Line two"
	]
}
"#;
        let root = parse(src).unwrap();
        let c = root.as_compound().unwrap();

        assert_eq!(c.keys().collect::<Vec<_>>(), vec![
            "quest.0D6D45DBA64E612D.title",
            "quest.0D6D45DBA64E612D.quest_desc"
        ]);
        let desc = c.get("quest.0D6D45DBA64E612D.quest_desc").and_then(Value::as_list).unwrap();
        assert_eq!(desc, &[Value::String("Line one".into()), Value::String("Line two".into())]);
    }

    #[test]
    fn test_parse_chapter_with_opaque_values() {
        let src = r#"{
	default_hide_dependency_lines: false
	filename: "getting_started"
	order_index: 0
	quests: [{
		x: -1.5d
		y: 0.0d
		title: 'It\'s a start'
		dependencies: ["5B9C1C8E0E5B6B2A"]
		flags: [I; 1, 2 ,3]
	}]
}"#;
        let root = parse(src).unwrap();
        let c = root.as_compound().unwrap();

        assert_eq!(c.get("default_hide_dependency_lines"), Some(&Value::Opaque("false".into())));
        let quest = c.get("quests").and_then(Value::as_list).unwrap()[0].as_compound().unwrap();
        assert_eq!(quest.get("x"), Some(&Value::Opaque("-1.5d".into())));
        assert_eq!(quest.get("title").and_then(Value::as_str), Some("It's a start"));
        assert_eq!(quest.get("flags"), Some(&Value::Opaque("[I; 1, 2, 3]".into())), "类型数组应规范化");
    }

    #[test]
    fn test_commas_and_single_line() {
        let root = parse(r#"{a: "x", b: [1b, 2b,], c: {}}"#).unwrap();
        let c = root.as_compound().unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.get("b").map(Value::children), Some(2));
        assert_eq!(c.get("c").map(Value::kind), Some(ValueKind::Compound));
    }

    #[test]
    fn test_escapes_are_unescaped() {
        let root = parse(r#"{t: "Line\nBreak \"q\" back\\slash\ttab"}"#).unwrap();
        let text = root.as_compound().unwrap().get("t").and_then(Value::as_str).unwrap();
        assert_eq!(text, "Line\nBreak \"q\" back\\slash\ttab");
    }

    #[test]
    fn test_root_list() {
        let root = parse(r#"["a", "b"]"#).unwrap();
        assert_eq!(root.children(), 2);
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = parse("{\n  title: \"never closed\n}").unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::UnterminatedString);
        assert_eq!((err.position.line, err.position.column), (2, 10));
    }

    #[test]
    fn test_unbalanced_delimiters() {
        assert_eq!(reason("{a: [\"x\"}"), ParseErrorReason::MismatchedDelimiter { expected: ']', found: '}' });
        assert_eq!(reason("{a: 1\n"), ParseErrorReason::UnclosedDelimiter('{'));
        assert_eq!(reason("[\"a\""), ParseErrorReason::UnclosedDelimiter('['));
        assert_eq!(reason("{a: 1}}"), ParseErrorReason::TrailingContent);
    }

    #[test]
    fn test_unexpected_tokens() {
        assert!(matches!(reason("{a: 1 b: 2}"), ParseErrorReason::UnexpectedToken { found: Some('b'), .. }));
        assert!(matches!(reason("{a 1}"), ParseErrorReason::UnexpectedToken { found: Some('1'), .. }));
        assert!(matches!(reason("{a: ,}"), ParseErrorReason::UnexpectedToken { found: Some(','), .. }));
        assert!(matches!(reason("{a: 1,,}"), ParseErrorReason::UnexpectedToken { found: Some(','), .. }));
        assert!(matches!(reason(""), ParseErrorReason::UnexpectedToken { found: None, .. }));
    }

    #[test]
    fn test_rejects_bad_strings_and_keys() {
        assert_eq!(reason(r#"{a: "bad \q"}"#), ParseErrorReason::InvalidEscape('q'));
        assert_eq!(reason("{a: \"bell\u{7}\"}"), ParseErrorReason::ControlCharacter('\u{7}'));
        assert_eq!(reason("{a: 1\na: 2}"), ParseErrorReason::DuplicateKey("a".into()));
        assert_eq!(reason("\"just a string\""), ParseErrorReason::RootNotContainer);
    }

    #[test]
    fn test_depth_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert_eq!(reason(&deep), ParseErrorReason::TooDeep);

        let ok = "[".repeat(10) + &"]".repeat(10);
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_unescape_helper() {
        assert_eq!(unescape(r#"a\nb\"c"#).unwrap(), "a\nb\"c");
        assert_eq!(unescape(r"x\z"), Err((1, ParseErrorReason::InvalidEscape('z'))));
    }

    #[test]
    fn test_position_counts_characters() {
        let src = "{\n\t标题: \"x\" ?";
        let p = Position::from_offset(src, src.find('?').unwrap());
        assert_eq!((p.line, p.column), (2, 10));
    }
}
