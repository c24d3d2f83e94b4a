//! 转码入口：parse_file / build_file / assemble_file
//!
//! 按配置选择值树模式或逐行模式，统一错误类型。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, Strategy, TranscoderConfig};
use crate::model::applier::{self, ApplyError, Translations};
use crate::model::extractor::{self, ExtractError, StringUnit};
use crate::model::line_scan;
use crate::model::parser::{parse, ParseError};
use crate::model::path::DecodeError;
use crate::model::serializer::{serialize_with, SerializeError};
use crate::utils::preview::render_preview;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("SNBT解析失败: {0}")]
    Parse(#[from] ParseError),
    #[error("标识符 `{identifier}` 无法解码: {source}")]
    Decode { identifier: String, source: DecodeError },
    #[error("译文回写失败: {0}")]
    Apply(ApplyError),
    #[error("序列化失败: {0}")]
    Serialize(#[from] SerializeError),
    #[error("抽取失败: {0}")]
    Extract(#[from] ExtractError),
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl From<ApplyError> for TranscodeError {
    fn from(e: ApplyError) -> Self {
        match e {
            ApplyError::Decode { identifier, source } => Self::Decode { identifier, source },
            other => Self::Apply(other),
        }
    }
}

/// 交给宿主的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Parse,
    Decode,
    Apply,
    Serialize,
    Extract,
    Io,
    Json,
    Config,
}

impl TranscodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Apply(_) => ErrorKind::Apply,
            Self::Serialize(_) => ErrorKind::Serialize,
            Self::Extract(_) => ErrorKind::Extract,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// 结构化错误：类别 + 可读信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// 一条译文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub identifier: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    pub units: Vec<StringUnit>,
    /// HTML 预览文档
    pub preview: String,
}

/// 解析源文件，抽取可翻译单元并生成预览
pub fn parse_file(content: &str, config: &TranscoderConfig) -> Result<ParsedFile, TranscodeError> {
    let units = match config.strategy {
        Strategy::Tree => {
            let tree = parse(content)?;
            extractor::extract(&tree, &config.extract)?
        }
        Strategy::LineBased => line_scan::extract(content, &config.extract)?,
    };
    tracing::info!("解析完成（{:?}）: {} 个可翻译字符串", config.strategy, units.len());

    let preview = render_preview(&units);
    Ok(ParsedFile { units, preview })
}

/// 把译文写回源文件，返回新文件文本。未出现在译文里的字符串保留原文
pub fn build_file(
    content: &str,
    entries: &[TranslationEntry],
    config: &TranscoderConfig,
) -> Result<String, TranscodeError> {
    let translations = collect_translations(entries);
    let output = match config.strategy {
        Strategy::Tree => {
            let mut tree = parse(content)?;
            let applied = applier::apply_in_place(&mut tree, &translations)?;
            tracing::info!("回写完成: {} 条译文", applied);
            serialize_with(&tree, &config.serialize)?
        }
        Strategy::LineBased => {
            let output = line_scan::apply(content, &translations)?;
            tracing::info!("逐行回写完成: {} 条译文", translations.len());
            output
        }
    };
    Ok(output)
}

/// 没有目标文件时，仅凭译文生成新文件
pub fn assemble_file(entries: &[TranslationEntry], config: &TranscoderConfig) -> Result<String, TranscodeError> {
    let translations = collect_translations(entries);
    let tree = applier::assemble(&translations, config.assemble.flat_keys)?;
    tracing::info!("已从 {} 条译文构建新文件", translations.len());
    Ok(serialize_with(&tree, &config.serialize)?)
}

/// 同一标识符出现多次时后者覆盖前者
pub fn collect_translations(entries: &[TranslationEntry]) -> Translations {
    let mut translations = Translations::new();
    for entry in entries {
        if translations
            .insert(entry.identifier.clone(), entry.text.clone())
            .is_some()
        {
            tracing::warn!("译文重复，保留最后一条: {}", entry.identifier);
        }
    }
    translations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::Value;

    const LANG: &str = r#"{
	quest.0D6D45DBA64E612D.title: "Old Title"
	quest.0D6D45DBA64E612D.quest_desc: ["Line one", "Line two"]
}"#;

    fn entry(identifier: &str, text: &str) -> TranslationEntry {
        TranslationEntry {
            identifier: identifier.into(),
            text: text.into(),
        }
    }

    fn line_based() -> TranscoderConfig {
        TranscoderConfig::default().with_strategy(Strategy::LineBased)
    }

    #[test]
    fn test_quest_title_round_trip() {
        let config = TranscoderConfig::default();
        let parsed = parse_file(LANG, &config).unwrap();

        let ids: Vec<&str> = parsed.units.iter().map(|u| u.identifier.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "quest.0D6D45DBA64E612D.title",
                "quest.0D6D45DBA64E612D.quest_desc[0]",
                "quest.0D6D45DBA64E612D.quest_desc[1]",
            ]
        );

        let out = build_file(LANG, &[entry("quest.0D6D45DBA64E612D.title", "New Title")], &config).unwrap();
        let tree = parse(&out).unwrap();
        let root = tree.as_compound().unwrap();
        assert_eq!(
            root.get("quest.0D6D45DBA64E612D.title").and_then(Value::as_str),
            Some("New Title")
        );
        assert_eq!(
            root.get("quest.0D6D45DBA64E612D.quest_desc"),
            parse(LANG).unwrap().as_compound().unwrap().get("quest.0D6D45DBA64E612D.quest_desc")
        );
    }

    #[test]
    fn test_embedded_newline_survives() {
        let config = TranscoderConfig::default();
        let out = build_file(LANG, &[entry("quest.0D6D45DBA64E612D.title", "Line\nBreak")], &config).unwrap();

        assert!(out.contains(r#""Line\nBreak""#), "换行应以转义形式写出: {}", out);
        let again = parse_file(&out, &config).unwrap();
        assert_eq!(again.units[0].text, "Line\nBreak");
    }

    #[test]
    fn test_subset_translation_keeps_other_strings() {
        let config = TranscoderConfig::default();
        let out = build_file(LANG, &[entry("quest.0D6D45DBA64E612D.quest_desc[1]", "第二行")], &config).unwrap();

        let texts: Vec<String> = parse_file(&out, &config)
            .unwrap()
            .units
            .into_iter()
            .map(|u| u.text)
            .collect();
        assert_eq!(texts, vec!["Old Title", "Line one", "第二行"]);
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        for config in [TranscoderConfig::default(), line_based()] {
            let err = build_file(LANG, &[entry("quest.0D6D45DBA64E612D.subtitle", "x")], &config).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Apply, "{:?}", config.strategy);
        }
    }

    #[test]
    fn test_error_kinds() {
        let config = TranscoderConfig::default();
        assert_eq!(parse_file("{ a: ", &config).unwrap_err().kind(), ErrorKind::Parse);
        assert_eq!(
            build_file(LANG, &[entry("quest..title", "x")], &config).unwrap_err().kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            parse_file(r#"{ a.b: "x", a: { b: "y" } }"#, &config).unwrap_err().kind(),
            ErrorKind::Extract
        );

        let report = parse_file("[1 2]", &config).unwrap_err().report();
        assert_eq!(report.kind, ErrorKind::Parse);
        assert!(report.message.contains("第 1 行"), "{}", report.message);
        assert_eq!(serde_json::to_value(&report).unwrap()["kind"], "parse");
    }

    #[test]
    fn test_strategies_agree_on_identifiers() {
        let tree_units = parse_file(LANG, &TranscoderConfig::default()).unwrap().units;
        let line_units = parse_file(LANG, &line_based()).unwrap().units;

        let ids = |units: &[StringUnit]| units.iter().map(|u| u.identifier.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&tree_units), ids(&line_units));
    }

    #[test]
    fn test_line_based_build_keeps_layout() {
        let src = "{\n    // 注释行会被值树模式拒绝\n    quest.A.title: \"Old\",\n}\n";
        assert!(parse_file(src, &TranscoderConfig::default()).is_err());

        let out = build_file(src, &[entry("quest.A.title", "新")], &line_based()).unwrap();
        assert_eq!(out, src.replace("Old", "新"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = TranscoderConfig::default();
        let entries = [entry("quest.0D6D45DBA64E612D.quest_desc[0]", "一"), entry("quest.0D6D45DBA64E612D.title", "题")];
        let first = build_file(LANG, &entries, &config).unwrap();
        let second = build_file(LANG, &entries, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_entries_last_wins() {
        let t = collect_translations(&[entry("a", "1"), entry("b", "2"), entry("a", "3")]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("a").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_assemble_file_reparses() {
        let config = TranscoderConfig::default();
        let entries = [
            entry("quest.0D6D45DBA64E612D.title", "新标题"),
            entry("quest.0D6D45DBA64E612D.quest_desc[0]", "第一行"),
        ];
        let out = assemble_file(&entries, &config).unwrap();

        let units = parse_file(&out, &config).unwrap().units;
        let pairs: Vec<(&str, &str)> = units.iter().map(|u| (u.identifier.as_str(), u.text.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("quest.0D6D45DBA64E612D.quest_desc[0]", "第一行"),
                ("quest.0D6D45DBA64E612D.title", "新标题"),
            ]
        );
    }

    #[test]
    fn test_preview_is_attached() {
        let parsed = parse_file(LANG, &TranscoderConfig::default()).unwrap();
        assert!(parsed.preview.contains("data-identifier=\"quest.0D6D45DBA64E612D.title\""));
        assert!(parsed.preview.contains("Old Title"));
    }

    #[test]
    fn test_equivalent_spellings_do_not_break_build() {
        let src = "{\n\ttitle: \"Old\"\n}\n";
        let entries = [entry("title", "A"), entry(r#""title""#, "B")];
        for config in [TranscoderConfig::default(), line_based()] {
            let out = build_file(src, &entries, &config).unwrap();
            assert_eq!(out, "{\n\ttitle: \"A\"\n}\n", "{:?}", config.strategy);
        }
    }

    #[test]
    fn test_assemble_rejects_excessive_nesting() {
        let deep = format!("a{}", "[0]".repeat(100_000));
        let err = assemble_file(&[entry(&deep, "x")], &TranscoderConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Apply);
        assert!(matches!(err, TranscodeError::Apply(ApplyError::TooDeep { .. })));
    }
}
