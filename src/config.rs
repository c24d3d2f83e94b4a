//! 转码配置：显式传入入口函数的配置结构，可从 TOML 文件加载

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败 {config_path}: {source}")]
    Read {
        config_path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置文件失败 {config_path}: {source}")]
    Parse {
        config_path: PathBuf,
        source: toml::de::Error,
    },
    #[error("签名正则无效 `{pattern}`: {source}")]
    Pattern { pattern: String, source: regex::Error },
}

/// 解析策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// 完整解析为值树（默认）
    #[default]
    Tree,
    /// 降级模式：逐行正则匹配，仅用于无法完整解析的文件
    LineBased,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub strategy: Strategy,
    pub extract: ExtractOptions,
    pub serialize: SerializeOptions,
    pub assemble: AssembleOptions,
    pub signature: FileSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// 跳过空字符串（任务描述里的空行占位）
    pub skip_empty: bool,
    /// 最近的复合键名在此列表中的字符串不抽取（如 `id`、`icon`）
    pub exclude_keys: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            skip_empty: true,
            exclude_keys: Vec::new(),
        }
    }
}

impl ExtractOptions {
    pub fn keeps(&self, nearest_key: Option<&str>, text: &str) -> bool {
        if self.skip_empty && text.is_empty() {
            return false;
        }
        match nearest_key {
            Some(k) => !self.exclude_keys.iter().any(|x| x == k),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// 每层缩进
    pub indent: String,
    /// 条目之间是否加逗号（默认按 FTB Quests 风格只换行）
    pub commas: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: "\t".to_string(),
            commas: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOptions {
    /// 连续键段合并为一个带点的扁平键（语言文件布局）
    pub flat_keys: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self { flat_keys: true }
    }
}

/// 文件签名：判断文件名/内容是否归本转码器处理
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSignature {
    pub file_name: String,
    pub file_content: String,
}

impl Default for FileSignature {
    fn default() -> Self {
        Self {
            file_name: r".*\.snbt$".to_string(),
            file_content: ".*".to_string(),
        }
    }
}

impl FileSignature {
    pub fn matches(&self, file_name: &str, content: &str) -> Result<bool, ConfigError> {
        Ok(compile(&self.file_name)?.is_match(file_name) && compile(&self.file_content)?.is_match(content))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        compile(&self.file_name)?;
        compile(&self.file_content)?;
        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl TranscoderConfig {
    /// 文件不存在时返回 `Ok(None)`
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            config_path: config_path.to_path_buf(),
            source,
        })?;

        let config: TranscoderConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            config_path: config_path.to_path_buf(),
            source,
        })?;
        config.signature.validate()?;

        tracing::info!("已加载配置: {}", config_path.display());
        Ok(Some(config))
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = TranscoderConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert!(result.is_none(), "不存在的配置文件应返回 None");
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
strategy = "line-based"

[extract]
exclude_keys = ["id", "icon"]
"#
        )
        .unwrap();

        let config = TranscoderConfig::load_from_path(file.path()).unwrap().unwrap();
        assert_eq!(config.strategy, Strategy::LineBased);
        assert_eq!(config.extract.exclude_keys, vec!["id", "icon"]);
        assert!(config.extract.skip_empty, "未指定的字段应保持默认值");
        assert_eq!(config.serialize.indent, "\t");
        assert!(config.assemble.flat_keys);
    }

    #[test]
    fn test_invalid_toml_and_pattern() {
        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "strategy = ").unwrap();
        assert!(matches!(
            TranscoderConfig::load_from_path(bad.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut bad_pattern = NamedTempFile::new().unwrap();
        write!(bad_pattern, "[signature]\nfile_name = \"(\"\n").unwrap();
        assert!(matches!(
            TranscoderConfig::load_from_path(bad_pattern.path()),
            Err(ConfigError::Pattern { .. })
        ));
    }

    #[test]
    fn test_default_signature() {
        let sig = FileSignature::default();
        assert!(sig.matches("en_us.snbt", "{}").unwrap());
        assert!(!sig.matches("en_us.json", "{}").unwrap());
    }

    #[test]
    fn test_extract_filter() {
        let opts = ExtractOptions {
            skip_empty: true,
            exclude_keys: vec!["id".into()],
        };
        assert!(!opts.keeps(Some("title"), ""));
        assert!(!opts.keeps(Some("id"), "0D6D45DBA64E612D"));
        assert!(opts.keeps(Some("title"), "Old Title"));
        assert!(opts.keeps(None, "root list item"));
    }
}
