//! SNBT 翻译转码库
//!
//! 解析 FTB Quests 任务/语言文件（SNBT），抽取可翻译字符串并赋予稳定地址，
//! 再把译文按地址写回，生成结构等价的新文件。
//! 提供完整值树模式与逐行降级模式两种策略。

pub mod config;
pub mod model;
pub mod utils;

// 重新导出主要类型
pub use config::{Strategy, TranscoderConfig};
pub use model::extractor::StringUnit;
pub use model::transcoder::{
    assemble_file, build_file, parse_file, ErrorKind, ErrorReport, ParsedFile, TranscodeError, TranslationEntry,
};
pub use model::value::Value;
