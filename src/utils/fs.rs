//! IO helper: 源文件文本与 JSON 译文/单元文件的读写

use std::{fs::File, io::BufReader, path::Path};

use serde::Serialize;

use crate::model::transcoder::{TranscodeError, TranslationEntry};

/// 读取源文件文本；UTF-8 BOM 会被去掉
pub fn read_text_file(p: &Path) -> Result<String, TranscodeError> {
    let text = std::fs::read_to_string(p)?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

pub fn write_text_file(p: &Path, text: &str) -> Result<(), TranscodeError> {
    std::fs::write(p, text)?;
    Ok(())
}

/// 从 JSON 数组读取译文条目
pub fn read_translations(p: &Path) -> Result<Vec<TranslationEntry>, TranscodeError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let entries: Vec<TranslationEntry> = serde_json::from_reader(rdr)?;
    Ok(entries)
}

/// 将任意可序列化数据保存为格式化 JSON
pub fn write_json_file<T: Serialize + ?Sized>(p: &Path, value: &T) -> Result<(), TranscodeError> {
    let f = File::create(p)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}
