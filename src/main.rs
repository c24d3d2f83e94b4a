//! 程序入口：初始化日志、加载配置，并驱动 parse / build / assemble

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::fmt::SubscriberBuilder;

use snbt_fanyi::utils::fs::{read_text_file, read_translations, write_json_file, write_text_file};
use snbt_fanyi::{assemble_file, build_file, parse_file, Strategy, TranscoderConfig};

/// SNBT 翻译转码：抽取可翻译字符串，并把译文写回
#[derive(Parser, Debug)]
#[command(name = "snbt_fanyi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML 配置文件
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖配置中的解析策略
    #[arg(long, global = true, value_enum)]
    strategy: Option<StrategyArg>,

    /// 输出 DEBUG 级别日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 抽取可翻译字符串，输出 JSON 单元列表
    Parse {
        file: PathBuf,
        /// 同时写出 HTML 预览
        #[arg(long, value_name = "OUT.html")]
        preview: Option<PathBuf>,
        /// 单元 JSON 输出位置（默认标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 把译文写回源文件
    Build {
        file: PathBuf,
        translations: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 仅凭译文生成新文件
    Assemble {
        translations: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Tree,
    LineBased,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Tree => Strategy::Tree,
            StrategyArg::LineBased => Strategy::LineBased,
        }
    }
}

fn load_config(cli: &Cli) -> Result<TranscoderConfig> {
    let mut config = match &cli.config {
        Some(path) => match TranscoderConfig::load_from_path(path)? {
            Some(config) => config,
            None => {
                tracing::warn!("配置文件不存在，使用默认配置: {}", path.display());
                TranscoderConfig::default()
            }
        },
        None => TranscoderConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config = config.with_strategy(strategy.into());
    }
    Ok(config)
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            write_text_file(path, text).with_context(|| format!("写入失败: {}", path.display()))?;
            tracing::info!("已写出: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn check_signature(config: &TranscoderConfig, file: &Path, content: &str) -> Result<()> {
    let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if !config.signature.matches(&name, content)? {
        tracing::warn!("文件签名不匹配，仍继续处理: {}", file.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 日志写到 stderr，stdout 只留给结果
    let _ = SubscriberBuilder::default()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .try_init();

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Parse { file, preview, output } => {
            let content = read_text_file(file).with_context(|| format!("读取失败: {}", file.display()))?;
            check_signature(&config, file, &content)?;
            let parsed = parse_file(&content, &config)?;

            if let Some(path) = preview {
                write_text_file(path, &parsed.preview)?;
                tracing::info!("预览已写出: {}", path.display());
            }
            match output {
                Some(path) => write_json_file(path, &parsed.units)?,
                None => println!("{}", serde_json::to_string_pretty(&parsed.units)?),
            }
        }
        Command::Build {
            file,
            translations,
            output,
        } => {
            let content = read_text_file(file).with_context(|| format!("读取失败: {}", file.display()))?;
            check_signature(&config, file, &content)?;
            let entries =
                read_translations(translations).with_context(|| format!("读取译文失败: {}", translations.display()))?;
            let built = build_file(&content, &entries, &config)?;
            emit(output.as_deref(), &built)?;
        }
        Command::Assemble { translations, output } => {
            let entries =
                read_translations(translations).with_context(|| format!("读取译文失败: {}", translations.display()))?;
            let built = assemble_file(&entries, &config)?;
            emit(output.as_deref(), &built)?;
        }
    }
    Ok(())
}
