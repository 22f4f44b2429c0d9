use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bdio_console::Verbosity;
use once_cell::sync::Lazy;
use serde_derive::Deserialize;
use sector_io::DEFAULT_SECTOR_SIZE;

/// 工作区根目录
static PROJECT: Lazy<&'static Path> =
    Lazy::new(|| Path::new(std::env!("CARGO_MANIFEST_DIR")).parent().unwrap_or(Path::new(".")));

/// 默认配置文件位置
pub static DEFAULT_CONFIG: Lazy<PathBuf> = Lazy::new(|| PROJECT.join("bdio.toml"));

/// `bdio.toml` 的内容，所有字段都可省略
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub sector_size: Option<u32>,
    pub media_id: Option<u32>,
    pub verbosity: Option<String>,
}

impl Config {
    /// 读取配置
    ///
    /// 显式给出的文件必须存在；默认位置的文件不存在时使用空配置。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (DEFAULT_CONFIG.as_path(), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// 命令行优先，其次配置文件，最后默认 512
    pub fn sector_size(&self, cli: Option<u32>) -> u32 {
        cli.or(self.sector_size).unwrap_or(DEFAULT_SECTOR_SIZE)
    }

    pub fn media_id(&self, cli: Option<u32>) -> u32 {
        cli.or(self.media_id).unwrap_or(0)
    }

    /// 命令行优先，其次配置文件，最后 `Quiet`
    pub fn verbosity(&self, cli: Option<&str>) -> Result<Verbosity> {
        match cli.or(self.verbosity.as_deref()) {
            Some(name) => Verbosity::parse(name)
                .with_context(|| format!("unknown verbosity level `{name}`")),
            None => Ok(Verbosity::Quiet),
        }
    }
}
