//! I/O 支持：从 JSON、RON 或 TOML 描述加载 Petri 网。
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::net::core::{Net, NetError};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised net format for {0} (expected .json, .ron or .toml)")]
    UnknownFormat(PathBuf),
    #[error("invalid net: {0}")]
    Invalid(#[from] NetError),
}

/// Net description formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Ron,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "ron" => Some(Format::Ron),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn from_toml_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(toml::from_str(s)?)
}

/// 按格式解析网描述并校验弧端点.
pub fn parse_net(content: &str, format: Format) -> Result<Net, IoError> {
    let net: Net = match format {
        Format::Json => from_json_str(content)?,
        Format::Ron => from_ron_str(content)?,
        Format::Toml => from_toml_str(content)?,
    };
    net.validate()?;
    Ok(net)
}

pub fn load_net<P: AsRef<Path>>(path: P) -> Result<Net, IoError> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| IoError::UnknownFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path)?;
    let net = parse_net(&content, format)?;
    log::debug!(
        "loaded net from {}: {} places, {} transitions",
        path.display(),
        net.places_len(),
        net.transitions_len()
    );
    Ok(net)
}
