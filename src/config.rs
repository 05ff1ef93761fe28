use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::hda::convert::DEFAULT_COPY_LIMIT;
use crate::hda::ConversionConfig;
use crate::util::open_table;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HdaConfig {
    /// 最多构造的单元数，0 表示不设上限.
    #[serde(default = "default_cell_limit")]
    pub cell_limit: usize,
    /// 探索时间上限（毫秒），缺省不设上限.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    /// 顶点 d0 饱和阈值，0 表示不饱和.
    #[serde(default = "default_vertex_bound")]
    pub vertex_bound: usize,
    /// 同一配置最多构造的单元数，0 表示不设上限.
    #[serde(default = "default_copy_limit")]
    pub copy_limit: usize,
    #[serde(default = "default_table_capacity")]
    pub table_capacity: usize,
    /// 转换后检查结构不变量.
    #[serde(default)]
    pub check_invariants: bool,
}

impl Default for HdaConfig {
    fn default() -> Self {
        Self {
            cell_limit: default_cell_limit(),
            time_limit_ms: None,
            vertex_bound: default_vertex_bound(),
            copy_limit: default_copy_limit(),
            table_capacity: default_table_capacity(),
            check_invariants: false,
        }
    }
}

impl HdaConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: HdaConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn vertex_bound(&self) -> Option<usize> {
        (self.vertex_bound > 0).then_some(self.vertex_bound)
    }

    pub fn to_conversion_config(&self) -> ConversionConfig {
        ConversionConfig {
            cell_limit: (self.cell_limit > 0).then_some(self.cell_limit),
            time_limit: self.time_limit_ms.map(Duration::from_millis),
            vertex_bound: self.vertex_bound(),
            copy_limit: (self.copy_limit > 0).then_some(self.copy_limit),
            table_capacity: self.table_capacity,
        }
    }
}

fn default_cell_limit() -> usize {
    1_000_000
}

fn default_vertex_bound() -> usize {
    2
}

fn default_copy_limit() -> usize {
    DEFAULT_COPY_LIMIT
}

fn default_table_capacity() -> usize {
    open_table::DEFAULT_CAPACITY
}
