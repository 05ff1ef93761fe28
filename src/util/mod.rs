//! 通用容器.
pub mod open_table;

pub use open_table::{KeyHasher, OpenTable, StdKeys};
