//! # 高维自动机（Higher-Dimensional Automaton）
//!
//! HDA 是一个立方复形：`k` 维单元表示 `k` 个迁移真正并发地处于活跃状态，
//! 单元之间的 `d0`/`d1` 边界关系刻画因果顺序与交错等价。所有单元存放于同一
//! 个 [`IndexVec`] 中，单元间的引用一律使用 [`CellId`] 下标.
//!
//! * `convert` —— 从 Petri 网构造 HDA 的探索引擎；
//! * `printer` —— 按维数编号并输出文本清单.

pub mod cell;
pub mod convert;
pub mod printer;

use std::fmt;

use thiserror::Error;

use crate::net::index_vec::{Idx, IndexVec};

pub use cell::{Cell, CellId, Faces, Link};
pub use convert::{Conversion, ConversionConfig, ConversionStats, ConvertError, Converter, convert};
pub use printer::{Listing, Numbering};

/// Boundary side of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    D0,
    D1,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::D0 => write!(f, "d0"),
            Side::D1 => write!(f, "d1"),
        }
    }
}

/// 结构不变量被破坏时的记录.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("cell {cell:?} has dimension {dimension} but {labels} labels")]
    LabelCount {
        cell: CellId,
        dimension: usize,
        labels: usize,
    },
    #[error("cell {cell:?} refers to missing cell {face:?} in {side}")]
    DanglingFace { cell: CellId, side: Side, face: CellId },
    #[error("{side} face {face:?} of cell {cell:?} has dimension {found}, expected {expected}")]
    FaceDimension {
        cell: CellId,
        side: Side,
        face: CellId,
        expected: usize,
        found: usize,
    },
    #[error("cell {cell:?} of dimension {dimension} has {faces} d0 faces")]
    Overfull {
        cell: CellId,
        dimension: usize,
        faces: usize,
    },
    #[error("vertex {cell:?} has {degree} d0 faces, bound is {bound}")]
    VertexDegree {
        cell: CellId,
        degree: usize,
        bound: usize,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Hda {
    pub cells: IndexVec<CellId, Cell>,
    /// 由初始标识构造的单元.
    pub initial: Vec<CellId>,
    /// 保留字段，构造过程不会填充.
    pub final_cells: Vec<CellId>,
    /// 探索预算耗尽时为 `true`，此时 HDA 只是部分结果.
    pub truncated: bool,
}

impl Hda {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Wires `cell` to the origin of `link`.
    ///
    /// A start link makes the origin a `d0` face of `cell`; a vertex origin
    /// also gains `cell` in its `d1`. An end link makes `cell` a `d1` face
    /// of the origin; a vertex `cell` also gains the origin in its `d0`.
    /// Reused cells are wired the same way, so a non-vertex origin never
    /// lists its extensions in `d1`.
    pub fn attach(&mut self, link: Link, cell: CellId) {
        match link {
            Link::Started(origin) => {
                self.cells[cell].d0.push(origin);
                if self.cells[origin].is_vertex() {
                    self.cells[origin].d1.push(cell);
                }
            }
            Link::Ended(origin) => {
                self.cells[origin].d1.push(cell);
                if self.cells[cell].is_vertex() {
                    self.cells[cell].d0.push(origin);
                }
            }
        }
    }

    /// Like [`Hda::attach`], but skips every face that is already present or
    /// would push a `d0` list past its bound: `dimension` for non-vertices,
    /// `vertex_bound` (at least 1) for vertices.
    ///
    /// Returns the number of faces actually added.
    pub fn attach_within(&mut self, link: Link, cell: CellId, vertex_bound: Option<usize>) -> usize {
        // (owner, face) pairs, as in `attach`
        let (d0, d1) = match link {
            Link::Started(origin) => (
                Some((cell, origin)),
                self.cells[origin].is_vertex().then_some((origin, cell)),
            ),
            Link::Ended(origin) => (
                self.cells[cell].is_vertex().then_some((cell, origin)),
                Some((origin, cell)),
            ),
        };

        let mut added = 0;
        if let Some((owner, face)) = d0 {
            if self.has_room(owner, vertex_bound) && !self.cells[owner].d0.contains(&face) {
                self.cells[owner].d0.push(face);
                added += 1;
            }
        }
        if let Some((owner, face)) = d1 {
            if !self.cells[owner].d1.contains(&face) {
                self.cells[owner].d1.push(face);
                added += 1;
            }
        }
        added
    }

    fn has_room(&self, cell: CellId, vertex_bound: Option<usize>) -> bool {
        let cell = &self.cells[cell];
        if cell.is_vertex() {
            vertex_bound.is_none_or(|bound| cell.d0.len() < bound.max(1))
        } else {
            cell.d0.len() < cell.dimension
        }
    }

    /// Number of cells per dimension, indexed by dimension.
    pub fn dimension_counts(&self) -> Vec<usize> {
        let mut counts = Vec::new();
        for cell in self.cells.iter() {
            if counts.len() <= cell.dimension {
                counts.resize(cell.dimension + 1, 0);
            }
            counts[cell.dimension] += 1;
        }
        counts
    }

    pub fn max_dimension(&self) -> Option<usize> {
        self.cells.iter().map(|cell| cell.dimension).max()
    }

    pub fn cells_of_dimension(&self, dimension: usize) -> impl Iterator<Item = CellId> + '_ {
        self.cells
            .iter_enumerated()
            .filter(move |(_, cell)| cell.dimension == dimension)
            .map(|(id, _)| id)
    }

    /// 检查全部结构不变量，返回所有违例.
    ///
    /// 非顶点单元的两侧边界都指向低一维的单元；顶点的两侧边界都指向一维单元.
    /// `vertex_bound` 限制顶点的 `d0` 度数。顶点的 `d1` 即可开始的迁移数，
    /// 不受该阈值约束，因此不检查.
    pub fn check_invariants(&self, vertex_bound: Option<usize>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (id, cell) in self.cells.iter_enumerated() {
            if cell.labels.len() != cell.dimension {
                violations.push(Violation::LabelCount {
                    cell: id,
                    dimension: cell.dimension,
                    labels: cell.labels.len(),
                });
            }

            let expected = if cell.is_vertex() { 1 } else { cell.dimension - 1 };
            let sides = [(Side::D0, &cell.d0), (Side::D1, &cell.d1)];
            for (side, faces) in sides {
                for &face in faces.iter() {
                    match self.cells.get(face) {
                        None => violations.push(Violation::DanglingFace { cell: id, side, face }),
                        Some(other) if other.dimension != expected => {
                            violations.push(Violation::FaceDimension {
                                cell: id,
                                side,
                                face,
                                expected,
                                found: other.dimension,
                            })
                        }
                        Some(_) => {}
                    }
                }
            }

            if cell.is_vertex() {
                if let Some(bound) = vertex_bound {
                    let bound = bound.max(1);
                    if cell.d0.len() > bound {
                        violations.push(Violation::VertexDegree {
                            cell: id,
                            degree: cell.d0.len(),
                            bound,
                        });
                    }
                }
            } else if cell.d0.len() > cell.dimension {
                violations.push(Violation::Overfull {
                    cell: id,
                    dimension: cell.dimension,
                    faces: cell.d0.len(),
                });
            }
        }
        violations
    }

    pub fn log_summary(&self) {
        let counts = self.dimension_counts();
        log::info!(
            "HDA: {} cells, max dimension {}, per dimension {:?}",
            self.len(),
            self.max_dimension().map_or(0, |d| d),
            counts
        );
        if self.truncated {
            log::warn!("HDA is partial: exploration budget exhausted");
        }
        log::debug!(
            "initial cells: {:?}",
            self.initial.iter().map(|id| id.index()).collect::<Vec<_>>()
        );
    }
}
