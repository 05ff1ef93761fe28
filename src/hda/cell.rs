//! 高维自动机的单元：维数、标签与两类边界.
use smallvec::SmallVec;

crate::net::ids::define_id!(CellId);

/// Boundary list of a cell. Most cells have one or two faces per side.
pub type Faces = SmallVec<[CellId; 2]>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// 并发活跃的迁移数；0 表示顶点（状态）.
    pub dimension: usize,
    /// 活跃迁移的标签，按开始顺序排列.
    pub labels: Vec<String>,
    /// 未开始边界：尚未开始某个活跃迁移时所在的单元.
    pub d0: Faces,
    /// 终止边界：结束某个活跃迁移后到达的单元.
    pub d1: Faces,
}

impl Cell {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            dimension: labels.len(),
            labels,
            d0: Faces::new(),
            d1: Faces::new(),
        }
    }

    pub fn vertex() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_vertex(&self) -> bool {
        self.dimension == 0
    }

    pub fn touches(&self, other: CellId) -> bool {
        self.d0.contains(&other) || self.d1.contains(&other)
    }
}

/// How a configuration was entered from the cell that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    /// 在源单元上开始了一个迁移（扩展）.
    Started(CellId),
    /// 在源单元上结束了一个活跃迁移（闭合）.
    Ended(CellId),
}

impl Link {
    pub fn origin(self) -> CellId {
        match self {
            Link::Started(cell) | Link::Ended(cell) => cell,
        }
    }

    pub fn is_extension(self) -> bool {
        matches!(self, Link::Started(_))
    }
}
