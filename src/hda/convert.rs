//! 从 Petri 网构造高维自动机.
//!
//! 探索以深度优先方式进行：每个配置 `(标识, 活跃迁移序列)` 对应一个单元。
//! 扩展阶段对每个可激发的迁移执行 `start`，闭合阶段对每个活跃迁移执行 `end`。
//! 后继配置先在备忘表中按标识查找可复用的单元，找不到才新建。
//! 同一配置（标识与标签多重集）的单元数以 `copy_limit` 为上限；达到上限后
//! 改为连接到已有的副本，只补充不超出边界上限的面，因此有界网上的探索必然终止.
//!
//! 递归被显式的帧栈取代，每处理一个后继之前检查探索预算.
use std::collections::TryReserveError;
use std::fmt;
use std::time::{Duration, Instant};

use itertools::Itertools;
use smallvec::SmallVec;
use thiserror::Error;

use crate::hda::cell::{Cell, CellId, Link};
use crate::hda::Hda;
use crate::net::core::Net;
use crate::net::ids::TransitionId;
use crate::net::index_vec::Idx;
use crate::net::structure::{Marking, MarkingKeys};
use crate::util::open_table::{self, OpenTable, StdKeys};

/// Default bound on the cells built for one configuration.
pub const DEFAULT_COPY_LIMIT: usize = 4;

/// Transitions in flight, in start order.
pub type Active = SmallVec<[TransitionId; 4]>;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("allocation failure while growing the {what}: {source}")]
    Alloc {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },
}

impl ConvertError {
    fn alloc(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| ConvertError::Alloc { what, source }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// 最多构造的单元数量.None 表示不设上限.
    pub cell_limit: Option<usize>,
    /// 探索的墙钟时间上限.
    pub time_limit: Option<Duration>,
    /// 顶点 `d0` 边界饱和阈值；达到后该顶点不再被闭合复用.None 表示不饱和.
    pub vertex_bound: Option<usize>,
    /// 同一配置最多构造的单元数（至少 1）.None 表示不设上限，此时含环的网可能不终止.
    pub copy_limit: Option<usize>,
    /// 备忘表初始容量.
    pub table_capacity: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            cell_limit: None,
            time_limit: None,
            vertex_bound: Some(2),
            copy_limit: Some(DEFAULT_COPY_LIMIT),
            table_capacity: open_table::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversionStats {
    pub cells_per_dimension: Vec<usize>,
    /// 复用已有单元而非新建的次数.
    pub reused_links: usize,
    /// 因达到 `copy_limit` 而连接到已有副本的次数.
    pub capped_links: usize,
    /// `start`/`end` 不适用而被跳过的次数.
    pub skipped_firings: usize,
    pub distinct_markings: usize,
    /// 共享同一标识的单元数的最大值.
    pub max_cells_per_marking: usize,
    /// 同一配置的单元数的最大值.
    pub max_copies: usize,
    pub elapsed: Duration,
    pub truncated: bool,
}

impl ConversionStats {
    pub fn total_cells(&self) -> usize {
        self.cells_per_dimension.iter().sum()
    }
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cells: {}", self.total_cells())?;
        for (dimension, count) in self.cells_per_dimension.iter().enumerate() {
            writeln!(f, "  dim {dimension}: {count}")?;
        }
        writeln!(f, "reused links: {}", self.reused_links)?;
        writeln!(
            f,
            "capped links: {} (at most {} copies per configuration)",
            self.capped_links, self.max_copies
        )?;
        writeln!(f, "skipped firings: {}", self.skipped_firings)?;
        writeln!(
            f,
            "distinct markings: {} (at most {} cells per marking)",
            self.distinct_markings, self.max_cells_per_marking
        )?;
        write!(
            f,
            "elapsed: {:?}{}",
            self.elapsed,
            if self.truncated { " (truncated)" } else { "" }
        )
    }
}

#[derive(Debug)]
pub struct Conversion {
    pub hda: Hda,
    pub stats: ConversionStats,
}

/// A marking together with the sorted labels of the transitions in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Configuration {
    marking: Marking,
    labels: Vec<String>,
}

impl Configuration {
    fn new(marking: Marking, labels: &[&str]) -> Self {
        Self {
            marking,
            labels: labels.iter().map(|label| label.to_string()).collect(),
        }
    }
}

/// Where a frame is in its two phases.
#[derive(Debug, Clone, Copy)]
enum Cursor {
    /// `pending` occurrences of `transition` remain; `None` until counted.
    Extend {
        transition: usize,
        pending: Option<usize>,
    },
    Close {
        position: usize,
    },
}

/// A configuration reached from a frame, not yet matched against the memo.
#[derive(Debug)]
struct Successor {
    marking: Marking,
    active: Active,
    link: Link,
}

#[derive(Debug)]
struct Frame {
    cell: CellId,
    marking: Marking,
    active: Active,
    cursor: Cursor,
}

impl Frame {
    fn new(cell: CellId, marking: Marking, active: Active) -> Self {
        Self {
            cell,
            marking,
            active,
            cursor: Cursor::Extend {
                transition: 0,
                pending: None,
            },
        }
    }

    /// Produces the next successor configuration, or `None` once both
    /// phases are exhausted. Inapplicable firings are counted and skipped.
    fn advance(&mut self, net: &Net, skipped: &mut usize) -> Option<Successor> {
        loop {
            match self.cursor {
                Cursor::Extend {
                    transition,
                    pending,
                } => {
                    if transition >= net.transitions_len() {
                        self.cursor = Cursor::Close { position: 0 };
                        continue;
                    }
                    let id = TransitionId::from_usize(transition);
                    let pending =
                        pending.unwrap_or_else(|| net.activation_count(id, &self.marking));
                    if pending == 0 {
                        self.cursor = Cursor::Extend {
                            transition: transition + 1,
                            pending: None,
                        };
                        continue;
                    }
                    self.cursor = Cursor::Extend {
                        transition,
                        pending: Some(pending - 1),
                    };
                    match net.start(id, &self.marking) {
                        Ok(marking) => {
                            let mut active = self.active.clone();
                            active.push(id);
                            return Some(Successor {
                                marking,
                                active,
                                link: Link::Started(self.cell),
                            });
                        }
                        Err(err) => {
                            log::trace!("skip start on {:?}: {}", self.cell, err);
                            *skipped += 1;
                        }
                    }
                }
                Cursor::Close { position } => {
                    let &id = self.active.get(position)?;
                    self.cursor = Cursor::Close {
                        position: position + 1,
                    };
                    match net.end(id, &self.marking) {
                        Ok(marking) => {
                            let mut active = self.active.clone();
                            active.remove(position);
                            return Some(Successor {
                                marking,
                                active,
                                link: Link::Ended(self.cell),
                            });
                        }
                        Err(err) => {
                            log::trace!("skip end on {:?}: {}", self.cell, err);
                            *skipped += 1;
                        }
                    }
                }
            }
        }
    }
}

/// Whether `candidate` may stand for the configuration reached through `link`.
///
/// `labels` must be sorted.
fn accepts(
    hda: &Hda,
    candidate: CellId,
    link: Link,
    labels: &[&str],
    vertex_bound: Option<usize>,
) -> bool {
    let cell = &hda.cells[candidate];
    let origin = link.origin();

    // a start always adds a d0 face; an end only does so on vertices
    let grows_d0 = link.is_extension() || cell.is_vertex();
    if grows_d0 {
        let saturated = if cell.is_vertex() {
            vertex_bound.is_some_and(|bound| cell.d0.len() >= bound)
        } else {
            cell.d0.len() >= cell.dimension
        };
        if saturated {
            return false;
        }
    }

    if candidate == origin || cell.touches(origin) || hda.cells[origin].touches(candidate) {
        return false;
    }

    same_labels(cell, labels)
}

/// Label multiset equality against sorted `labels`.
fn same_labels(cell: &Cell, labels: &[&str]) -> bool {
    cell.labels.len() == labels.len()
        && cell
            .labels
            .iter()
            .map(String::as_str)
            .sorted_unstable()
            .eq(labels.iter().copied())
}

pub struct Converter<'net> {
    net: &'net Net,
    config: ConversionConfig,
    hda: Hda,
    /// 标识 -> 以该标识构造的单元，同一标识可对应多个单元.
    memo: OpenTable<Marking, CellId, MarkingKeys>,
    /// 标识 -> 以该标识构造的单元数.
    census: OpenTable<Marking, usize, MarkingKeys>,
    /// 配置 -> 已构造的副本数.
    copies: OpenTable<Configuration, usize>,
    stack: Vec<Frame>,
    stats: ConversionStats,
}

impl<'net> Converter<'net> {
    pub fn new(net: &'net Net, config: ConversionConfig) -> Self {
        let capacity = config.table_capacity;
        Self {
            net,
            config,
            hda: Hda::new(),
            memo: OpenTable::with_capacity_and_hasher(capacity, MarkingKeys),
            census: OpenTable::with_capacity_and_hasher(capacity, MarkingKeys),
            copies: OpenTable::with_capacity_and_hasher(capacity, StdKeys),
            stack: Vec::new(),
            stats: ConversionStats::default(),
        }
    }

    pub fn run(mut self) -> Result<Conversion, ConvertError> {
        let started = Instant::now();
        let deadline = self
            .config
            .time_limit
            .and_then(|limit| started.checked_add(limit));
        log::debug!(
            "converting net: {} places, {} transitions, config {:?}",
            self.net.places_len(),
            self.net.transitions_len(),
            self.config
        );

        self.open(self.net.initial_marking(), Active::new(), None)?;

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                log::warn!(
                    "time limit reached after {} cells, returning partial HDA",
                    self.hda.len()
                );
                self.hda.truncated = true;
                break;
            }
            let Some(frame) = self.stack.last_mut() else {
                break;
            };
            match frame.advance(self.net, &mut self.stats.skipped_firings) {
                Some(successor) => self.visit(successor)?,
                None => {
                    self.stack.pop();
                }
            }
        }

        self.stats.cells_per_dimension = self.hda.dimension_counts();
        self.stats.distinct_markings = self.census.len();
        self.stats.max_cells_per_marking = self.census.values().copied().max().unwrap_or(0);
        self.stats.max_copies = self.copies.values().copied().max().unwrap_or(0);
        self.stats.elapsed = started.elapsed();
        self.stats.truncated = self.hda.truncated;
        log::debug!("conversion finished:\n{}", self.stats);

        Ok(Conversion {
            hda: self.hda,
            stats: self.stats,
        })
    }

    fn visit(&mut self, successor: Successor) -> Result<(), ConvertError> {
        let net = self.net;
        let labels: Vec<&str> = successor
            .active
            .iter()
            .map(|&t| net.transitions[t].name.as_str())
            .sorted_unstable()
            .collect();
        let hda = &self.hda;
        let vertex_bound = self.config.vertex_bound;
        let found = self
            .memo
            .find_filter(&successor.marking, |&candidate| {
                accepts(hda, candidate, successor.link, &labels, vertex_bound)
            })
            .copied();

        if let Some(cell) = found {
            log::trace!("reuse {:?} via {:?}", cell, successor.link);
            self.stats.reused_links += 1;
            self.hda.attach(successor.link, cell);
            return Ok(());
        }

        if let Some(limit) = self.config.copy_limit {
            let key = Configuration::new(successor.marking.clone(), &labels);
            let built = self.copies.get(&key).copied().unwrap_or(0);
            if built >= limit.max(1) {
                let copy = self
                    .memo
                    .find_filter(&successor.marking, |&candidate| {
                        same_labels(&self.hda.cells[candidate], &labels)
                    })
                    .copied();
                if let Some(copy) = copy {
                    let added = self.hda.attach_within(successor.link, copy, vertex_bound);
                    log::trace!(
                        "copy limit hit, link {:?} via {:?} ({} faces)",
                        copy,
                        successor.link,
                        added
                    );
                    self.stats.capped_links += 1;
                    return Ok(());
                }
            }
        }

        self.open(successor.marking, successor.active, Some(successor.link))
    }

    /// Builds the cell for a fresh configuration and schedules its exploration.
    fn open(
        &mut self,
        marking: Marking,
        active: Active,
        link: Option<Link>,
    ) -> Result<(), ConvertError> {
        if let Some(limit) = self.config.cell_limit {
            if self.hda.len() >= limit {
                if !self.hda.truncated {
                    log::warn!("cell limit {} reached, returning partial HDA", limit);
                }
                self.hda.truncated = true;
                return Ok(());
            }
        }

        let labels = active
            .iter()
            .map(|&t| self.net.transitions[t].name.clone())
            .collect();
        let cell = self
            .hda
            .cells
            .try_push(Cell::new(labels))
            .map_err(ConvertError::alloc("cell arena"))?;
        match link {
            Some(link) => self.hda.attach(link, cell),
            None => self.hda.initial.push(cell),
        }
        log::trace!("open {:?} at {:?} with {:?}", cell, marking, active);

        self.memo
            .insert_multi(marking.clone(), cell)
            .map_err(ConvertError::alloc("memo table"))?;
        self.census
            .upsert(marking.clone(), || 1, |count| *count += 1)
            .map_err(ConvertError::alloc("marking census"))?;
        let labels: Vec<&str> = self.hda.cells[cell]
            .labels
            .iter()
            .map(String::as_str)
            .sorted_unstable()
            .collect();
        let key = Configuration::new(marking.clone(), &labels);
        self.copies
            .upsert(key, || 1, |count| *count += 1)
            .map_err(ConvertError::alloc("configuration census"))?;
        self.stack
            .try_reserve(1)
            .map_err(ConvertError::alloc("frame stack"))?;
        self.stack.push(Frame::new(cell, marking, active));
        Ok(())
    }
}

/// Converts `net` from its initial marking with the default configuration.
pub fn convert(net: &Net) -> Result<Hda, ConvertError> {
    Converter::new(net, ConversionConfig::default())
        .run()
        .map(|conversion| conversion.hda)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ids::PlaceId;
    use crate::net::structure::{Place, Transition, Weight};

    fn p(raw: u32) -> PlaceId {
        PlaceId::new(raw)
    }

    fn c(raw: u32) -> CellId {
        CellId::new(raw)
    }

    fn net_with(places: &[Weight], transitions: Vec<Transition>) -> Net {
        let mut net = Net::empty();
        for (idx, tokens) in places.iter().enumerate() {
            net.add_place(Place::new(format!("p{idx}"), *tokens));
        }
        for transition in transitions {
            net.add_transition(transition);
        }
        net
    }

    fn single() -> Net {
        net_with(&[1, 0], vec![Transition::with_arcs("t0", [p(0)], [p(1)])])
    }

    fn independent_pair() -> Net {
        net_with(
            &[1, 1, 0, 0],
            vec![
                Transition::with_arcs("t1", [p(0)], [p(2)]),
                Transition::with_arcs("t2", [p(1)], [p(3)]),
            ],
        )
    }

    fn run(net: &Net, config: ConversionConfig) -> Conversion {
        Converter::new(net, config).run().unwrap()
    }

    #[test]
    fn single_transition_yields_an_edge() {
        let hda = convert(&single()).unwrap();
        assert_eq!(hda.len(), 3);
        assert_eq!(hda.initial, vec![c(0)]);
        assert!(hda.final_cells.is_empty());
        assert!(!hda.truncated);

        let edge = &hda.cells[c(1)];
        assert_eq!(edge.labels, vec!["t0".to_string()]);
        assert_eq!(edge.d0.as_slice(), &[c(0)]);
        assert_eq!(edge.d1.as_slice(), &[c(2)]);
        assert_eq!(hda.cells[c(0)].d1.as_slice(), &[c(1)]);
        assert_eq!(hda.cells[c(2)].d0.as_slice(), &[c(1)]);
        assert!(hda.cells[c(2)].is_vertex());
    }

    #[test]
    fn independent_transitions_fill_a_square() {
        let conversion = run(&independent_pair(), ConversionConfig::default());
        let hda = &conversion.hda;
        assert_eq!(hda.dimension_counts(), vec![4, 4, 1]);

        let squares: Vec<_> = hda.cells_of_dimension(2).collect();
        assert_eq!(squares, vec![c(2)]);
        let square = &hda.cells[c(2)];
        assert_eq!(square.labels, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(square.d0.as_slice(), &[c(1), c(7)]);
        assert_eq!(square.d1.as_slice(), &[c(3), c(5)]);

        // unstarted faces: t1 started first, then t2 started first
        assert_eq!(hda.cells[c(1)].labels, vec!["t1".to_string()]);
        assert_eq!(hda.cells[c(7)].labels, vec!["t2".to_string()]);
        // terminated faces: t1 ended (t2 in flight), t2 ended (t1 in flight)
        assert_eq!(hda.cells[c(3)].labels, vec!["t2".to_string()]);
        assert_eq!(hda.cells[c(5)].labels, vec!["t1".to_string()]);

        // both interleavings meet in the same final vertex
        assert_eq!(hda.cells[c(4)].d0.as_slice(), &[c(3), c(5)]);
        assert_eq!(hda.cells[c(0)].d1.as_slice(), &[c(1), c(7)]);

        assert_eq!(conversion.stats.reused_links, 4);
        assert_eq!(conversion.stats.distinct_markings, 9);
        assert_eq!(conversion.stats.max_cells_per_marking, 1);
        assert!(hda.check_invariants(Some(2)).is_empty());
    }

    #[test]
    fn self_concurrency_builds_one_cell_per_interleaving() {
        let net = net_with(&[2, 0], vec![Transition::with_arcs("t0", [p(0)], [p(1)])]);
        let conversion = run(&net, ConversionConfig::default());
        let hda = &conversion.hda;

        assert_eq!(hda.dimension_counts(), vec![3, 4, 1]);
        assert_eq!(hda.cells[c(0)].d1.len(), 2);
        let square = hda.cells_of_dimension(2).next().unwrap();
        assert_eq!(
            hda.cells[square].labels,
            vec!["t0".to_string(), "t0".to_string()]
        );
        assert_eq!(conversion.stats.distinct_markings, 6);
        assert_eq!(conversion.stats.max_cells_per_marking, 2);
        assert!(hda.check_invariants(Some(2)).is_empty());
    }

    #[test]
    fn cyclic_net_terminates_by_reusing_the_initial_vertex() {
        let net = net_with(
            &[1, 0],
            vec![
                Transition::with_arcs("t0", [p(0)], [p(1)]),
                Transition::with_arcs("t1", [p(1)], [p(0)]),
            ],
        );
        let hda = convert(&net).unwrap();
        assert_eq!(hda.len(), 4);
        assert_eq!(hda.dimension_counts(), vec![2, 2]);
        assert_eq!(hda.cells[c(0)].d0.as_slice(), &[c(3)]);
        assert_eq!(hda.cells[c(3)].d1.as_slice(), &[c(0)]);
        assert!(hda.check_invariants(Some(2)).is_empty());
    }

    #[test]
    fn unreachable_transition_contributes_no_cells() {
        let net = net_with(
            &[1, 0, 0],
            vec![
                Transition::with_arcs("t0", [p(0)], [p(1)]),
                Transition::with_arcs("dead", [p(2)], [p(0)]),
            ],
        );
        let hda = convert(&net).unwrap();
        assert_eq!(hda.len(), 3);
        assert!(
            hda.cells
                .iter()
                .all(|cell| !cell.labels.iter().any(|label| label == "dead"))
        );
    }

    #[test]
    fn conversion_is_deterministic() {
        let net = independent_pair();
        let first = convert(&net).unwrap();
        let second = convert(&net).unwrap();
        assert_eq!(first.dimension_counts(), second.dimension_counts());
        assert_eq!(first.listing().to_string(), second.listing().to_string());
    }

    #[test]
    fn cell_limit_truncates_exploration() {
        let config = ConversionConfig {
            cell_limit: Some(2),
            ..ConversionConfig::default()
        };
        let conversion = run(&single(), config);
        assert_eq!(conversion.hda.len(), 2);
        assert!(conversion.hda.truncated);
        assert!(conversion.stats.truncated);
    }

    #[test]
    fn exhausted_time_limit_keeps_only_the_root() {
        let config = ConversionConfig {
            time_limit: Some(Duration::ZERO),
            ..ConversionConfig::default()
        };
        let conversion = run(&independent_pair(), config);
        assert_eq!(conversion.hda.len(), 1);
        assert_eq!(conversion.hda.initial, vec![c(0)]);
        assert!(conversion.hda.truncated);
    }

    #[test]
    fn empty_net_is_a_single_vertex() {
        let hda = convert(&Net::empty()).unwrap();
        assert_eq!(hda.len(), 1);
        assert!(hda.cells[c(0)].is_vertex());
    }

    #[test]
    fn source_transition_needs_a_budget() {
        let net = net_with(&[0], vec![Transition::with_arcs("gen", [], [p(0)])]);
        let config = ConversionConfig {
            cell_limit: Some(50),
            ..ConversionConfig::default()
        };
        let conversion = run(&net, config);
        assert_eq!(conversion.hda.len(), 50);
        assert!(conversion.hda.truncated);
        assert!(conversion.hda.check_invariants(Some(2)).is_empty());
    }

    /// Two loops on one token next to an independent self-loop.
    fn loops() -> Net {
        net_with(
            &[1, 0, 1],
            vec![
                Transition::with_arcs("t0", [p(1)], [p(1)]),
                Transition::with_arcs("t1", [p(1)], [p(0)]),
                Transition::with_arcs("t4", [p(0)], [p(1)]),
                Transition::with_arcs("l", [p(2)], [p(2)]),
            ],
        )
    }

    #[test]
    fn loops_beside_an_independent_self_loop_terminate() {
        let config = ConversionConfig {
            cell_limit: Some(5000),
            ..ConversionConfig::default()
        };
        let conversion = run(&loops(), config);
        let hda = &conversion.hda;
        assert!(!hda.truncated);
        assert!(hda.len() < 5000);
        assert!(conversion.stats.max_copies <= DEFAULT_COPY_LIMIT);
        assert!(conversion.stats.capped_links > 0);
        assert_eq!(hda.check_invariants(Some(2)), vec![]);
        assert_eq!(hda.max_dimension(), Some(2));
    }

    #[test]
    fn copy_limit_of_one_links_to_the_first_copy() {
        let net = net_with(&[2, 0], vec![Transition::with_arcs("t0", [p(0)], [p(1)])]);
        let config = ConversionConfig {
            copy_limit: Some(1),
            ..ConversionConfig::default()
        };
        let conversion = run(&net, config);
        let hda = &conversion.hda;
        assert!(!hda.truncated);
        assert_eq!(conversion.stats.max_copies, 1);
        assert!(conversion.stats.capped_links > 0);
        assert!(hda.len() < 8);
        assert_eq!(hda.cells[c(0)].d1.len(), 1);
        assert_eq!(hda.check_invariants(Some(2)), vec![]);
    }

    #[test]
    fn copies_below_the_limit_leave_small_nets_unchanged() {
        let conversion = run(&independent_pair(), ConversionConfig::default());
        assert_eq!(conversion.stats.capped_links, 0);
        assert_eq!(conversion.stats.max_copies, 1);
    }

    #[test]
    fn stats_render_per_dimension() {
        let conversion = run(&single(), ConversionConfig::default());
        let text = conversion.stats.to_string();
        assert!(text.starts_with("cells: 3\n  dim 0: 2\n  dim 1: 1\n"));
        assert!(!text.contains("truncated"));
    }
}
