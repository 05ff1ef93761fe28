//! 运行时: 迁移的开始/结束语义、可激发次数与结构诊断.
//!
//! 迁移的发生被拆成两步：`start` 从前集每个库所各取走一个 token，
//! `end` 向后集每个库所各放入一个 token。两步之间迁移处于"活跃"状态，
//! 这正是高维自动机中单元所描述的并发配置.
use itertools::Itertools;
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Marking, Place, Transition, Weight};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {transition:?} refers to place {place:?} outside the marking")]
    PlaceOutOfBounds {
        transition: TransitionId,
        place: PlaceId,
    },
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
    #[error("token count overflow at place {place:?} when ending {transition:?}")]
    Overflow {
        transition: TransitionId,
        place: PlaceId,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("transition '{name}' ({transition:?}) has an arc to unknown place {place:?}")]
    UnknownPlace {
        transition: TransitionId,
        name: String,
        place: PlaceId,
    },
}

/// Petri 网连通性诊断报告
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// 孤立库所（无任何连接的弧）
    pub isolated_places: Vec<(PlaceId, String)>,
    /// 前集为空的迁移：每个配置都可再次开始，状态空间无界
    pub sourceless_transitions: Vec<(TransitionId, String)>,
    /// 警告信息
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.sourceless_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Net {
    #[serde(default)]
    pub places: IndexVec<PlaceId, Place>,
    #[serde(default)]
    pub transitions: IndexVec<TransitionId, Transition>,
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
        }
    }

    pub fn new(
        places: IndexVec<PlaceId, Place>,
        transitions: IndexVec<TransitionId, Transition>,
    ) -> Self {
        Self {
            places,
            transitions,
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        self.places.push(place)
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        self.transitions.push(transition)
    }

    /// 输入弧: place -> transition，重复调用即增加一条平行弧.
    pub fn add_input_arc(&mut self, place: PlaceId, transition: TransitionId) {
        self.transitions[transition].preset.push(place);
    }

    /// 输出弧: transition -> place
    pub fn add_output_arc(&mut self, place: PlaceId, transition: TransitionId) {
        self.transitions[transition].postset.push(place);
    }

    pub fn get_place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place)
    }

    pub fn get_transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition)
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn initial_marking(&self) -> Marking {
        Marking(self.places.iter().map(|p| p.tokens).collect())
    }

    /// Checks that every arc names an existing place.
    pub fn validate(&self) -> Result<(), NetError> {
        for (transition, t) in self.transitions.iter_enumerated() {
            let unknown = t
                .preset
                .iter()
                .chain(t.postset.iter())
                .find(|place| place.index() >= self.places_len());
            if let Some(&place) = unknown {
                return Err(NetError::UnknownPlace {
                    transition,
                    name: t.name.clone(),
                    place,
                });
            }
        }
        Ok(())
    }

    /// 可激发次数：前集中每个（去重后的）库所的 token 数除以其在前集中的重数，取最小值.
    ///
    /// 下标越界的迁移返回 0。前集为空的迁移返回 1.
    pub fn activation_count(&self, transition: TransitionId, marking: &Marking) -> usize {
        let Some(t) = self.transitions.get(transition) else {
            return 0;
        };
        if t.preset.is_empty() {
            return 1;
        }
        t.preset
            .iter()
            .copied()
            .sorted_unstable()
            .dedup_with_count()
            .map(|(multiplicity, place)| {
                marking.get(place).unwrap_or(0) / multiplicity as Weight
            })
            .min()
            .map_or(0, |count| usize::try_from(count).unwrap_or(usize::MAX))
    }

    pub fn is_activable(&self, transition: TransitionId, marking: &Marking) -> bool {
        self.activation_count(transition, marking) > 0
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_activable(transition, marking))
            .collect()
    }

    /// 开始迁移：前集中每次出现的库所各减一个 token.
    pub fn start(&self, transition: TransitionId, marking: &Marking) -> Result<Marking, FireError> {
        let t = self
            .transitions
            .get(transition)
            .ok_or(FireError::OutOfBounds(transition))?;
        let mut next = marking.clone();
        for &place in t.preset.iter() {
            let tokens = next
                .0
                .get_mut(place)
                .ok_or(FireError::PlaceOutOfBounds { transition, place })?;
            *tokens = tokens
                .checked_sub(1)
                .ok_or(FireError::NotEnabled(transition))?;
        }
        Ok(next)
    }

    /// 结束迁移：后集中每次出现的库所各加一个 token.
    pub fn end(&self, transition: TransitionId, marking: &Marking) -> Result<Marking, FireError> {
        let t = self
            .transitions
            .get(transition)
            .ok_or(FireError::OutOfBounds(transition))?;
        let mut next = marking.clone();
        for &place in t.postset.iter() {
            let tokens = next
                .0
                .get_mut(place)
                .ok_or(FireError::PlaceOutOfBounds { transition, place })?;
            *tokens = tokens
                .checked_add(1)
                .ok_or(FireError::Overflow { transition, place })?;
        }
        Ok(next)
    }

    /// Atomic firing: `end(start(m))`.
    pub fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        let started = self.start(transition, marking)?;
        self.end(transition, &started)
    }

    /// 诊断信息：检测 Petri 网中的孤立库所和无法正常开始/结束的迁移
    pub fn diagnose_connectivity(&self) -> DiagnosticReport {
        let mut connected = vec![false; self.places_len()];
        let mut produced = vec![false; self.places_len()];
        let mut sourceless_transitions = Vec::new();
        let mut warnings = Vec::new();

        for (trans_id, trans) in self.transitions.iter_enumerated() {
            for place in trans.preset.iter().chain(trans.postset.iter()) {
                if let Some(flag) = connected.get_mut(place.index()) {
                    *flag = true;
                }
            }
            for place in trans.postset.iter() {
                if let Some(flag) = produced.get_mut(place.index()) {
                    *flag = true;
                }
            }

            if trans.preset.is_empty() {
                sourceless_transitions.push((trans_id, trans.name.clone()));
            } else if trans.postset.is_empty() {
                warnings.push(format!(
                    "变迁 '{}' (id={}) 无后置库所，检查是否为预期行为",
                    trans.name,
                    trans_id.index()
                ));
            }
        }

        let mut isolated_places = Vec::new();
        for (place_id, place) in self.places.iter_enumerated() {
            if !connected[place_id.index()] {
                isolated_places.push((place_id, place.name.clone()));
            } else if !produced[place_id.index()] && place.tokens == 0 {
                warnings.push(format!(
                    "库所 '{}' (id={}) 无输入弧且初始标记为 0，永远不会被激活",
                    place.name,
                    place_id.index()
                ));
            }
        }

        DiagnosticReport {
            isolated_places,
            sourceless_transitions,
            warnings,
            total_places: self.places_len(),
            total_transitions: self.transitions_len(),
        }
    }

    /// 打印诊断报告到日志
    pub fn log_diagnostics(&self) {
        let report = self.diagnose_connectivity();

        if !report.has_issues() {
            log::info!(
                "Petri 网连通性检查通过: {} 个库所, {} 个变迁",
                report.total_places,
                report.total_transitions
            );
            return;
        }

        log::warn!(
            "Petri 网诊断: {} 个库所, {} 个变迁",
            report.total_places,
            report.total_transitions
        );
        for (id, name) in &report.isolated_places {
            log::warn!("  孤立库所 [{}] {}", id.index(), name);
        }
        for (id, name) in &report.sourceless_transitions {
            log::warn!(
                "  变迁 [{}] {} 前集为空，可无限次开始，需要探索预算",
                id.index(),
                name
            );
        }
        for warning in &report.warnings {
            log::warn!("  - {}", warning);
        }
    }
}
