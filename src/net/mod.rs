//! # Petri 网核心定义（Place/Transition Net）
//!
//! 设库所集合 `P` 与迁移集合 `T`。每个迁移 `t` 带有前集 `•t` 与后集 `t•`，
//! 二者均为库所的多重集（同一库所可多次出现，表示平行弧）。对任意标识
//! `M ∈ ℕ^{|P|}`：
//!
//! * 迁移 `t` 的**可激发次数**为 `min_{p ∈ •t} ⌊M[p] / mult(p, •t)⌋`，
//!   前集为空时取 1；
//! * **开始** `t`：对 `•t` 中每次出现的库所减一个 token；
//! * **结束** `t`：对 `t•` 中每次出现的库所加一个 token。
//!
//! 原子发射即 `end(start(M))`。开始与结束之间迁移保持活跃，
//! 多个活跃迁移构成高维自动机中的一个高维单元.
//!
//! ## 示例
//!
//! ```rust
//! use pn2hda::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new("p0", 1));
//! let p1 = net.add_place(Place::new("p1", 0));
//! let t0 = net.add_transition(Transition::new("t0"));
//!
//! net.add_input_arc(p0, t0);
//! net.add_output_arc(p1, t0);
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0).unwrap();
//! assert_eq!(next.tokens(p0), 0);
//! assert_eq!(next.tokens(p1), 1);
//! ```

pub mod core;
pub mod ids;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use core::{DiagnosticReport, FireError, Net, NetError};
pub use ids::{PlaceId, TransitionId};
pub use index_vec::{Idx, IndexVec};
pub use structure::{Marking, MarkingKeys, Place, PlaceList, Transition, Weight};
