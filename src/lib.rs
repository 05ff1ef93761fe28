//! Petri 网到高维自动机（HDA）的转换.
//!
//! ```rust
//! use pn2hda::hda::convert;
//! use pn2hda::net::{Net, Place, Transition};
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new("p0", 1));
//! let p1 = net.add_place(Place::new("p1", 0));
//! net.add_transition(Transition::with_arcs("t0", [p0], [p1]));
//!
//! let hda = convert(&net).unwrap();
//! assert_eq!(hda.dimension_counts(), vec![2, 1]);
//! print!("{}", hda.listing());
//! ```
#![warn(non_snake_case)]

pub mod config;
pub mod hda;
pub mod net;
pub mod options;
pub mod util;
