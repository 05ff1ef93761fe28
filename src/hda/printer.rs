//! 文本清单：按维数升序为单元编号，同维内保持构造顺序.
use std::fmt;
use std::io;

use itertools::Itertools;

use crate::hda::cell::{CellId, Faces};
use crate::hda::Hda;
use crate::net::index_vec::{Idx, IndexVec};

/// Stable printed index of every cell.
#[derive(Debug, Clone)]
pub struct Numbering {
    order: Vec<CellId>,
    index: IndexVec<CellId, usize>,
}

impl Numbering {
    pub fn new(hda: &Hda) -> Self {
        let order: Vec<CellId> = hda
            .cells
            .indices()
            .sorted_by_key(|&id| (hda.cells[id].dimension, id))
            .collect();
        let mut index: IndexVec<CellId, usize> = hda.cells.iter().map(|_| 0).collect();
        for (position, &id) in order.iter().enumerate() {
            index[id] = position;
        }
        Self { order, index }
    }

    /// Printed index of `cell`.
    pub fn index_of(&self, cell: CellId) -> Option<usize> {
        self.index.get(cell).copied()
    }

    /// Cells in printed order.
    pub fn order(&self) -> &[CellId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct Listing<'a> {
    hda: &'a Hda,
    numbering: Numbering,
}

impl<'a> Listing<'a> {
    pub fn new(hda: &'a Hda) -> Self {
        Self {
            hda,
            numbering: Numbering::new(hda),
        }
    }

    pub fn numbering(&self) -> &Numbering {
        &self.numbering
    }

    fn write_faces(&self, f: &mut fmt::Formatter<'_>, faces: &Faces) -> fmt::Result {
        write!(f, "[")?;
        for (i, &face) in faces.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.numbering.index_of(face) {
                Some(index) => write!(f, "{index}")?,
                None => write!(f, "?{}", face.index())?,
            }
        }
        write!(f, "]")
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cells:")?;
        for (position, &id) in self.numbering.order().iter().enumerate() {
            if position > 0 {
                writeln!(f, ",")?;
            }
            let cell = &self.hda.cells[id];
            if cell.is_vertex() {
                write!(f, "{position}: dim=0")?;
            } else {
                write!(
                    f,
                    "{position}: dim={}:\t[{}]",
                    cell.dimension,
                    cell.labels.join(", ")
                )?;
            }
            write!(f, "; d0: ")?;
            self.write_faces(f, &cell.d0)?;
            write!(f, "; d1: ")?;
            self.write_faces(f, &cell.d1)?;
        }
        if !self.numbering.is_empty() {
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Hda {
    pub fn listing(&self) -> Listing<'_> {
        Listing::new(self)
    }

    pub fn write_listing<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{}", self.listing())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hda::convert::convert;
    use crate::net::core::Net;
    use crate::net::ids::PlaceId;
    use crate::net::structure::{Place, Transition};

    fn single() -> Net {
        let mut net = Net::empty();
        let p0 = net.add_place(Place::new("p0", 1));
        let p1 = net.add_place(Place::new("p1", 0));
        net.add_transition(Transition::with_arcs("t0", [p0], [p1]));
        net
    }

    #[test]
    fn single_transition_listing() {
        let hda = convert(&single()).unwrap();
        let expected = "cells:\n\
                        0: dim=0; d0: []; d1: [2],\n\
                        1: dim=0; d0: [2]; d1: [],\n\
                        2: dim=1:\t[t0]; d0: [0]; d1: [1]\n";
        assert_eq!(hda.listing().to_string(), expected);
    }

    #[test]
    fn numbering_groups_by_dimension_keeping_arena_order() {
        let hda = convert(&single()).unwrap();
        let numbering = Numbering::new(&hda);
        assert_eq!(
            numbering.order(),
            &[CellId::new(0), CellId::new(2), CellId::new(1)]
        );
        assert_eq!(numbering.index_of(CellId::new(1)), Some(2));
        assert_eq!(numbering.index_of(CellId::new(7)), None);
    }

    #[test]
    fn labels_keep_start_order() {
        let mut net = Net::empty();
        for (name, tokens) in [("a", 1), ("b", 1), ("a'", 0), ("b'", 0)] {
            net.add_place(Place::new(name, tokens));
        }
        net.add_transition(Transition::with_arcs(
            "t1",
            [PlaceId::new(0)],
            [PlaceId::new(2)],
        ));
        net.add_transition(Transition::with_arcs(
            "t2",
            [PlaceId::new(1)],
            [PlaceId::new(3)],
        ));
        let hda = convert(&net).unwrap();
        let text = hda.listing().to_string();
        assert!(text.contains("8: dim=2:\t[t1, t2]; d0: [4, 7]; d1: [5, 6]\n"));
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn write_listing_matches_display() {
        let hda = convert(&single()).unwrap();
        let mut buffer = Vec::new();
        hda.write_listing(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), hda.listing().to_string());
    }

    #[test]
    fn empty_hda_lists_only_the_header() {
        assert_eq!(Hda::new().listing().to_string(), "cells:\n");
    }
}
