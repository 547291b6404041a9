// This file is part of hmap-gen.
//
// hmap-gen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// hmap-gen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with hmap-gen.  If not, see <http://www.gnu.org/licenses/>.
use crate::{Cell, Pattern, Terr};
use log::debug;
use std::collections::HashMap;

// Appends patterns, handing back the index of the first identical pattern if
// one was already added. Lookups are hashed, but since an entry is only ever
// inserted on first sight the result is the same as a linear scan from the
// front of the pool.
#[derive(Default)]
struct PatternPool {
    patterns: Vec<Pattern>,
    first_seen: HashMap<Pattern, usize>,
}

impl PatternPool {
    fn intern(&mut self, pattern: &Pattern) -> usize {
        if let Some(&index) = self.first_seen.get(pattern) {
            return index;
        }
        let index = self.patterns.len();
        self.patterns.push(*pattern);
        self.first_seen.insert(*pattern, index);
        index
    }
}

impl Terr {
    /// Give every cell its own copy of its pattern: first heightmap, then second,
    /// so that `cells_map1[i]` owns pattern `i` and `cells_map2[i]` owns
    /// pattern `n + i`.
    pub fn decompress(&self) -> Terr {
        let mut out = Terr::with_dimensions(self.width, self.height);
        out.patterns
            .reserve(self.cells_map1.len() + self.cells_map2.len());
        for cell in &self.cells_map1 {
            let cell = out.push_pattern(cell.minimum, self.pattern(cell));
            out.cells_map1.push(cell);
        }
        for cell in &self.cells_map2 {
            let cell = out.push_pattern(cell.minimum, self.pattern(cell));
            out.cells_map2.push(cell);
        }
        debug!(
            "decompressed TERR: {} -> {} patterns",
            self.patterns.len(),
            out.patterns.len()
        );
        out
    }

    pub(crate) fn push_pattern(&mut self, minimum: i32, pattern: &Pattern) -> Cell {
        self.patterns.push(*pattern);
        Cell::new(minimum, self.patterns.len() - 1)
    }

    /// Share byte-identical patterns between cells. Cells are visited first
    /// heightmap then second, and each one points at the earliest matching
    /// pattern, so the output is fully determined by the input.
    pub fn compress(&self) -> Terr {
        let source = self.decompress();
        let mut pool = PatternPool::default();
        let mut intern_all = |cells: &[Cell]| -> Vec<Cell> {
            cells
                .iter()
                .map(|cell| Cell::new(cell.minimum, pool.intern(source.pattern(cell))))
                .collect()
        };
        let cells_map1 = intern_all(&source.cells_map1);
        let cells_map2 = intern_all(&source.cells_map2);
        debug!(
            "compressed TERR: {} -> {} patterns",
            source.patterns.len(),
            pool.patterns.len()
        );
        Terr {
            width: self.width,
            height: self.height,
            cells_map1,
            cells_map2,
            patterns: pool.patterns,
        }
    }
}
