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
use crate::{Cell, Terr};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct TerrStatistics {
    pub width: u32,
    pub height: u32,
    /// Lowest and highest block minimum in each heightmap.
    pub hmap1_range: Option<(i32, i32)>,
    pub hmap2_range: Option<(i32, i32)>,
    /// Blocks across both heightmaps.
    pub block_count: usize,
    pub pattern_count: usize,
}

impl TerrStatistics {
    /// Percentage of patterns saved by sharing.
    pub fn compression_ratio(&self) -> f32 {
        if self.block_count == 0 {
            return 0.0;
        }
        100.0 - self.pattern_count as f32 / self.block_count as f32 * 100.0
    }
}

fn minimum_range(cells: &[Cell]) -> Option<(i32, i32)> {
    let min = cells.iter().map(|c| c.minimum).min()?;
    let max = cells.iter().map(|c| c.minimum).max()?;
    Some((min, max))
}

impl fmt::Display for TerrStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = |r: Option<(i32, i32)>| match r {
            Some((min, max)) => format!("{min}/{max}"),
            None => "-".to_owned(),
        };
        writeln!(f, "Dimension: {}x{}", self.width, self.height)?;
        writeln!(f, "Min/Max (Hmap1): {}", range(self.hmap1_range))?;
        writeln!(f, "Min/Max (Hmap2): {}", range(self.hmap2_range))?;
        writeln!(f, "Blocks: {}/{}", self.block_count, self.pattern_count)?;
        write!(f, "Compression: {:.2}%", self.compression_ratio())
    }
}

impl Terr {
    pub fn statistics(&self) -> TerrStatistics {
        TerrStatistics {
            width: self.width,
            height: self.height,
            hmap1_range: minimum_range(&self.cells_map1),
            hmap2_range: minimum_range(&self.cells_map2),
            block_count: self.cells_map1.len() + self.cells_map2.len(),
            pattern_count: self.patterns.len(),
        }
    }
}
