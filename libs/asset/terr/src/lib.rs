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

// The TERR block of a Dark Omen PRJ file holds two parallel heightmaps of the
// battlefield. The grid is cut into 8x8 pixel blocks; each block is stored as a
// baseline height and a reference to a 64 byte table of per-pixel offsets above
// that baseline. Blocks with identical offset tables share a single table,
// which is how the game "compresses" its terrain.
//
// Layout, all integers 4 byte little endian:
//   tag:              "TERR"
//   size:             byte length of everything after this field
//   width, height:    in pixels
//   compressed:       number of offset tables stored
//   uncompressed:     number of blocks in each heightmap
//   unknown:          always uncompressed * 16 in shipped maps; ignored
//   blocks1:          uncompressed x (minimum: i32, table byte offset: u32)
//   blocks2:          same again for the second heightmap
//   offsets size:     compressed * 64
//   offsets:          compressed x [u8; 64]
//
// Table offsets are byte offsets into the offsets area and are therefore always
// a multiple of 64. We store them as indices.
mod compress;
pub mod cursor;
mod error;
mod raster;
mod stats;

pub use crate::{
    error::TerrError,
    raster::{HeightmapSelection, SmoothingAlgorithm},
    stats::TerrStatistics,
};

use crate::cursor::{ByteReader, ByteWriter};
use anyhow::{ensure, Result};
use log::{trace, warn};

pub const BLOCK_SIDE: usize = 8;
pub const PATTERN_SIZE: usize = BLOCK_SIDE * BLOCK_SIDE;

/// Offsets above the block minimum for each pixel of an 8x8 block, row major.
pub type Pattern = [u8; PATTERN_SIZE];

const MAGIC_TERR: &[u8; 4] = b"TERR";

// width, height, compressed, uncompressed, unknown
const HEADER_FIELDS_SIZE: usize = 5 * 4;
const CELL_RECORD_SIZE: usize = 8;
const UNKNOWN_HINT_FACTOR: usize = 16;

/// Metadata for one 8x8 block of one heightmap.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Cell {
    /// Baseline height of the block. Imported rasters store the lowest pixel
    /// value times 257 here; values read from disk are kept as-is.
    pub minimum: i32,
    /// Index into the terrain's pattern pool.
    pub pattern_index: usize,
}

impl Cell {
    pub fn new(minimum: i32, pattern_index: usize) -> Self {
        Self {
            minimum,
            pattern_index,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Terr {
    width: u32,
    height: u32,
    cells_map1: Vec<Cell>,
    cells_map2: Vec<Cell>,
    patterns: Vec<Pattern>,
}

impl Terr {
    /// Build a terrain from parts, checking that both heightmaps have the same
    /// number of cells and that every cell points into `patterns`.
    pub fn new(
        width: u32,
        height: u32,
        cells_map1: Vec<Cell>,
        cells_map2: Vec<Cell>,
        patterns: Vec<Pattern>,
    ) -> Result<Self> {
        ensure!(
            cells_map1.len() == cells_map2.len(),
            TerrError::invalid_argument(format!(
                "heightmaps have different block counts: {} and {}",
                cells_map1.len(),
                cells_map2.len()
            ))
        );
        let terr = Self {
            width,
            height,
            cells_map1,
            cells_map2,
            patterns,
        };
        if let Some(cell) = terr.first_dangling_cell() {
            return Err(TerrError::invalid_argument(format!(
                "pattern index {} out of range for {} patterns",
                cell.pattern_index,
                terr.patterns.len()
            ))
            .into());
        }
        Ok(terr)
    }

    // Starting point for the transformations, which push cells and patterns
    // in lock step.
    fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells_map1: Vec::new(),
            cells_map2: Vec::new(),
            patterns: Vec::new(),
        }
    }

    fn first_dangling_cell(&self) -> Option<&Cell> {
        self.cells_map1
            .iter()
            .chain(self.cells_map2.iter())
            .find(|cell| cell.pattern_index >= self.patterns.len())
    }

    /// Parse a TERR block from the start of `data`. Anything after the block
    /// is ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut ByteReader::new(data))
    }

    /// Parse a TERR block at the reader's position. On success the reader is
    /// left on the first byte after the block.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let magic = reader.read_array::<4>()?;
        ensure!(
            &magic == MAGIC_TERR,
            TerrError::format(format!(
                "block tag mismatch: expected TERR, found {:?}",
                String::from_utf8_lossy(&magic)
            ))
        );
        let block_size = reader.read_u32()? as usize;
        let body_start = reader.position();

        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let compressed_count = reader.read_u32()? as usize;
        let uncompressed_count = reader.read_u32()? as usize;
        let unknown = reader.read_u32()?;
        trace!(
            "TERR: {}x{}, {} blocks per map, {} patterns, unknown {}",
            width,
            height,
            uncompressed_count,
            compressed_count,
            unknown
        );

        let cells_map1 = Self::read_cells(reader, uncompressed_count, 1)?;
        let cells_map2 = Self::read_cells(reader, uncompressed_count, 2)?;

        let offsets_size = reader.read_u32()? as usize;
        ensure!(
            compressed_count.checked_mul(PATTERN_SIZE) == Some(offsets_size),
            TerrError::format(format!(
                "offset/compressed-count mismatch: {} offset bytes for {} patterns",
                offsets_size, compressed_count
            ))
        );
        ensure!(
            offsets_size <= reader.remaining(),
            TerrError::format("unexpected end of data")
        );
        let mut patterns = Vec::with_capacity(compressed_count);
        for _ in 0..compressed_count {
            patterns.push(reader.read_array::<PATTERN_SIZE>()?);
        }

        let terr = Self {
            width,
            height,
            cells_map1,
            cells_map2,
            patterns,
        };
        if let Some(cell) = terr.first_dangling_cell() {
            return Err(TerrError::format(format!(
                "pattern index out of range: {} with {} patterns",
                cell.pattern_index,
                terr.patterns.len()
            ))
            .into());
        }

        let consumed = reader.position() - body_start;
        if consumed != block_size {
            warn!(
                "TERR size field says {} bytes, but the block holds {} bytes",
                block_size, consumed
            );
        }
        Ok(terr)
    }

    fn read_cells(reader: &mut ByteReader, count: usize, map: usize) -> Result<Vec<Cell>> {
        ensure!(
            count <= reader.remaining() / CELL_RECORD_SIZE,
            TerrError::format("unexpected end of data")
        );
        let mut cells = Vec::with_capacity(count);
        for i in 0..count {
            let minimum = reader.read_i32()?;
            let offset = reader.read_u32()? as usize;
            ensure!(
                offset % PATTERN_SIZE == 0,
                TerrError::format(format!(
                    "offset not block-aligned: block {} of heightmap {} points at 0x{:X}",
                    i, map, offset
                ))
            );
            cells.push(Cell::new(minimum, offset / PATTERN_SIZE));
        }
        Ok(cells)
    }

    fn body_size(&self) -> usize {
        HEADER_FIELDS_SIZE
            + (self.cells_map1.len() + self.cells_map2.len()) * CELL_RECORD_SIZE
            + 4
            + self.patterns.len() * PATTERN_SIZE
    }

    /// Serialize into the on-disk layout, recomputing all size fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(8 + self.body_size());
        self.write(&mut writer)?;
        Ok(writer.into_inner())
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_bytes(MAGIC_TERR);
        writer.write_len(self.body_size())?;
        writer.write_u32(self.width)?;
        writer.write_u32(self.height)?;
        writer.write_len(self.patterns.len())?;
        writer.write_len(self.cells_map1.len())?;
        writer.write_len(self.cells_map1.len().saturating_mul(UNKNOWN_HINT_FACTOR))?;
        for cell in self.cells_map1.iter().chain(self.cells_map2.iter()) {
            writer.write_i32(cell.minimum)?;
            writer.write_len(cell.pattern_index.saturating_mul(PATTERN_SIZE))?;
        }
        writer.write_len(self.patterns.len().saturating_mul(PATTERN_SIZE))?;
        for pattern in &self.patterns {
            writer.write_bytes(pattern);
        }
        Ok(())
    }

    /// Exchange the first and second heightmaps. The pattern pool is shared,
    /// so only the cell lists move.
    pub fn swap(&self) -> Terr {
        Terr {
            width: self.width,
            height: self.height,
            cells_map1: self.cells_map2.clone(),
            cells_map2: self.cells_map1.clone(),
            patterns: self.patterns.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells_map1(&self) -> &[Cell] {
        &self.cells_map1
    }

    pub fn cells_map2(&self) -> &[Cell] {
        &self.cells_map2
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    // Only for cells of this terrain, which are always in range.
    pub(crate) fn pattern(&self, cell: &Cell) -> &Pattern {
        &self.patterns[cell.pattern_index]
    }

    /// Number of 8x8 blocks across, counting a partial block at the edge.
    pub fn blocks_per_row(&self) -> usize {
        (self.width as usize + BLOCK_SIDE - 1) / BLOCK_SIDE
    }

    pub fn blocks_per_column(&self) -> usize {
        (self.height as usize + BLOCK_SIDE - 1) / BLOCK_SIDE
    }

    /// Number of blocks the dimensions call for in each heightmap.
    pub fn block_count(&self) -> usize {
        self.blocks_per_row() * self.blocks_per_column()
    }

    /// True if every cell owns its own pattern, in storage order.
    #[cfg(test)]
    pub(crate) fn is_decompressed(&self) -> bool {
        let n = self.cells_map1.len();
        self.patterns.len() == 2 * n
            && self
                .cells_map1
                .iter()
                .chain(self.cells_map2.iter())
                .enumerate()
                .all(|(i, cell)| cell.pattern_index == i)
    }
}
