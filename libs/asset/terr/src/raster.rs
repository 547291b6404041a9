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
use crate::{Cell, Pattern, Terr, TerrError, BLOCK_SIDE, PATTERN_SIZE};
use anyhow::{ensure, Result};
use bitflags::bitflags;
use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbaImage};
use log::debug;

// Imported rasters are 8 bit; the game's heights are scaled towards 16 bit.
const MINIMUM_SCALE: i32 = 257;

bitflags! {
    /// Which heightmap(s) an operation applies to.
    pub struct HeightmapSelection: u8 {
        const FIRST = 0b01;
        const SECOND = 0b10;
    }
}

/// Mapping from stored height to output brightness.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SmoothingAlgorithm {
    /// `offset + minimum / 257`; the inverse of image import.
    #[default]
    Default,
    /// `20 + ((offset * 128 + minimum) / 1024) * 2`, from Rob's original
    /// heightmap parser.
    Rob,
}

impl SmoothingAlgorithm {
    pub fn brightness(self, offset: u8, minimum: i32) -> u8 {
        let offset = i64::from(offset);
        let minimum = i64::from(minimum);
        let value = match self {
            Self::Default => offset + minimum / i64::from(MINIMUM_SCALE),
            Self::Rob => 20 + ((offset * 128 + minimum) / 1024) * 2,
        };
        value.clamp(0, 255) as u8
    }
}

impl Terr {
    /// Render one heightmap as a grayscale image of `width` x `height`.
    pub fn to_image(
        &self,
        selection: HeightmapSelection,
        smoothing: SmoothingAlgorithm,
    ) -> Result<GrayImage> {
        let cells = if selection == HeightmapSelection::FIRST {
            &self.cells_map1
        } else if selection == HeightmapSelection::SECOND {
            &self.cells_map2
        } else {
            return Err(TerrError::invalid_argument(
                "exactly one heightmap must be selected for export",
            )
            .into());
        };

        let pixel_count = u64::from(self.width)
            .checked_mul(u64::from(self.height))
            .filter(|&n| n <= isize::MAX as u64 && usize::try_from(n).is_ok());
        ensure!(
            pixel_count.is_some(),
            TerrError::format(format!(
                "{}x{} is too large to render",
                self.width, self.height
            ))
        );
        let mut image = GrayImage::new(self.width, self.height);
        let blocks_per_row = self.blocks_per_row();
        let mut block_x = 0;
        let mut block_y = 0;
        for cell in cells {
            let pattern = self.pattern(cell);
            for (offset, &value) in pattern.iter().enumerate() {
                let x = block_x * BLOCK_SIDE + offset % BLOCK_SIDE;
                let y = block_y * BLOCK_SIDE + offset / BLOCK_SIDE;
                if x < self.width as usize && y < self.height as usize {
                    image.put_pixel(
                        x as u32,
                        y as u32,
                        Luma([smoothing.brightness(value, cell.minimum)]),
                    );
                }
            }
            block_x += 1;
            if block_x == blocks_per_row {
                block_x = 0;
                block_y += 1;
            }
        }
        Ok(image)
    }

    /// Replace the selected heightmap(s) with the contents of `image`, which
    /// must match the terrain's dimensions. The red channel is taken as the
    /// height. The result is decompressed; call `compress` afterwards to share
    /// patterns again.
    pub fn from_image(&self, image: &DynamicImage, selection: HeightmapSelection) -> Result<Terr> {
        ensure!(
            !selection.is_empty(),
            TerrError::invalid_argument("no heightmap selected for import")
        );
        let (width, height) = image.dimensions();
        ensure!(
            (width, height) == (self.width, self.height),
            TerrError::invalid_argument(format!(
                "image is {}x{}, but the terrain is {}x{}",
                width, height, self.width, self.height
            ))
        );
        if !selection.is_all() {
            ensure!(
                self.cells_map1.len() == self.block_count(),
                TerrError::format(format!(
                    "terrain has {} blocks per heightmap, but {}x{} needs {}",
                    self.cells_map1.len(),
                    self.width,
                    self.height,
                    self.block_count()
                ))
            );
        }

        let source = self.decompress();
        let blocks = self.read_blocks(&image.to_rgba8());
        let mut out = Terr::with_dimensions(self.width, self.height);
        for (map, source_cells) in [
            (HeightmapSelection::FIRST, &source.cells_map1),
            (HeightmapSelection::SECOND, &source.cells_map2),
        ] {
            let cells = if selection.contains(map) {
                blocks
                    .iter()
                    .map(|(minimum, pattern)| out.push_pattern(*minimum, pattern))
                    .collect()
            } else {
                source_cells
                    .iter()
                    .map(|cell| out.push_pattern(cell.minimum, source.pattern(cell)))
                    .collect::<Vec<Cell>>()
            };
            if map == HeightmapSelection::FIRST {
                out.cells_map1 = cells;
            } else {
                out.cells_map2 = cells;
            }
        }
        debug!(
            "imported {}x{} image into {:?}: {} blocks",
            width,
            height,
            selection,
            blocks.len()
        );
        Ok(out)
    }

    // Cut the raster into 8x8 blocks, row major. Pixels off the edge of the
    // image stay zero in the pattern and do not count towards the minimum.
    fn read_blocks(&self, raster: &RgbaImage) -> Vec<(i32, Pattern)> {
        let mut blocks = Vec::with_capacity(self.block_count());
        for block_y in 0..self.blocks_per_column() {
            for block_x in 0..self.blocks_per_row() {
                let mut samples = [None; PATTERN_SIZE];
                for (offset, sample) in samples.iter_mut().enumerate() {
                    let x = block_x * BLOCK_SIDE + offset % BLOCK_SIDE;
                    let y = block_y * BLOCK_SIDE + offset / BLOCK_SIDE;
                    if x < raster.width() as usize && y < raster.height() as usize {
                        *sample = Some(raster.get_pixel(x as u32, y as u32)[0]);
                    }
                }
                let minimum = samples.iter().flatten().copied().min().unwrap_or(0);
                let mut pattern = [0u8; PATTERN_SIZE];
                for (dst, sample) in pattern.iter_mut().zip(samples.iter()) {
                    if let Some(value) = sample {
                        *dst = value.wrapping_sub(minimum);
                    }
                }
                blocks.push((i32::from(minimum) * MINIMUM_SCALE, pattern));
            }
        }
        blocks
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn flat_terr(width: u32, height: u32, minimum: i32, offset: u8) -> Result<Terr> {
        let probe = Terr::new(width, height, vec![], vec![], vec![])?;
        let n = probe.block_count();
        Terr::new(
            width,
            height,
            vec![Cell::new(minimum, 0); n],
            vec![Cell::new(0, 1); n],
            vec![[offset; PATTERN_SIZE], [0; PATTERN_SIZE]],
        )
    }

    fn gradient(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| Luma([(x * 3 + y * 5) as u8]))
    }

    fn assert_invalid_argument(result: Result<impl std::fmt::Debug>) {
        let err = result.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<TerrError>(),
                Some(TerrError::InvalidArgument(_))
            ),
            "{err}"
        );
    }

    #[test]
    fn it_computes_brightness() {
        assert_eq!(SmoothingAlgorithm::Default.brightness(5, 2570), 15);
        assert_eq!(SmoothingAlgorithm::Default.brightness(250, 257 * 10), 255);
        assert_eq!(SmoothingAlgorithm::Default.brightness(0, -2570), 0);
        assert_eq!(SmoothingAlgorithm::Rob.brightness(5, 2570), 26);
        assert_eq!(SmoothingAlgorithm::Rob.brightness(0, 0), 20);
    }

    #[test]
    fn it_exports_with_default_smoothing() -> Result<()> {
        let terr = flat_terr(16, 16, 2570, 5)?;
        let image = terr.to_image(HeightmapSelection::FIRST, SmoothingAlgorithm::Default)?;
        assert_eq!(image.dimensions(), (16, 16));
        assert!(image.pixels().all(|p| p[0] == 15));
        let image = terr.to_image(HeightmapSelection::SECOND, SmoothingAlgorithm::Default)?;
        assert!(image.pixels().all(|p| p[0] == 0));
        Ok(())
    }

    #[test]
    fn it_exports_with_rob_smoothing() -> Result<()> {
        let terr = flat_terr(8, 8, 2570, 5)?;
        let image = terr.to_image(HeightmapSelection::FIRST, SmoothingAlgorithm::Rob)?;
        assert!(image.pixels().all(|p| p[0] == 26));
        Ok(())
    }

    #[test]
    fn it_requires_exactly_one_heightmap_for_export() -> Result<()> {
        let terr = flat_terr(8, 8, 0, 0)?;
        assert_invalid_argument(terr.to_image(HeightmapSelection::all(), Default::default()));
        assert_invalid_argument(terr.to_image(HeightmapSelection::empty(), Default::default()));
        Ok(())
    }

    #[test]
    fn it_refuses_to_render_impossible_dimensions() -> Result<()> {
        let mut block = b"TERR".to_vec();
        for field in [24, u32::MAX, u32::MAX, 0, 0, 0, 0] {
            block.extend_from_slice(&field.to_le_bytes());
        }
        let terr = Terr::from_bytes(&block)?;
        assert_eq!(terr.width(), u32::MAX);
        let err = terr
            .to_image(HeightmapSelection::FIRST, SmoothingAlgorithm::Default)
            .unwrap_err();
        assert!(
            matches!(err.downcast_ref::<TerrError>(), Some(TerrError::Format(_))),
            "{err}"
        );
        Ok(())
    }

    #[test]
    fn it_places_blocks_row_major() -> Result<()> {
        // 3x2 blocks with a partial right column and bottom row.
        let (width, height) = (20, 12);
        let n = 6;
        let terr = Terr::new(
            width,
            height,
            (0..n).map(|i| Cell::new(0, i)).collect(),
            (0..n).map(|i| Cell::new(0, i)).collect(),
            (0..n).map(|i| [i as u8 * 10; PATTERN_SIZE]).collect(),
        )?;
        let image = terr.to_image(HeightmapSelection::FIRST, SmoothingAlgorithm::Default)?;
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(8, 0)[0], 10);
        assert_eq!(image.get_pixel(19, 7)[0], 20);
        assert_eq!(image.get_pixel(0, 8)[0], 30);
        assert_eq!(image.get_pixel(15, 11)[0], 40);
        assert_eq!(image.get_pixel(19, 11)[0], 50);
        Ok(())
    }

    #[test]
    fn it_imports_both_heightmaps() -> Result<()> {
        let terr = flat_terr(16, 16, 0, 0)?;
        let source = DynamicImage::ImageLuma8(gradient(16, 16));
        let out = terr.from_image(&source, HeightmapSelection::all())?;
        assert!(out.is_decompressed());
        assert_eq!(out.cells_map1().len(), 4);

        // block (1, 1) starts at pixel (8, 8), whose value is the block minimum
        let cell = out.cells_map1()[3];
        assert_eq!(cell.minimum, (8 * 3 + 8 * 5) * 257);
        let pattern = out.pattern(&cell);
        assert_eq!(pattern[0], 0);
        assert_eq!(pattern[1], 3);
        assert_eq!(pattern[8], 5);

        for selection in [HeightmapSelection::FIRST, HeightmapSelection::SECOND] {
            let image = out.to_image(selection, SmoothingAlgorithm::Default)?;
            assert_eq!(image, gradient(16, 16));
        }
        Ok(())
    }

    #[test]
    fn it_reads_the_red_channel() -> Result<()> {
        let terr = flat_terr(8, 8, 0, 0)?;
        let source = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([42, 1, 200])));
        let out = terr.from_image(&source, HeightmapSelection::FIRST)?;
        assert_eq!(out.cells_map1()[0].minimum, 42 * 257);
        assert_eq!(out.pattern(&out.cells_map1()[0]), &[0; PATTERN_SIZE]);
        Ok(())
    }

    #[test]
    fn it_passes_through_the_unselected_heightmap() -> Result<()> {
        let terr = flat_terr(16, 16, 2570, 5)?.compress();
        let source = DynamicImage::ImageLuma8(gradient(16, 16));
        let out = terr.from_image(&source, HeightmapSelection::SECOND)?;
        assert!(out.is_decompressed());
        assert_eq!(out.cells_map1(), terr.decompress().cells_map1());
        for cell in out.cells_map1() {
            assert_eq!(out.pattern(cell), &[5; PATTERN_SIZE]);
        }
        let image = out.to_image(HeightmapSelection::SECOND, SmoothingAlgorithm::Default)?;
        assert_eq!(image, gradient(16, 16));
        Ok(())
    }

    #[test]
    fn it_round_trips_partial_edge_blocks() -> Result<()> {
        let terr = flat_terr(13, 10, 0, 0)?;
        let source = gradient(13, 10);
        let out = terr.from_image(
            &DynamicImage::ImageLuma8(source.clone()),
            HeightmapSelection::all(),
        )?;
        assert_eq!(out.cells_map1().len(), 4);
        // off-image positions of the last block stay zero
        let last = out.pattern(&out.cells_map1()[3]);
        assert_eq!(last[7], 0);
        assert_eq!(last[63], 0);
        let image = out
            .compress()
            .to_image(HeightmapSelection::FIRST, SmoothingAlgorithm::Default)?;
        assert_eq!(image, source);
        Ok(())
    }

    #[test]
    fn it_rejects_mismatched_dimensions() -> Result<()> {
        let terr = flat_terr(16, 16, 0, 0)?;
        let source = DynamicImage::ImageLuma8(gradient(16, 8));
        assert_invalid_argument(terr.from_image(&source, HeightmapSelection::all()));
        Ok(())
    }

    #[test]
    fn it_requires_a_heightmap_for_import() -> Result<()> {
        let terr = flat_terr(8, 8, 0, 0)?;
        let source = DynamicImage::ImageLuma8(gradient(8, 8));
        assert_invalid_argument(terr.from_image(&source, HeightmapSelection::empty()));
        Ok(())
    }
}
