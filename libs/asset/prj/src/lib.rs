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

// A PRJ file is a Dark Omen battle map: a fixed text header followed by a run
// of tagged blocks. We only care about TERR; everything before it is kept as an
// opaque prefix and everything after it as an opaque suffix, so that a
// rewritten TERR block can be spliced back in without understanding the rest.
//
//   header: "Dark Omen Battle file 1.10      " (32 bytes)
//   BASE:   tag, size, size bytes
//   WATR:   tag, size, size bytes
//   FURN:   tag, size, fixup, size + fixup * 4 - 4 bytes
//   INST:   tag, size, size + 8 bytes
//   TERR:   see the terr crate
//   ...     whatever follows, untouched
use anyhow::{ensure, Context, Result};
use log::{trace, warn};
use std::{fs, path::Path};
use terr::{cursor::ByteReader, Terr};

const PRJ_HEADER: &[u8; 32] = b"Dark Omen Battle file 1.10      ";

// Sizes of the FURN and INST trailers are not covered by their size fields.
const INST_TRAILER_SIZE: usize = 8;

pub struct Prj {
    prefix: Vec<u8>,
    terr: Terr,
    suffix: Vec<u8>,
}

impl Prj {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= PRJ_HEADER.len() && &data[..PRJ_HEADER.len()] == PRJ_HEADER,
            "not a PRJ file"
        );
        let mut reader = ByteReader::new(data);
        reader.read_bytes(PRJ_HEADER.len())?;

        Self::skip_block(&mut reader, b"BASE", |size, _| Ok(size))?;
        Self::skip_block(&mut reader, b"WATR", |size, _| Ok(size))?;
        Self::skip_block(&mut reader, b"FURN", |size, reader| {
            let fixup = reader.read_u32()? as usize;
            fixup
                .checked_mul(4)
                .and_then(|n| n.checked_add(size))
                .and_then(|n| n.checked_sub(4))
                .context("FURN fixup count out of range")
        })?;
        Self::skip_block(&mut reader, b"INST", |size, _| {
            size.checked_add(INST_TRAILER_SIZE)
                .context("INST size out of range")
        })?;
        let prefix = data[..reader.position()].to_vec();

        let terr = Terr::read(&mut reader).context("reading TERR block")?;
        let suffix = reader.read_rest().to_vec();
        trace!(
            "PRJ: {} prefix bytes, TERR {}x{}, {} suffix bytes",
            prefix.len(),
            terr.width(),
            terr.height(),
            suffix.len()
        );
        Ok(Self {
            prefix,
            terr,
            suffix,
        })
    }

    // Blocks before TERR are copied through without interpretation, so a tag we
    // did not expect is only worth a warning.
    fn skip_block<F>(reader: &mut ByteReader, expect: &[u8; 4], body_len: F) -> Result<()>
    where
        F: FnOnce(usize, &mut ByteReader) -> Result<usize>,
    {
        let tag = reader.read_array::<4>()?;
        if &tag != expect {
            warn!(
                "expected {} block, found {:?}",
                String::from_utf8_lossy(expect),
                String::from_utf8_lossy(&tag)
            );
        }
        let size = reader.read_u32()? as usize;
        let len = body_len(size, reader)?;
        trace!(
            "skipping {} block: size {}, {} bytes",
            String::from_utf8_lossy(&tag),
            size,
            len
        );
        reader.read_bytes(len)?;
        Ok(())
    }

    pub fn terr(&self) -> &Terr {
        &self.terr
    }

    pub fn set_terr(&mut self, terr: Terr) {
        self.terr = terr;
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let terr = self.terr.to_bytes()?;
        let mut out = Vec::with_capacity(self.prefix.len() + terr.len() + self.suffix.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&terr);
        out.extend_from_slice(&self.suffix);
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use terr::{Cell, TerrError};

    fn block(out: &mut Vec<u8>, tag: &[u8; 4], size: u32, extra: &[u8], body_len: usize) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(extra);
        out.extend((0..body_len).map(|i| i as u8));
    }

    fn make_terr() -> Result<Terr> {
        Terr::new(
            8,
            8,
            vec![Cell::new(2570, 0)],
            vec![Cell::new(0, 1)],
            vec![[5; 64], [0; 64]],
        )
    }

    fn make_prj(terr: &Terr) -> Result<Vec<u8>> {
        let mut out = PRJ_HEADER.to_vec();
        block(&mut out, b"BASE", 12, &[], 12);
        block(&mut out, b"WATR", 3, &[], 3);
        // fixup of 2 => size + 4 more bytes
        block(&mut out, b"FURN", 5, &2u32.to_le_bytes(), 9);
        block(&mut out, b"INST", 4, &[], 12);
        out.extend_from_slice(&terr.to_bytes()?);
        out.extend_from_slice(b"SHEETS and the rest");
        Ok(out)
    }

    #[test]
    fn it_splits_around_the_terr_block() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let terr = make_terr()?;
        let data = make_prj(&terr)?;
        let prj = Prj::from_bytes(&data)?;
        assert_eq!(prj.terr(), &terr);
        assert_eq!(prj.prefix.len(), 32 + (8 + 12) + (8 + 3) + (12 + 9) + (8 + 12));
        assert_eq!(prj.suffix, b"SHEETS and the rest");
        assert_eq!(prj.to_bytes()?, data);
        Ok(())
    }

    #[test]
    fn it_splices_in_a_new_terr_block() -> Result<()> {
        let data = make_prj(&make_terr()?)?;
        let mut prj = Prj::from_bytes(&data)?;
        let swapped = prj.terr().swap().decompress();
        prj.set_terr(swapped.clone());
        let reread = Prj::from_bytes(&prj.to_bytes()?)?;
        assert_eq!(reread.terr(), &swapped);
        assert_eq!(reread.prefix, prj.prefix);
        assert_eq!(reread.suffix, prj.suffix);
        Ok(())
    }

    #[test]
    fn it_rejects_other_files() {
        assert!(Prj::from_bytes(b"BITE").is_err());
        let mut data = PRJ_HEADER.to_vec();
        data[22] = b'2';
        assert!(Prj::from_bytes(&data).is_err());
    }

    #[test]
    fn it_reports_a_bad_terr_block() -> Result<()> {
        let mut data = make_prj(&make_terr()?)?;
        let at = data.len() - 19 - 2 * 64 - 4 - 16;
        data[at + 4..at + 8].copy_from_slice(&1u32.to_le_bytes());
        let err = Prj::from_bytes(&data).err().context("expected an error")?;
        assert!(matches!(
            err.downcast_ref::<TerrError>(),
            Some(TerrError::Format(_))
        ));
        Ok(())
    }

    #[test]
    fn it_can_save_and_load() -> Result<()> {
        let data = make_prj(&make_terr()?)?;
        let prj = Prj::from_bytes(&data)?;
        let path = std::env::temp_dir().join(format!("prj-test-{}.prj", std::process::id()));
        prj.save(&path)?;
        let loaded = Prj::from_path(&path)?;
        fs::remove_file(&path)?;
        assert_eq!(loaded.to_bytes()?, data);
        Ok(())
    }
}
