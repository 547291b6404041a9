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

// Exact-width little-endian reads and writes over in-memory buffers. All TERR
// and PRJ parsing goes through these so that running off the end of the data
// is reported as a format error rather than a bare io error.
use crate::error::TerrError;
use anyhow::{ensure, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

fn map_io(err: io::Error) -> anyhow::Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TerrError::format("unexpected end of data").into()
    } else {
        err.into()
    }
}

pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.data().len().saturating_sub(self.position())
    }

    fn data(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    // io::Cursor moves to the end of the buffer on a short read; check first so
    // a failed read leaves the position where it was.
    fn ensure_available(&self, len: usize) -> Result<()> {
        ensure!(
            len <= self.remaining(),
            TerrError::format("unexpected end of data")
        );
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure_available(4)?;
        self.cursor.read_u32::<LittleEndian>().map_err(map_io)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure_available(4)?;
        self.cursor.read_i32::<LittleEndian>().map_err(map_io)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure_available(N)?;
        let mut out = [0u8; N];
        self.cursor.read_exact(&mut out).map_err(map_io)?;
        Ok(out)
    }

    /// Borrow the next `len` bytes straight out of the underlying buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_available(len)?;
        let start = self.position();
        self.cursor.set_position((start + len) as u64);
        Ok(&self.data()[start..start + len])
    }

    /// Consume everything up to the end of the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let start = self.position().min(self.data().len());
        self.cursor.set_position(self.data().len() as u64);
        &self.data()[start..]
    }
}

#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.buf.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Write a count or byte length into a 4 byte field.
    pub fn write_len(&mut self, value: usize) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| {
            TerrError::format(format!("{value} does not fit in a 4 byte size field"))
        })?;
        self.write_u32(value)
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_reads_little_endian_fields() -> Result<()> {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFF, b'T', b'E'];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u32()?, 0x0403_0201);
        assert_eq!(reader.read_i32()?, -1);
        assert_eq!(reader.remaining(), 2);
        assert_eq!(&reader.read_array::<2>()?, b"TE");
        assert_eq!(reader.position(), 10);
        Ok(())
    }

    #[test]
    fn it_reports_truncation_as_a_format_error() {
        let data = [0u8; 3];
        let mut reader = ByteReader::new(&data);
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err.downcast_ref::<TerrError>(),
            Some(&TerrError::format("unexpected end of data"))
        );
        assert_eq!(reader.position(), 0);
        assert!(reader.read_array::<4>().is_err());
        assert!(reader.read_i32().is_err());
        assert!(reader.read_bytes(4).is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_bytes(3).unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn it_can_take_the_rest() -> Result<()> {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&data);
        reader.read_bytes(2)?;
        assert_eq!(reader.read_rest(), &[3, 4, 5]);
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_rest().is_empty());
        Ok(())
    }

    #[test]
    fn it_writes_little_endian_fields() -> Result<()> {
        let mut writer = ByteWriter::default();
        writer.write_bytes(b"TERR");
        writer.write_u32(0x0403_0201)?;
        writer.write_i32(-2)?;
        writer.write_len(64)?;
        assert_eq!(
            writer.into_inner(),
            vec![
                b'T', b'E', b'R', b'R', 1, 2, 3, 4, 0xFE, 0xFF, 0xFF, 0xFF, 64, 0, 0, 0
            ]
        );
        Ok(())
    }
}
