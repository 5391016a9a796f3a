//! Structured binary I/O for segment files.
//!
//! Every segment file has the layout
//!
//! ```text
//! magic: u32 | version: u32 | body ... | crc32: u32
//! ```
//!
//! where the CRC covers everything before it. [`StructWriter`] keeps a
//! running checksum while writing and appends it in [`StructWriter::finish`];
//! [`verify_file`] validates a loaded file and hands back its body, which is
//! then decoded with a [`ByteReader`].

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{GlaiveError, Result};
use crate::util::varint::{decode_u64, encode_u64};

/// Size of the magic + version header.
pub const HEADER_LEN: usize = 8;

/// Size of the checksum trailer.
pub const TRAILER_LEN: usize = 4;

/// A structured writer for binary data with a running CRC32.
pub struct StructWriter<W: Write> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: Write> StructWriter<W> {
    /// Create a new structured writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// Create a writer and emit the file header.
    pub fn with_header(writer: W, magic: u32, version: u32) -> Result<Self> {
        let mut struct_writer = Self::new(writer);
        struct_writer.write_u32(magic)?;
        struct_writer.write_u32(version)?;
        Ok(struct_writer)
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.write_raw(&encode_u64(value))
    }

    /// Write a f32 value (little-endian).
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.write_raw(value)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.hasher.update(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Get current position (header included).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append the checksum trailer and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let checksum = self.hasher.clone().finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Validate magic, version and checksum of a whole file.
///
/// Returns the stored format version and the body between header and
/// trailer. Any version up to `current_version` is accepted.
pub fn verify_file<'a>(
    file_name: &str,
    data: &'a [u8],
    magic: u32,
    current_version: u32,
) -> Result<(u32, &'a [u8])> {
    if data.len() < HEADER_LEN + TRAILER_LEN {
        return Err(GlaiveError::corrupt(file_name, "file too short"));
    }

    let (content, trailer) = data.split_at(data.len() - TRAILER_LEN);
    let stored = LittleEndian::read_u32(trailer);
    if crc32fast::hash(content) != stored {
        return Err(GlaiveError::corrupt(file_name, "checksum mismatch"));
    }

    let found_magic = LittleEndian::read_u32(&content[0..4]);
    if found_magic != magic {
        return Err(GlaiveError::corrupt(
            file_name,
            format!("bad magic {found_magic:#010x}"),
        ));
    }

    let version = LittleEndian::read_u32(&content[4..8]);
    if version == 0 || version > current_version {
        return Err(GlaiveError::corrupt(
            file_name,
            format!("unsupported format version {version}"),
        ));
    }

    Ok((version, &content[HEADER_LEN..]))
}

/// A cursor over a borrowed byte slice.
///
/// Reads past the end report a corrupt file rather than panicking.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    /// Create a reader at `position`.
    pub fn at(data: &'a [u8], position: usize) -> Self {
        ByteReader { data, position }
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| GlaiveError::serialization("unexpected end of data"))?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Read a f32 value (little-endian).
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = decode_u64(&self.data[self.position.min(self.data.len())..])?;
        self.position += consumed;
        Ok(value)
    }

    /// Read bytes with length prefix.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let length = self.read_varint()? as usize;
        self.take(length)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map_err(|e| GlaiveError::serialization(format!("Invalid UTF-8: {e}")))
    }

    /// Read exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<&'a [u8]> {
        self.take(length)
    }

    /// Current offset into the slice.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Check if all data was consumed.
    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x4754_4553;

    fn sample_file() -> Vec<u8> {
        let mut writer = StructWriter::with_header(Vec::new(), MAGIC, 1).unwrap();
        writer.write_u8(42).unwrap();
        writer.write_u32(0x1234_5678).unwrap();
        writer.write_u64(u64::MAX - 1).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_f32(1.5).unwrap();
        writer.write_string("glaive").unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_write_then_read_body() {
        let data = sample_file();
        let (version, body) = verify_file("sample", &data, MAGIC, 1).unwrap();
        assert_eq!(version, 1);

        let mut reader = ByteReader::new(body);
        assert_eq!(reader.read_u8().unwrap(), 42);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_string().unwrap(), "glaive");
        assert!(reader.is_eof());
    }

    #[test]
    fn test_checksum_covers_every_byte() {
        let mut data = sample_file();
        data[HEADER_LEN + 2] ^= 0xFF;

        let err = verify_file("sample", &data, MAGIC, 1).unwrap_err();
        assert!(err.is_corrupt_segment());
    }

    #[test]
    fn test_wrong_magic_and_future_version() {
        let data = sample_file();
        assert!(verify_file("sample", &data, MAGIC + 1, 1).is_err());

        let writer = StructWriter::with_header(Vec::new(), MAGIC, 3).unwrap();
        let future = writer.finish().unwrap();
        let err = verify_file("future", &future, MAGIC, 2).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 3"));
    }

    #[test]
    fn test_truncated_read_is_an_error() {
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(reader.read_u32().is_err());
        assert!(ByteReader::new(&[0x80]).read_varint().is_err());
    }
}
