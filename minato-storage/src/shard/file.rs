//! On-disk shard format.
//!
//! A shard starts with a fixed header and then carries zero or more
//! frames, one per [`DataBlock`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ magic "MINSHARD" (8) │ version (4) │ created │  header
//! ├──────────────────────────────────────────────┤
//! │ payload_len (4) │ record_count (4)           │
//! │ block_number (8) │ crc32 (4) │ payload       │  frame 0
//! ├──────────────────────────────────────────────┤
//! │ ...                                          │  frame 1..n
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The payload is `record_count` repetitions of
//! `key_len (4) | value_len (4) | key | value`. All integers are
//! little-endian; the checksum covers the payload only.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use minato_core::error::{Error, Result};
use minato_core::{DataBlock, Record};

pub const SHARD_MAGIC: &[u8; 8] = b"MINSHARD";
pub const SHARD_VERSION: u32 = 1;
pub const SHARD_HEADER_SIZE: usize = 20;
pub const FRAME_HEADER_SIZE: usize = 20;

/// Corrupt length guard: no legitimate frame payload comes close.
const MAX_FRAME_PAYLOAD: u32 = 256 * 1024 * 1024;

fn malformed(path: &Path, detail: impl Into<String>) -> Error {
    Error::MalformedShard {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

/// Creates (truncating) a shard file and writes its header.
pub(crate) fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);

    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    writer.write_all(SHARD_MAGIC)?;
    writer.write_u32::<LittleEndian>(SHARD_VERSION)?;
    writer.write_u64::<LittleEndian>(created)?;
    Ok(writer)
}

/// Opens a shard for reading, validates the header and leaves the
/// reader positioned at the first frame.
pub(crate) fn open_for_read(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|e| malformed(path, format!("missing shard header: {}", e)))?;
    if &magic != SHARD_MAGIC {
        return Err(malformed(path, "bad magic"));
    }

    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| malformed(path, format!("missing shard header: {}", e)))?;
    if version != SHARD_VERSION {
        return Err(malformed(path, format!("unsupported version {}", version)));
    }

    let _created = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| malformed(path, format!("missing shard header: {}", e)))?;
    Ok(reader)
}

/// Appends one block as a frame.
pub(crate) fn write_frame<W: Write>(writer: &mut W, block: &DataBlock) -> Result<()> {
    let mut payload = Vec::with_capacity(block.encoded_len());
    for record in &block.records {
        payload.write_u32::<LittleEndian>(record.key.len() as u32)?;
        payload.write_u32::<LittleEndian>(record.value.len() as u32)?;
        payload.extend_from_slice(&record.key);
        payload.extend_from_slice(&record.value);
    }

    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_u32::<LittleEndian>(block.records.len() as u32)?;
    writer.write_u64::<LittleEndian>(block.block_number)?;
    writer.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Reads the next frame. `Ok(None)` means the shard ended cleanly at a
/// frame boundary; a frame that starts but does not parse is an
/// [`Error::MalformedShard`].
pub(crate) fn read_frame<R: Read>(
    reader: &mut R,
    table: &str,
    path: &Path,
) -> Result<Option<DataBlock>> {
    let payload_len = match reader.read_u32::<LittleEndian>() {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if payload_len > MAX_FRAME_PAYLOAD {
        return Err(malformed(
            path,
            format!("frame payload of {} bytes exceeds limit", payload_len),
        ));
    }

    let record_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| malformed(path, format!("truncated frame header: {}", e)))?;
    let block_number = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| malformed(path, format!("truncated frame header: {}", e)))?;
    let checksum = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| malformed(path, format!("truncated frame header: {}", e)))?;

    let mut payload = vec![0u8; payload_len as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|e| malformed(path, format!("truncated frame payload: {}", e)))?;
    if crc32fast::hash(&payload) != checksum {
        return Err(malformed(path, "frame checksum mismatch"));
    }

    let mut block = DataBlock::new(table, block_number);
    let mut cursor = &payload[..];
    for _ in 0..record_count {
        let key_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| malformed(path, "record overruns frame payload"))?
            as usize;
        let value_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| malformed(path, "record overruns frame payload"))?
            as usize;

        let mut key = vec![0u8; key_len];
        cursor
            .read_exact(&mut key)
            .map_err(|_| malformed(path, "record overruns frame payload"))?;
        let mut value = vec![0u8; value_len];
        cursor
            .read_exact(&mut value)
            .map_err(|_| malformed(path, "record overruns frame payload"))?;
        block.push(Record::new(key, value));
    }
    if !cursor.is_empty() {
        return Err(malformed(path, "trailing bytes in frame payload"));
    }

    Ok(Some(block))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample_block(number: u64, records: usize) -> DataBlock {
        let mut block = DataBlock::new("events", number);
        for i in 0..records {
            block.push(Record::new(
                format!("key-{}-{}", number, i),
                format!("value-{}", i),
            ));
        }
        block
    }

    #[test]
    fn frame_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");

        let mut writer = create(&path).unwrap();
        let block = sample_block(3, 5);
        write_frame(&mut writer, &block).unwrap();
        writer.flush().unwrap();

        let mut reader = open_for_read(&path).unwrap();
        let read = read_frame(&mut reader, "events", &path).unwrap().unwrap();
        assert_eq!(read, block);
        assert!(read_frame(&mut reader, "events", &path).unwrap().is_none());
    }

    #[test]
    fn multiple_frames_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");

        let mut writer = create(&path).unwrap();
        for n in 0..4 {
            write_frame(&mut writer, &sample_block(n, 2)).unwrap();
        }
        writer.flush().unwrap();

        let mut reader = open_for_read(&path).unwrap();
        for n in 0..4 {
            let block = read_frame(&mut reader, "events", &path).unwrap().unwrap();
            assert_eq!(block.block_number, n);
            assert_eq!(block.len(), 2);
        }
        assert!(read_frame(&mut reader, "events", &path).unwrap().is_none());
    }

    #[test]
    fn empty_shard_yields_no_frames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");
        create(&path).unwrap().flush().unwrap();

        let mut reader = open_for_read(&path).unwrap();
        assert!(read_frame(&mut reader, "events", &path).unwrap().is_none());
    }

    #[test]
    fn bad_magic_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");
        std::fs::write(&path, b"NOTSHARDxxxxxxxxxxxxxxxx").unwrap();

        assert!(matches!(
            open_for_read(&path),
            Err(Error::MalformedShard { .. })
        ));
    }

    #[test]
    fn checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");

        let mut writer = create(&path).unwrap();
        write_frame(&mut writer, &sample_block(0, 3)).unwrap();
        writer.flush().unwrap();

        // Flip one payload byte. The payload starts right after the
        // shard header plus the frame header.
        let mut bytes = std::fs::read(&path).unwrap();
        let payload_start = SHARD_HEADER_SIZE + FRAME_HEADER_SIZE;
        bytes[payload_start + 9] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = open_for_read(&path).unwrap();
        assert!(matches!(
            read_frame(&mut reader, "events", &path),
            Err(Error::MalformedShard { .. })
        ));
    }

    #[test]
    fn truncated_frame_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events_0");

        let mut writer = create(&path).unwrap();
        write_frame(&mut writer, &sample_block(0, 3)).unwrap();
        writer.flush().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 4).unwrap();
        drop(file);

        let mut reader = open_for_read(&path).unwrap();
        assert!(matches!(
            read_frame(&mut reader, "events", &path),
            Err(Error::MalformedShard { .. })
        ));
    }
}
