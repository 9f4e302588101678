//! v1 transfer format: a gzipped, length-prefixed record stream.
//!
//! ```text
//! Header:  u8  version = 1
//!          i64 timestamp millis (big-endian)
//! Record:  i32 field count
//!          per field: u8 flags | i16-len name (UTF-8) | i32-len value (UTF-8)
//! ```
//!
//! The stream is self-delimited at the field level, so readers skip field
//! names they do not know instead of failing. The descriptor record is
//! always emitted first; readers identify it by its sentinel field, not by
//! position.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tantivy::DocAddress;
use tracing::debug;

use repoindex_core::error::{IndexError, Result};
use repoindex_core::record::{FieldFlags, Record};
use repoindex_core::IndexingContext;

pub const DATA_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDataHeader {
    pub version: u8,
    pub timestamp: i64,
}

pub struct IndexDataWriter;

impl IndexDataWriter {
    /// Stream the committed state into `out`. With `addresses` absent,
    /// every live artifact record is written and tombstones are skipped (a
    /// full dump describes state, not history); with addresses present,
    /// exactly those documents are written — that is how chunks carry
    /// tombstones to clients.
    ///
    /// Returns the number of records written, the descriptor included.
    pub fn write(
        context: &IndexingContext,
        searcher: &tantivy::Searcher,
        addresses: Option<&[DocAddress]>,
        out: impl Write,
    ) -> Result<u64> {
        let mut gz = GzEncoder::new(out, Compression::default());

        gz.write_all(&[DATA_FORMAT_VERSION])?;
        gz.write_all(&context.timestamp().unwrap_or(0).to_be_bytes())?;

        let mut written = 1u64;
        write_record(&mut gz, &context.descriptor_record())?;

        match addresses {
            None => {
                for (_, record) in context.live_records(searcher)? {
                    if record.is_descriptor() || record.is_tombstone() {
                        continue;
                    }
                    write_record(&mut gz, &record)?;
                    written += 1;
                }
            }
            Some(addresses) => {
                for address in addresses {
                    let record = context.record_at(searcher, *address)?;
                    if record.is_descriptor() {
                        continue;
                    }
                    write_record(&mut gz, &record)?;
                    written += 1;
                }
            }
        }

        gz.finish()?;
        debug!(records = written, "wrote index data stream");
        Ok(written)
    }
}

fn write_record(out: &mut impl Write, record: &Record) -> Result<()> {
    out.write_all(&(record.len() as i32).to_be_bytes())?;
    for entry in record.entries() {
        out.write_all(&[entry.flags.to_bits()])?;
        write_utf(out, &entry.name, true)?;
        write_utf(out, &entry.value, false)?;
    }
    Ok(())
}

fn write_utf(out: &mut impl Write, value: &str, short: bool) -> Result<()> {
    let bytes = value.as_bytes();
    if short {
        let len = i16::try_from(bytes.len())
            .map_err(|_| IndexError::DataFormat(format!("field name too long: {} bytes", bytes.len())))?;
        out.write_all(&len.to_be_bytes())?;
    } else {
        let len = i32::try_from(bytes.len())
            .map_err(|_| IndexError::DataFormat(format!("field value too long: {} bytes", bytes.len())))?;
        out.write_all(&len.to_be_bytes())?;
    }
    out.write_all(bytes)?;
    Ok(())
}

pub struct IndexDataReader;

impl IndexDataReader {
    /// Read a whole stream back. Unknown field names are preserved
    /// verbatim so a round-trip loses nothing.
    pub fn read_all(input: impl Read) -> Result<(IndexDataHeader, Vec<Record>)> {
        let mut gz = GzDecoder::new(input);

        let mut version = [0u8; 1];
        gz.read_exact(&mut version)?;
        if version[0] != DATA_FORMAT_VERSION {
            return Err(IndexError::DataFormat(format!(
                "unsupported index data version {}",
                version[0]
            )));
        }
        let mut timestamp = [0u8; 8];
        gz.read_exact(&mut timestamp)?;
        let header = IndexDataHeader {
            version: version[0],
            timestamp: i64::from_be_bytes(timestamp),
        };

        let mut records = Vec::new();
        loop {
            let mut count_buf = [0u8; 4];
            match gz.read_exact(&mut count_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let count = i32::from_be_bytes(count_buf);
            if count < 0 {
                return Err(IndexError::DataFormat(format!("negative field count {}", count)));
            }

            let mut record = Record::new();
            for _ in 0..count {
                let mut flag_buf = [0u8; 1];
                gz.read_exact(&mut flag_buf)?;
                let flags = FieldFlags::from_bits(flag_buf[0]);
                let name = read_utf_short(&mut gz)?;
                let value = read_utf_long(&mut gz)?;
                record.put_entry(name, value, flags);
            }
            records.push(record);
        }

        Ok((header, records))
    }
}

fn read_utf_short(input: &mut impl Read) -> Result<String> {
    let mut len_buf = [0u8; 2];
    input.read_exact(&mut len_buf)?;
    read_utf(input, i16::from_be_bytes(len_buf) as i64)
}

fn read_utf_long(input: &mut impl Read) -> Result<String> {
    let mut len_buf = [0u8; 4];
    input.read_exact(&mut len_buf)?;
    read_utf(input, i32::from_be_bytes(len_buf) as i64)
}

fn read_utf(input: &mut impl Read, len: i64) -> Result<String> {
    if len < 0 {
        return Err(IndexError::DataFormat(format!("negative string length {}", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    input.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| IndexError::DataFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoindex_core::creator::default_creators;
    use repoindex_core::record::{FLD_LAST_MODIFIED, FLD_PACKAGING, FLD_UINFO};

    fn sample_record(uinfo: &str) -> Record {
        let mut record = Record::new();
        record.put_entry(FLD_UINFO, uinfo, FieldFlags::KEYWORD);
        record.put_entry(FLD_LAST_MODIFIED, "12345", FieldFlags::STORED);
        record.put_entry(FLD_PACKAGING, "jar", FieldFlags::KEYWORD);
        record
    }

    #[test]
    fn test_stream_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let context = IndexingContext::open_or_create(
            "roundtrip",
            dir.path().join("index"),
            default_creators(),
        )
        .unwrap();
        context.add_record(sample_record("org.ex|a|1.0|NA|jar")).unwrap();
        context.commit().unwrap();

        let searcher = context.acquire_searcher();
        let mut buf = Vec::new();
        let written = IndexDataWriter::write(&context, &searcher, None, &mut buf).unwrap();
        assert_eq!(written, 2);

        let (header, records) = IndexDataReader::read_all(&buf[..]).unwrap();
        assert_eq!(header.version, DATA_FORMAT_VERSION);
        assert_eq!(header.timestamp, context.timestamp().unwrap());
        assert!(records[0].is_descriptor());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].uinfo(), Some("org.ex|a|1.0|NA|jar"));
        assert_eq!(records[1].get(FLD_PACKAGING), Some("jar"));
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let mut record = Record::new();
        record.put_entry("some-future-field", "value", FieldFlags::TEXT);

        let mut buf = Vec::new();
        let mut gz = GzEncoder::new(&mut buf, Compression::default());
        gz.write_all(&[DATA_FORMAT_VERSION]).unwrap();
        gz.write_all(&0i64.to_be_bytes()).unwrap();
        write_record(&mut gz, &record).unwrap();
        gz.finish().unwrap();

        let (_, records) = IndexDataReader::read_all(&buf[..]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("some-future-field"), Some("value"));
        assert_eq!(records[0].entries()[0].flags, FieldFlags::TEXT);
    }

    #[test]
    fn test_bad_version_is_rejected() {
        let mut buf = Vec::new();
        let mut gz = GzEncoder::new(&mut buf, Compression::default());
        gz.write_all(&[9u8]).unwrap();
        gz.write_all(&0i64.to_be_bytes()).unwrap();
        gz.finish().unwrap();

        assert!(matches!(
            IndexDataReader::read_all(&buf[..]),
            Err(IndexError::DataFormat(_))
        ));
    }
}
