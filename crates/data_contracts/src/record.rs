//! Example record schema and the length-framed shard container.
//!
//! A shard starts with an 8-byte header (`FREC` + little-endian `u32` version)
//! followed by frames of `u64` little-endian payload length and the payload.
//! Each payload is a protobuf-encoded [`ExampleRecord`].

use prost::Message;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SHARD_MAGIC: &[u8; 4] = b"FREC";
pub const SHARD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a record shard (bad header)")]
    BadHeader { path: PathBuf },
    #[error("unsupported shard version {version} in {path}")]
    Version { path: PathBuf, version: u32 },
    #[error("truncated frame in {path} at byte {offset}")]
    Truncated { path: PathBuf, offset: u64 },
    #[error("protobuf decode error in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: prost::DecodeError,
    },
    #[error("record in {path} is missing field `{field}`")]
    MissingField { path: PathBuf, field: &'static str },
    #[error("label {value} in {path} does not fit in i32")]
    LabelRange { path: PathBuf, value: i64 },
}

/// One serialized training/test example: compressed image bytes plus class id.
///
/// Both fields are optional on the wire so that a record missing either one
/// is detected instead of silently defaulting.
#[derive(Clone, PartialEq, Message)]
pub struct ExampleRecord {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub image: Option<Vec<u8>>,
    #[prost(int64, optional, tag = "2")]
    pub label: Option<i64>,
}

impl ExampleRecord {
    pub fn new(image: Vec<u8>, label: i64) -> Self {
        Self {
            image: Some(image),
            label: Some(label),
        }
    }

    pub fn from_payload(payload: &[u8], path: &Path) -> Result<Self, RecordError> {
        Self::decode(payload).map_err(|source| RecordError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Split into `(image_bytes, label)`, rejecting records that do not match the schema.
    pub fn into_parts(self, path: &Path) -> Result<(Vec<u8>, i32), RecordError> {
        let image = self.image.ok_or_else(|| RecordError::MissingField {
            path: path.to_path_buf(),
            field: "image",
        })?;
        let value = self.label.ok_or_else(|| RecordError::MissingField {
            path: path.to_path_buf(),
            field: "label",
        })?;
        let label = i32::try_from(value).map_err(|_| RecordError::LabelRange {
            path: path.to_path_buf(),
            value,
        })?;
        Ok((image, label))
    }
}

/// Sequential reader over the frames of one shard.
pub struct RecordReader {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let file = File::open(path).map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut header = [0u8; 8];
        reader
            .read_exact(&mut header)
            .map_err(|_| RecordError::BadHeader {
                path: path.to_path_buf(),
            })?;
        if &header[0..4] != SHARD_MAGIC {
            return Err(RecordError::BadHeader {
                path: path.to_path_buf(),
            });
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != SHARD_VERSION {
            return Err(RecordError::Version {
                path: path.to_path_buf(),
                version,
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            offset: 8,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next raw payload, or `None` at a clean end of file.
    pub fn next_payload(&mut self) -> Result<Option<Vec<u8>>, RecordError> {
        let mut len_buf = [0u8; 8];
        let mut filled = 0usize;
        while filled < len_buf.len() {
            match self.reader.read(&mut len_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(RecordError::Io {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < len_buf.len() {
            return Err(RecordError::Truncated {
                path: self.path.clone(),
                offset: self.offset,
            });
        }
        let len = u64::from_le_bytes(len_buf);
        // the length field is untrusted; never allocate more than the file delivers
        let mut payload = Vec::new();
        let read = (&mut self.reader)
            .take(len)
            .read_to_end(&mut payload)
            .map_err(|source| RecordError::Io {
                path: self.path.clone(),
                source,
            })?;
        if read as u64 != len {
            return Err(RecordError::Truncated {
                path: self.path.clone(),
                offset: self.offset,
            });
        }
        self.offset += 8 + len;
        Ok(Some(payload))
    }

    /// Next decoded record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<ExampleRecord>, RecordError> {
        match self.next_payload()? {
            Some(payload) => ExampleRecord::from_payload(&payload, &self.path).map(Some),
            None => Ok(None),
        }
    }
}

pub struct RecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl RecordWriter {
    pub fn create(path: &Path) -> Result<Self, RecordError> {
        let io_err = |source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(SHARD_MAGIC).map_err(io_err)?;
        writer
            .write_all(&SHARD_VERSION.to_le_bytes())
            .map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            written: 0,
        })
    }

    pub fn write(&mut self, record: &ExampleRecord) -> Result<(), RecordError> {
        let payload = record.encode_to_vec();
        let io_err = |source| RecordError::Io {
            path: self.path.clone(),
            source,
        };
        self.writer
            .write_all(&(payload.len() as u64).to_le_bytes())
            .map_err(io_err)?;
        self.writer.write_all(&payload).map_err(io_err)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize, RecordError> {
        self.writer.flush().map_err(|source| RecordError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.written)
    }
}
