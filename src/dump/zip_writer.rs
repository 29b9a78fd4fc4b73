use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike};
use tracing::trace;
use zip::write::FileOptions;
use zip::CompressionMethod;

use super::format::FormatWriter;
use super::reader::classify_read_error;
use super::ArchiveEntry;
use crate::error::{Error, Result};
use crate::types::EntryKind;

/// entries of this size and larger need zip64 extra fields
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// fixed part of a local file header, and the zip64 extra field
const LOCAL_HEADER_LEN: u64 = 30;
const ZIP64_EXTRA_LEN: u64 = 20;

/// compression applied to regular file entries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZipCompression {
    #[default]
    Stored,
    Deflated,
    Zstd,
}

impl From<ZipCompression> for CompressionMethod {
    fn from(c: ZipCompression) -> Self {
        match c {
            ZipCompression::Stored => CompressionMethod::Stored,
            ZipCompression::Deflated => CompressionMethod::Deflated,
            ZipCompression::Zstd => CompressionMethod::Zstd,
        }
    }
}

/// sink wrapper counting the bytes accepted since it was last repositioned
///
/// before a new entry zip rewrites the previous local header (seek, patch,
/// seek back to the end), so once an entry fails the count holds how much
/// of that entry reached the sink.
struct Appended<W> {
    inner: W,
    count: Arc<AtomicU64>,
}

impl<W: Write> Write for Appended<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for Appended<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if pos != SeekFrom::Current(0) {
            self.count.store(0, Ordering::Relaxed);
        }
        self.inner.seek(pos)
    }
}

/// zip archive writer
///
/// zip puts its central directory at the end and patches local headers,
/// so the sink has to be seekable.
pub struct ZipWriter<W: Write + Seek> {
    inner: Option<zip::ZipWriter<Appended<W>>>,
    appended: Arc<AtomicU64>,
    compression: ZipCompression,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_compression(sink, ZipCompression::default())
    }

    pub fn with_compression(sink: W, compression: ZipCompression) -> Self {
        let appended = Arc::new(AtomicU64::new(0));
        let sink = Appended {
            inner: sink,
            count: Arc::clone(&appended),
        };
        Self {
            inner: Some(zip::ZipWriter::new(sink)),
            appended,
            compression,
        }
    }

    // unix_permissions keeps only the 0o777 bits; setuid, setgid and
    // sticky do not survive in zip
    fn options(&self, entry: &ArchiveEntry<'_>) -> FileOptions {
        let method = if entry.kind().is_regular() {
            self.compression.into()
        } else {
            CompressionMethod::Stored
        };

        FileOptions::default()
            .compression_method(method)
            .unix_permissions(entry.mode())
            .last_modified_time(dos_time(entry.mtime()))
            .large_file(is_large(entry))
    }
}

fn is_large(entry: &ArchiveEntry<'_>) -> bool {
    entry.size() >= ZIP64_THRESHOLD
}

/// bytes of the local header written for `entry`
fn local_header_len(entry: &ArchiveEntry<'_>) -> u64 {
    let extra = if is_large(entry) { ZIP64_EXTRA_LEN } else { 0 };
    LOCAL_HEADER_LEN + entry.name().len() as u64 + extra
}

fn header_error(e: zip::result::ZipError) -> Error {
    Error::HeaderWrite {
        op: "ZipHeader",
        source: e.into(),
    }
}

impl<W: Write + Seek> FormatWriter for ZipWriter<W> {
    fn dump_node(&mut self, entry: &ArchiveEntry<'_>, content: &mut dyn Read) -> Result<()> {
        let options = self.options(entry);
        let zip = self.inner.as_mut().ok_or(Error::WriterClosed)?;
        trace!(name = entry.name(), "zip entry");

        match entry.kind() {
            EntryKind::Directory { .. } => zip
                .add_directory(entry.name(), options)
                .map_err(header_error),

            EntryKind::Symlink { target } => {
                self.appended.store(0, Ordering::Relaxed);
                zip.add_symlink(entry.name(), target.as_str(), options)
                    .map_err(|e| {
                        if self.appended.load(Ordering::Relaxed) < local_header_len(entry) {
                            return header_error(e);
                        }
                        Error::LinkWrite {
                            op: "ZipLink",
                            path: entry.path().to_string(),
                            source: e.into(),
                        }
                    })
            }

            EntryKind::Regular { .. } => {
                zip.start_file(entry.name(), options).map_err(header_error)?;
                io::copy(content, zip)
                    .map_err(|e| classify_read_error("Write", entry.path(), e))?;
                Ok(())
            }

            EntryKind::Other { .. } => Err(Error::InvalidObjectType(format!(
                "{} cannot be stored in a zip archive",
                entry.node().type_name()
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut zip = self.inner.take().ok_or(Error::WriterClosed)?;
        zip.finish().map_err(|e| Error::Finalize {
            op: "ZipClose",
            source: e.into(),
        })?;
        Ok(())
    }
}

/// unix seconds to ms-dos date/time, clamped to the representable range
fn dos_time(mtime: i64) -> zip::DateTime {
    let Some(t) = DateTime::from_timestamp(mtime, 0) else {
        return zip::DateTime::default();
    };

    if t.year() < 1980 {
        return zip::DateTime::default();
    }
    if t.year() > 2107 {
        return zip::DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).unwrap_or_default();
    }

    zip::DateTime::from_date_and_time(
        t.year() as u16,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    )
    .unwrap_or_default()
}
