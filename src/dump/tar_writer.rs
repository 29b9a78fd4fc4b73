use std::io::{self, Read, Write};

use tar::{EntryType, Header};
use tracing::trace;

use super::format::FormatWriter;
use super::reader::classify_read_error;
use super::ArchiveEntry;
use crate::error::{Error, Result};
use crate::types::EntryKind;

/// tar archive writer (GNU headers)
///
/// symlinks carry their target in the header's link name, so they have no
/// payload. names longer than the header field use GNU long-name records.
pub struct TarWriter<W: Write> {
    builder: Option<tar::Builder<W>>,
}

impl<W: Write> TarWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            builder: Some(tar::Builder::new(sink)),
        }
    }
}

fn header_for(entry: &ArchiveEntry<'_>) -> Header {
    let mut header = Header::new_gnu();
    header.set_mode(entry.mode() & 0o7777);
    header.set_uid(u64::from(entry.uid()));
    header.set_gid(u64::from(entry.gid()));
    header.set_mtime(entry.mtime().max(0) as u64);
    header.set_size(entry.size());
    header.set_entry_type(match entry.kind() {
        EntryKind::Directory { .. } => EntryType::Directory,
        EntryKind::Symlink { .. } => EntryType::Symlink,
        _ => EntryType::Regular,
    });
    header
}

/// content reader that notes whether the builder got as far as the payload
///
/// tar writes long-name records and the header before it pulls a single
/// content byte, so an untouched reader means the header was refused.
struct Payload<'r> {
    inner: &'r mut dyn Read,
    started: bool,
}

impl Read for Payload<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.started = true;
        self.inner.read(buf)
    }
}

fn header_error(source: io::Error) -> Error {
    Error::HeaderWrite {
        op: "TarHeader",
        source,
    }
}

impl<W: Write> FormatWriter for TarWriter<W> {
    fn dump_node(&mut self, entry: &ArchiveEntry<'_>, content: &mut dyn Read) -> Result<()> {
        let builder = self.builder.as_mut().ok_or(Error::WriterClosed)?;
        let mut header = header_for(entry);
        trace!(name = entry.name(), "tar entry");

        match entry.kind() {
            EntryKind::Directory { .. } => builder
                .append_data(&mut header, entry.name(), io::empty())
                .map_err(header_error),

            // the target lives in the header (or a long-link record ahead
            // of it), there is no payload
            EntryKind::Symlink { target } => builder
                .append_link(&mut header, entry.name(), target)
                .map_err(header_error),

            EntryKind::Regular { .. } => {
                let mut payload = Payload {
                    inner: content,
                    started: false,
                };
                match builder.append_data(&mut header, entry.name(), &mut payload) {
                    Ok(()) => Ok(()),
                    Err(e) if payload.started => Err(classify_read_error("Write", entry.path(), e)),
                    Err(e) => Err(header_error(e)),
                }
            }

            EntryKind::Other { .. } => Err(Error::InvalidObjectType(format!(
                "{} cannot be stored in a tar archive",
                entry.node().type_name()
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut builder = self.builder.take().ok_or(Error::WriterClosed)?;
        builder.finish().map_err(|source| Error::Finalize {
            op: "TarClose",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::testing::{FailingSink, MemRepo};
    use crate::dump::{BlockCache, BlockReader, CancelToken};
    use crate::types::TreeEntry;
    use crate::Hash;
    use std::io::Cursor;

    struct Item {
        path: String,
        kind: EntryType,
        mode: u32,
        mtime: u64,
        link: Option<String>,
        data: Vec<u8>,
    }

    fn read_entries(bytes: &[u8]) -> Vec<Item> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let mut data = Vec::new();
                e.read_to_end(&mut data).unwrap();
                let header = e.header();
                Item {
                    path: e.path().unwrap().to_string_lossy().into_owned(),
                    kind: header.entry_type(),
                    mode: header.mode().unwrap(),
                    mtime: header.mtime().unwrap(),
                    link: e
                        .link_name()
                        .unwrap()
                        .map(|l| l.to_string_lossy().into_owned()),
                    data,
                }
            })
            .collect()
    }

    fn write_one(node: &TreeEntry, name: &str, content: &mut dyn Read) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = TarWriter::new(&mut out);
        writer
            .dump_node(&ArchiveEntry::new(name, &format!("/{name}"), node), content)
            .unwrap();
        writer.close().unwrap();
        drop(writer);
        out
    }

    #[test]
    fn test_regular_file_entry() {
        let mut repo = MemRepo::new();
        let node = repo.file("data.bin", &[b"0123", b"456789"]).with_owner(1000, 100);
        let EntryKind::Regular { blocks, size } = &node.kind else {
            unreachable!()
        };
        let mut cache = BlockCache::new(1024);
        let cancel = CancelToken::new();
        let mut reader = BlockReader::new(&repo, &mut cache, blocks, *size, "/data.bin", &cancel);

        let out = write_one(&node, "data.bin", &mut reader);
        let entries = read_entries(&out);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "data.bin");
        assert_eq!(entries[0].kind, EntryType::Regular);
        assert_eq!(entries[0].mode, 0o644);
        assert_eq!(entries[0].mtime, 1_700_000_000);
        assert_eq!(entries[0].data, b"0123456789");
    }

    #[test]
    fn test_symlink_target_in_header() {
        let node = TreeEntry::new("lib", 0o777, 0, EntryKind::symlink("usr/lib"));
        let entries = read_entries(&write_one(&node, "lib", &mut io::empty()));

        assert_eq!(entries[0].kind, EntryType::Symlink);
        assert_eq!(entries[0].link.as_deref(), Some("usr/lib"));
        assert!(entries[0].data.is_empty());
    }

    #[test]
    fn test_directory_entry() {
        let node = TreeEntry::new("var", 0o1777, 0, EntryKind::directory(Hash::ZERO));
        let entries = read_entries(&write_one(&node, "var", &mut io::empty()));

        assert_eq!(entries[0].kind, EntryType::Directory);
        assert_eq!(entries[0].path.trim_end_matches('/'), "var");
        assert_eq!(entries[0].mode, 0o1777);
    }

    #[test]
    fn test_long_name() {
        let name = format!("{}/leaf", "nested".repeat(30));
        let node = TreeEntry::new("leaf", 0o600, 0, EntryKind::regular(0, vec![]));
        let entries = read_entries(&write_one(&node, &name, &mut io::empty()));

        assert_eq!(entries[0].path, name);
    }

    #[test]
    fn test_negative_mtime_clamped() {
        let node = TreeEntry::new("old", 0o644, -86_400, EntryKind::regular(0, vec![]));
        let entries = read_entries(&write_one(&node, "old", &mut io::empty()));

        assert_eq!(entries[0].mtime, 0);
    }

    #[test]
    fn test_close_twice() {
        let mut writer = TarWriter::new(Cursor::new(Vec::new()));
        writer.close().unwrap();
        assert!(matches!(writer.close(), Err(Error::WriterClosed)));
    }

    #[test]
    fn test_refused_header_is_header_write() {
        let mut repo = MemRepo::new();
        let file = repo.file("f", &[b"payload"]);
        let EntryKind::Regular { blocks, size } = &file.kind else {
            unreachable!()
        };
        let link = TreeEntry::new("l", 0o777, 0, EntryKind::symlink("f"));
        let dir = TreeEntry::new("d", 0o755, 0, EntryKind::directory(Hash::ZERO));

        let mut cache = BlockCache::new(1024);
        let cancel = CancelToken::new();
        let mut reader = BlockReader::new(&repo, &mut cache, blocks, *size, "/f", &cancel);
        let mut writer = TarWriter::new(FailingSink::broken());

        let result = writer.dump_node(&ArchiveEntry::new("f", "/f", &file), &mut reader);
        assert!(matches!(result, Err(Error::HeaderWrite { op: "TarHeader", .. })));
        assert_eq!(repo.total_block_loads(), 0);

        for (name, node) in [("l", &link), ("d", &dir)] {
            let result = writer.dump_node(&ArchiveEntry::new(name, name, node), &mut io::empty());
            assert!(
                matches!(result, Err(Error::HeaderWrite { op: "TarHeader", .. })),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_refused_long_name_is_header_write() {
        let name = format!("{}/leaf", "nested".repeat(30));
        let node = TreeEntry::new("leaf", 0o600, 0, EntryKind::regular(4, vec![]));

        // the long-name record fits, the real header does not
        let mut writer = TarWriter::new(FailingSink::new(1024));
        let entry = ArchiveEntry::new(name.as_str(), "/leaf", &node);
        let result = writer.dump_node(&entry, &mut &b"data"[..]);
        assert!(matches!(result, Err(Error::HeaderWrite { .. })));
    }

    #[test]
    fn test_refused_payload_is_content_read() {
        let node = TreeEntry::new("f", 0o644, 0, EntryKind::regular(7, vec![]));

        // one header block gets through, the content does not
        let mut writer = TarWriter::new(FailingSink::new(512));
        let result = writer.dump_node(&ArchiveEntry::new("f", "/f", &node), &mut &b"payload"[..]);

        let Err(Error::ContentRead { op, path, source }) = result else {
            panic!("expected a content failure");
        };
        assert_eq!((op, path.as_str()), ("Write", "/f"));
        assert!(matches!(
            &*source,
            Error::Io { source, .. } if source.kind() == io::ErrorKind::BrokenPipe
        ));
    }

    #[test]
    fn test_refused_trailer_is_finalize() {
        let mut writer = TarWriter::new(FailingSink::broken());
        assert!(matches!(
            writer.close(),
            Err(Error::Finalize { op: "TarClose", .. })
        ));
    }
}
