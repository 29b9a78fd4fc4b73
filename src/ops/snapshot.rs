use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{write_block, write_snapshot, write_tree};
use crate::refs::{read_ref, write_ref};
use crate::repo::Repo;
use crate::types::{EntryKind, Snapshot, SpecialFile, Tree, TreeEntry};

/// snapshot a directory and point `ref_name` at it
///
/// files are split into `block_size` blocks; identical blocks are stored
/// once. the previous value of the ref, if any, becomes the parent.
pub fn snapshot(repo: &Repo, source: &Path, ref_name: &str, message: &str) -> Result<Hash> {
    let meta = fs::metadata(source).with_path(source)?;
    if !meta.is_dir() {
        return Err(Error::InvalidObjectType(format!(
            "{} is not a directory",
            source.display()
        )));
    }

    let mut buf = vec![0u8; repo.config().block_size.max(1)];
    let tree = snapshot_dir(repo, source, &mut buf)?;

    let parents = match read_ref(repo, ref_name) {
        Ok(parent) => vec![parent],
        Err(Error::RefNotFound(_)) => vec![],
        Err(e) => return Err(e),
    };

    let snapshot = Snapshot::new(tree, parents, message).with_origin(
        hostname(),
        source.to_string_lossy().into_owned(),
    );
    let id = write_snapshot(repo, &snapshot)?;
    write_ref(repo, ref_name, &id)?;

    info!(snapshot = %id.short(), ref_name, source = %source.display(), "snapshot written");
    Ok(id)
}

fn snapshot_dir(repo: &Repo, dir: &Path, buf: &mut [u8]) -> Result<Hash> {
    let mut dir_entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    dir_entries.sort_by_key(|e| e.file_name());

    let mut entries = Vec::with_capacity(dir_entries.len());
    for entry in dir_entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = fs::symlink_metadata(&path).with_path(&path)?;
        let file_type = meta.file_type();

        let kind = if file_type.is_dir() {
            EntryKind::directory(snapshot_dir(repo, &path, buf)?)
        } else if file_type.is_symlink() {
            let target = fs::read_link(&path).with_path(&path)?;
            EntryKind::symlink(target.to_string_lossy().into_owned())
        } else if file_type.is_file() {
            let (size, blocks) = store_file(repo, &path, buf)?;
            EntryKind::regular(size, blocks)
        } else {
            let special = if file_type.is_fifo() {
                SpecialFile::Fifo
            } else if file_type.is_socket() {
                SpecialFile::Socket
            } else if file_type.is_char_device() {
                SpecialFile::CharDevice
            } else {
                SpecialFile::BlockDevice
            };
            EntryKind::other(special)
        };

        debug!(path = %path.display(), kind = kind.type_name(), "snapshot entry");
        entries.push(
            TreeEntry::new(name, meta.mode() & 0o7777, meta.mtime(), kind)
                .with_owner(meta.uid(), meta.gid()),
        );
    }

    write_tree(repo, &Tree::new(entries)?)
}

/// store a file as a sequence of blocks, returning its size and block ids
fn store_file(repo: &Repo, path: &Path, buf: &mut [u8]) -> Result<(u64, Vec<Hash>)> {
    let mut file = File::open(path).with_path(path)?;
    let mut blocks = Vec::new();
    let mut size = 0u64;

    loop {
        let n = fill(&mut file, buf).with_path(path)?;
        if n == 0 {
            break;
        }
        blocks.push(write_block(repo, &buf[..n])?);
        size += n as u64;
        if n < buf.len() {
            break;
        }
    }

    Ok((size, blocks))
}

/// read until `buf` is full or the reader is exhausted
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::object::{read_block, read_snapshot, read_tree};
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn test_repo(block_size: usize) -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let config = Config {
            block_size,
            ..Config::default()
        };
        let repo = Repo::init_with_config(&dir.path().join("repo"), config).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_snapshot_layout() {
        let (dir, repo) = test_repo(4);
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("etc")).unwrap();
        fs::write(source.join("etc/hosts"), b"127.0.0.1 localhost").unwrap();
        fs::write(source.join("empty"), b"").unwrap();
        symlink("etc/hosts", source.join("hosts")).unwrap();

        let id = snapshot(&repo, &source, "daily", "first").unwrap();
        assert_eq!(read_ref(&repo, "daily").unwrap(), id);

        let snap = read_snapshot(&repo, &id).unwrap();
        assert!(snap.is_root());
        assert_eq!(snap.message, "first");
        assert_eq!(
            snap.hostname,
            nix::unistd::gethostname().unwrap().to_string_lossy()
        );

        let root = read_tree(&repo, &snap.tree).unwrap();
        let names: Vec<_> = root.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["empty", "etc", "hosts"]);

        assert_eq!(root.get("empty").unwrap().kind, EntryKind::regular(0, vec![]));
        assert_eq!(root.get("hosts").unwrap().kind, EntryKind::symlink("etc/hosts"));

        let EntryKind::Directory { tree } = root.get("etc").unwrap().kind else {
            panic!("etc is not a directory");
        };
        let etc = read_tree(&repo, &tree).unwrap();
        let EntryKind::Regular { size, blocks } = &etc.get("hosts").unwrap().kind else {
            panic!("hosts is not a file");
        };
        assert_eq!(*size, 19);
        assert_eq!(blocks.len(), 5);

        let content: Vec<u8> = blocks
            .iter()
            .flat_map(|b| read_block(&repo, b).unwrap())
            .collect();
        assert_eq!(content, b"127.0.0.1 localhost");
    }

    #[test]
    fn test_identical_blocks_stored_once() {
        let (dir, repo) = test_repo(8);
        let source = dir.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a"), b"samesamesamesame").unwrap();
        fs::write(source.join("b"), b"samesame").unwrap();

        let id = snapshot(&repo, &source, "dedup", "").unwrap();
        let root = read_tree(&repo, &read_snapshot(&repo, &id).unwrap().tree).unwrap();

        let blocks = |name: &str| match &root.get(name).unwrap().kind {
            EntryKind::Regular { blocks, .. } => blocks.clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(blocks("a"), vec![Hash::of(b"samesame"); 2]);
        assert_eq!(blocks("b"), vec![Hash::of(b"samesame")]);
    }

    #[test]
    fn test_second_snapshot_has_parent() {
        let (dir, repo) = test_repo(1024);
        let source = dir.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("f"), b"v1").unwrap();

        let first = snapshot(&repo, &source, "main", "v1").unwrap();
        fs::write(source.join("f"), b"v2").unwrap();
        let second = snapshot(&repo, &source, "main", "v2").unwrap();

        assert_eq!(read_snapshot(&repo, &second).unwrap().parents, vec![first]);
    }

    #[test]
    fn test_snapshot_of_file_fails() {
        let (dir, repo) = test_repo(1024);
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let result = snapshot(&repo, &file, "main", "");
        assert!(matches!(result, Err(Error::InvalidObjectType(_))));
    }

    #[test]
    fn test_fill_short_reads() {
        struct Dribble<'a>(&'a [u8]);
        impl Read for Dribble<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = self.0.len().min(buf.len()).min(2);
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                Ok(n)
            }
        }

        let mut buf = [0u8; 5];
        let mut reader = Dribble(b"abcdefg");
        assert_eq!(fill(&mut reader, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(fill(&mut reader, &mut buf).unwrap(), 2);
    }
}
