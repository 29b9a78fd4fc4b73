//! streaming dumps of snapshot trees into archive containers
//!
//! a [`Dumper`] walks a tree parent-before-children and hands every node to
//! a [`FormatWriter`]. file content is pulled block by block through a
//! per-dump [`BlockCache`], so blocks shared between files are fetched once
//! and no file is ever held in memory as a whole.

mod cache;
mod format;
mod reader;
mod tar_writer;
mod zip_writer;

#[cfg(test)]
pub(crate) mod testing;

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DEFAULT_CACHE_SIZE;
use crate::error::{Error, Result};
use crate::repo::Repository;
use crate::types::{EntryKind, Tree, TreeEntry};

pub use cache::{BlockCache, CacheStats};
pub use format::{open_stream_writer, open_writer, ArchiveFormat, FormatWriter};
pub use reader::BlockReader;
pub use tar_writer::TarWriter;
pub use zip_writer::{ZipCompression, ZipWriter};

use reader::classify_read_error;

/// cooperative cancellation flag shared between a dump and its caller
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// one node as it is presented to a format writer
#[derive(Debug)]
pub struct ArchiveEntry<'a> {
    name: String,
    path: &'a str,
    node: &'a TreeEntry,
}

impl<'a> ArchiveEntry<'a> {
    /// `name` is the path relative to the dump root; directories get a
    /// trailing `/` here
    pub fn new(name: impl Into<String>, path: &'a str, node: &'a TreeEntry) -> Self {
        let mut name = name.into();
        if node.kind.is_directory() && !name.ends_with('/') {
            name.push('/');
        }
        Self { name, path, node }
    }

    /// archive member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// absolute path of the node in the snapshot
    pub fn path(&self) -> &str {
        self.path
    }

    pub fn node(&self) -> &TreeEntry {
        self.node
    }

    pub fn kind(&self) -> &EntryKind {
        &self.node.kind
    }

    pub fn size(&self) -> u64 {
        self.node.size()
    }

    pub fn mode(&self) -> u32 {
        self.node.mode
    }

    pub fn mtime(&self) -> i64 {
        self.node.mtime
    }

    pub fn uid(&self) -> u32 {
        self.node.uid
    }

    pub fn gid(&self) -> u32 {
        self.node.gid
    }
}

/// make an absolute slash-separated path relative to `root`
///
/// both must be absolute. redundant separators and `.` components are
/// ignored; `..` is refused. the result is never empty and never starts
/// with `/`.
pub fn relative_path(path: &str, root: &str) -> Result<String> {
    let fail = || Error::PathResolution {
        path: path.to_string(),
        root: root.to_string(),
    };

    if !path.starts_with('/') || !root.starts_with('/') {
        return Err(fail());
    }
    let path_parts = components(path).ok_or_else(fail)?;
    let root_parts = components(root).ok_or_else(fail)?;

    if path_parts.len() <= root_parts.len() || !path_parts.starts_with(&root_parts) {
        return Err(fail());
    }

    Ok(path_parts[root_parts.len()..].join("/"))
}

fn components(path: &str) -> Option<Vec<&str>> {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(|c| (c != "..").then_some(c))
        .collect()
}

fn join_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// settings for one dump
#[derive(Clone, Debug)]
pub struct DumpOptions {
    /// absolute path archive names are made relative to
    pub root: String,
    /// block cache capacity in bytes
    pub cache_size: usize,
    pub cancel: CancelToken,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            cache_size: DEFAULT_CACHE_SIZE,
            cancel: CancelToken::new(),
        }
    }
}

/// what a dump wrote
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DumpStats {
    pub files: u64,
    pub directories: u64,
    pub symlinks: u64,
    /// special files left out of the archive
    pub skipped: u64,
    /// file content bytes written
    pub bytes: u64,
    pub cache: CacheStats,
}

impl DumpStats {
    /// number of archive entries written
    pub fn entries(&self) -> u64 {
        self.files + self.directories + self.symlinks
    }
}

struct Frame<'t> {
    tree: Cow<'t, Tree>,
    path: String,
    next: usize,
}

/// walks trees of a repository into archive writers
///
/// one dumper owns one block cache; drop it when the dump is done.
pub struct Dumper<'r, R: Repository + ?Sized> {
    repo: &'r R,
    cache: BlockCache,
    root: String,
    cancel: CancelToken,
}

impl<'r, R: Repository + ?Sized> Dumper<'r, R> {
    pub fn new(repo: &'r R, options: DumpOptions) -> Self {
        Self {
            repo,
            cache: BlockCache::new(options.cache_size),
            root: options.root,
            cancel: options.cancel,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// dump every node below `tree` into `writer`
    ///
    /// `tree_path` is the absolute path the tree's entries live at. nodes
    /// are emitted depth-first, parents before children, in tree order.
    /// the first failure ends the walk. closing the writer is up to the
    /// caller, whether or not this succeeds.
    pub fn dump_tree(
        &mut self,
        tree: &Tree,
        tree_path: &str,
        writer: &mut dyn FormatWriter,
    ) -> Result<DumpStats> {
        let mut stats = DumpStats::default();
        let mut stack = vec![Frame {
            tree: Cow::Borrowed(tree),
            path: tree_path.to_string(),
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let index = frame.next;
            if index >= frame.tree.len() {
                stack.pop();
                continue;
            }
            frame.next += 1;

            if self.cancel.is_cancelled() {
                debug!(entries = stats.entries(), "dump cancelled");
                return Err(Error::Cancelled);
            }

            let node = &frame.tree.entries()[index];
            let path = join_path(&frame.path, &node.name);
            self.dump_node(node, &path, writer, &mut stats)?;

            if let EntryKind::Directory { tree: id } = node.kind {
                let child = self.repo.load_tree(&id).map_err(|e| Error::TreeLoad {
                    op: "LoadTree",
                    path: path.clone(),
                    source: Box::new(e),
                })?;
                stack.push(Frame {
                    tree: Cow::Owned(child),
                    path,
                    next: 0,
                });
            }
        }

        stats.cache = self.cache.stats();
        info!(
            files = stats.files,
            directories = stats.directories,
            symlinks = stats.symlinks,
            skipped = stats.skipped,
            bytes = stats.bytes,
            cache_hits = stats.cache.hits,
            cache_misses = stats.cache.misses,
            "dumped {}",
            tree_path
        );
        Ok(stats)
    }

    fn dump_node(
        &mut self,
        node: &TreeEntry,
        path: &str,
        writer: &mut dyn FormatWriter,
        stats: &mut DumpStats,
    ) -> Result<()> {
        if node.kind.is_other() {
            debug!(path, kind = node.type_name(), "skipping special file");
            stats.skipped += 1;
            return Ok(());
        }

        let entry = ArchiveEntry::new(relative_path(path, &self.root)?, path, node);
        debug!(name = entry.name(), kind = node.type_name(), size = node.size(), "entry");

        match &node.kind {
            EntryKind::Regular { size, blocks } => {
                let mut reader =
                    BlockReader::new(self.repo, &mut self.cache, blocks, *size, path, &self.cancel);
                writer.dump_node(&entry, &mut reader)?;
                stats.files += 1;
                stats.bytes += size;
            }
            EntryKind::Directory { .. } => {
                writer.dump_node(&entry, &mut io::empty())?;
                stats.directories += 1;
            }
            EntryKind::Symlink { .. } => {
                writer.dump_node(&entry, &mut io::empty())?;
                stats.symlinks += 1;
            }
            EntryKind::Other { .. } => {}
        }
        Ok(())
    }

    /// stream one regular file's content to `dst` without any container
    ///
    /// returns the number of bytes written.
    pub fn write_node(&mut self, node: &TreeEntry, path: &str, dst: &mut dyn Write) -> Result<u64> {
        let EntryKind::Regular { size, blocks } = &node.kind else {
            return Err(Error::InvalidObjectType(format!(
                "{} is a {}, not a regular file",
                path,
                node.type_name()
            )));
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut reader =
            BlockReader::new(self.repo, &mut self.cache, blocks, *size, path, &self.cancel);
        let written = io::copy(&mut reader, dst).map_err(|e| classify_read_error("Write", path, e))?;

        debug!(path, bytes = written, "wrote file");
        Ok(written)
    }
}
