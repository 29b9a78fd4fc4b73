//! in-memory repository double for dump tests

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repository;
use crate::types::{EntryKind, Tree, TreeEntry};

#[derive(Default)]
pub struct MemRepo {
    blocks: HashMap<Hash, Vec<u8>>,
    trees: HashMap<Hash, Tree>,
    broken: HashSet<Hash>,
    loads: RefCell<HashMap<Hash, usize>>,
}

impl MemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, data: &[u8]) -> Hash {
        let id = Hash::of(data);
        self.blocks.insert(id, data.to_vec());
        id
    }

    /// a block id whose load always fails
    pub fn add_broken_block(&mut self, label: &[u8]) -> Hash {
        let id = Hash::of(label);
        self.broken.insert(id);
        id
    }

    pub fn add_tree(&mut self, entries: Vec<TreeEntry>) -> Hash {
        let id = Hash::of(format!("tree-{}", self.trees.len()).as_bytes());
        self.trees.insert(id, Tree::new(entries).unwrap());
        id
    }

    /// a regular file entry whose content is the concatenation of `chunks`
    pub fn file(&mut self, name: &str, chunks: &[&[u8]]) -> TreeEntry {
        let blocks: Vec<Hash> = chunks.iter().map(|c| self.add_block(c)).collect();
        let size = chunks.iter().map(|c| c.len() as u64).sum();
        TreeEntry::new(name, 0o644, 1_700_000_000, EntryKind::regular(size, blocks))
    }

    pub fn dir(&mut self, name: &str, entries: Vec<TreeEntry>) -> TreeEntry {
        let id = self.add_tree(entries);
        TreeEntry::new(name, 0o755, 1_700_000_000, EntryKind::directory(id))
    }

    pub fn block_loads(&self, id: &Hash) -> usize {
        self.loads.borrow().get(id).copied().unwrap_or(0)
    }

    pub fn total_block_loads(&self) -> usize {
        self.loads.borrow().values().sum()
    }
}

impl Repository for MemRepo {
    fn load_block(&self, id: &Hash) -> Result<Vec<u8>> {
        *self.loads.borrow_mut().entry(*id).or_default() += 1;

        if self.broken.contains(id) {
            return Err(Error::Io {
                path: PathBuf::from(format!("mem:{}", id.short())),
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "backend went away"),
            });
        }
        self.blocks
            .get(id)
            .cloned()
            .ok_or(Error::ObjectNotFound(*id))
    }

    fn load_tree(&self, id: &Hash) -> Result<Tree> {
        self.trees.get(id).cloned().ok_or(Error::ObjectNotFound(*id))
    }
}

/// in-memory archive sink that accepts `budget` bytes, then fails every write
pub struct FailingSink {
    inner: Cursor<Vec<u8>>,
    budget: usize,
}

impl FailingSink {
    pub fn new(budget: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            budget,
        }
    }

    /// a sink that refuses the very first byte
    pub fn broken() -> Self {
        Self::new(0)
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is gone"));
        }
        let n = self.inner.write(&buf[..buf.len().min(self.budget)])?;
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
