use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;

/// a directory tree - collection of entries sorted by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating and sorting entries
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        // validate entry names
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        // sort by name (byte-wise)
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        // check for duplicates
        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// create an empty tree
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// validate an entry name
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// a single node in a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    /// permission bits (may include setuid/setgid/sticky)
    pub mode: u32,
    /// modification time, unix seconds
    pub mtime: i64,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: u32, mtime: i64, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            mode,
            mtime,
            uid: 0,
            gid: 0,
            kind,
        }
    }

    /// set ownership
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// declared content size (0 for everything but regular files)
    pub fn size(&self) -> u64 {
        match &self.kind {
            EntryKind::Regular { size, .. } => *size,
            _ => 0,
        }
    }
}

/// special file types that are stored but never dumped into archives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialFile {
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
}

/// kind of tree entry with associated payload reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// regular file, content split into ordered blocks
    Regular { size: u64, blocks: Vec<Hash> },

    /// symbolic link
    Symlink { target: String },

    /// directory
    Directory { tree: Hash },

    /// fifo, socket or device node
    Other { file_type: SpecialFile },
}

impl EntryKind {
    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Regular { .. } => "regular",
            EntryKind::Symlink { .. } => "symlink",
            EntryKind::Directory { .. } => "directory",
            EntryKind::Other { file_type } => match file_type {
                SpecialFile::Fifo => "fifo",
                SpecialFile::Socket => "socket",
                SpecialFile::CharDevice => "char_device",
                SpecialFile::BlockDevice => "block_device",
            },
        }
    }

    /// is this a directory entry
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory { .. })
    }

    /// is this a regular file entry
    pub fn is_regular(&self) -> bool {
        matches!(self, EntryKind::Regular { .. })
    }

    /// is this a symlink entry
    pub fn is_symlink(&self) -> bool {
        matches!(self, EntryKind::Symlink { .. })
    }

    /// anything that is not a file, directory or symlink
    pub fn is_other(&self) -> bool {
        matches!(self, EntryKind::Other { .. })
    }

    /// create a regular file entry
    pub fn regular(size: u64, blocks: Vec<Hash>) -> Self {
        Self::Regular { size, blocks }
    }

    /// create a symlink entry
    pub fn symlink(target: impl Into<String>) -> Self {
        Self::Symlink {
            target: target.into(),
        }
    }

    /// create a directory entry
    pub fn directory(tree: Hash) -> Self {
        Self::Directory { tree }
    }

    /// create a special file entry
    pub fn other(file_type: SpecialFile) -> Self {
        Self::Other { file_type }
    }
}
