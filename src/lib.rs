//! zub-dump - snapshot store with streaming archive export
//!
//! a small content-addressed store for directory snapshots, and an engine
//! that streams any directory of a snapshot out as a zip or tar archive.
//!
//! # Core concepts
//!
//! - **Block**: a piece of file content, addressed by the SHA-256 of its bytes
//!   and stored zstd compressed. identical blocks are stored once.
//! - **Tree**: a directory listing (CBOR + zstd) of files, symlinks,
//!   subdirectories and special files.
//! - **Snapshot**: a root tree plus origin, time and parent snapshots.
//! - **Ref**: a named pointer to a snapshot (hierarchical, like git branches).
//!
//! # Dumping
//!
//! [`dump::Dumper`] walks a tree parent-before-children and feeds each node
//! to a [`dump::FormatWriter`]. file content streams through a bounded
//! per-dump [`dump::BlockCache`]; nothing is buffered per file beyond one
//! block.
//!
//! # Example usage
//!
//! ```no_run
//! use std::fs::File;
//! use std::path::Path;
//! use zubdump::dump::ArchiveFormat;
//! use zubdump::ops::{self, DumpRequest};
//! use zubdump::Repo;
//!
//! let repo = Repo::init(Path::new("/path/to/repo")).unwrap();
//! ops::snapshot(&repo, Path::new("/srv/www"), "www", "nightly").unwrap();
//!
//! let mut out = File::create("www.zip").unwrap();
//! ops::dump(&repo, "www", "/", &mut out, DumpRequest::new(ArchiveFormat::Zip)).unwrap();
//! ```

mod config;
mod error;
mod hash;
mod object;
mod refs;
mod repo;

pub mod dump;
pub mod ops;
pub mod types;

pub use config::{Config, DumpConfig, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_SIZE};
pub use error::{Error, Result};
pub use hash::Hash;
pub use object::{
    block_exists, read_block, read_snapshot, read_tree, snapshot_path, tree_path, write_block,
    write_snapshot, write_tree,
};
pub use refs::{list_refs, read_ref, resolve_ref, write_ref};
pub use repo::{Repo, Repository};
pub use types::{EntryKind, Snapshot, SpecialFile, Tree, TreeEntry};
