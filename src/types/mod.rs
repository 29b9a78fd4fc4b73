mod snapshot;
mod tree;

pub use snapshot::Snapshot;
pub use tree::{EntryKind, SpecialFile, Tree, TreeEntry};
