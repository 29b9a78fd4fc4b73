//! high-level operations on zub-dump repositories

mod dump;
mod snapshot;

pub use dump::{dump, dump_stream, DumpRequest};
pub use snapshot::snapshot;
