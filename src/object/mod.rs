pub mod block;
pub mod snapshot;
pub mod tree;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

pub use block::{block_exists, read_block, write_block};
pub use snapshot::{read_snapshot, snapshot_path, write_snapshot};
pub use tree::{read_tree, tree_path, write_tree};

/// sharded location of an object below `base`
fn object_path(base: &Path, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    base.join(dir).join(file)
}

/// store already-encoded object bytes under `base`
///
/// objects are immutable: if the target exists nothing is written.
/// otherwise: temp file -> fsync -> rename -> fsync parent.
fn store_object(repo: &Repo, base: &Path, hash: &Hash, bytes: &[u8]) -> Result<()> {
    let path = object_path(base, hash);

    // dedup: if object already exists, we're done
    if path.exists() {
        return Ok(());
    }

    let dir = path.parent().unwrap_or(base);
    fs::create_dir_all(dir).with_path(dir)?;

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(bytes).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &path).with_path(&path)?;

    let dir_file = File::open(dir).with_path(dir)?;
    dir_file.sync_all().with_path(dir)?;

    Ok(())
}

/// read raw object bytes, mapping a missing file to `ObjectNotFound`
fn load_object(base: &Path, hash: &Hash) -> Result<Vec<u8>> {
    let path = object_path(base, hash);
    fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path, source: e }
        }
    })
}

fn compress(repo: &Repo, data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, repo.config().compression_level).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })
}

fn decompress(path: PathBuf, data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| Error::Io { path, source: e })
}
