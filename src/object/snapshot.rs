use std::path::PathBuf;

use super::{compress, decompress, load_object, object_path, store_object};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;
use crate::types::Snapshot;

/// write a snapshot to the object store (CBOR + zstd, hashed after compression)
pub fn write_snapshot(repo: &Repo, snapshot: &Snapshot) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(snapshot, &mut cbor_bytes)?;

    let compressed = compress(repo, &cbor_bytes)?;
    let hash = Hash::of(&compressed);

    store_object(repo, &repo.snapshots_path(), &hash, &compressed)?;
    Ok(hash)
}

/// read a snapshot from the object store
pub fn read_snapshot(repo: &Repo, hash: &Hash) -> Result<Snapshot> {
    let compressed = load_object(&repo.snapshots_path(), hash)?;

    if Hash::of(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = decompress(snapshot_path(repo, hash), &compressed)?;
    let snapshot: Snapshot = ciborium::from_reader(&cbor_bytes[..])?;

    Ok(snapshot)
}

/// get the filesystem path to a snapshot object
pub fn snapshot_path(repo: &Repo, hash: &Hash) -> PathBuf {
    object_path(&repo.snapshots_path(), hash)
}
