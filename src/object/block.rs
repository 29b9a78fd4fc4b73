use std::path::PathBuf;

use super::{compress, decompress, load_object, object_path, store_object};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// write a content block to the object store
///
/// the id is the SHA-256 of the uncompressed bytes, so identical blocks
/// from different files are stored once. the stored form is zstd.
pub fn write_block(repo: &Repo, data: &[u8]) -> Result<Hash> {
    let hash = Hash::of(data);
    if block_exists(repo, &hash) {
        return Ok(hash);
    }

    let compressed = compress(repo, data)?;
    store_object(repo, &repo.blocks_path(), &hash, &compressed)?;
    Ok(hash)
}

/// read and decode a content block, verifying its id
pub fn read_block(repo: &Repo, hash: &Hash) -> Result<Vec<u8>> {
    let compressed = load_object(&repo.blocks_path(), hash)?;
    let data = decompress(block_path(repo, hash), &compressed)?;

    if Hash::of(&data) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    Ok(data)
}

/// get the filesystem path to a block
pub fn block_path(repo: &Repo, hash: &Hash) -> PathBuf {
    object_path(&repo.blocks_path(), hash)
}

/// check if a block exists in the object store
pub fn block_exists(repo: &Repo, hash: &Hash) -> bool {
    block_path(repo, hash).exists()
}
