use std::path::PathBuf;

use super::{compress, decompress, load_object, object_path, store_object};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;
use crate::types::Tree;

/// write a tree to the object store
///
/// trees are serialized as CBOR, then zstd compressed.
/// the hash is computed over the compressed bytes.
pub fn write_tree(repo: &Repo, tree: &Tree) -> Result<Hash> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(tree, &mut cbor_bytes)?;

    let compressed = compress(repo, &cbor_bytes)?;
    let hash = Hash::of(&compressed);

    store_object(repo, &repo.trees_path(), &hash, &compressed)?;
    Ok(hash)
}

/// read a tree from the object store
pub fn read_tree(repo: &Repo, hash: &Hash) -> Result<Tree> {
    let compressed = load_object(&repo.trees_path(), hash)?;

    // verify hash
    if Hash::of(&compressed) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    let cbor_bytes = decompress(tree_path(repo, hash), &compressed)?;
    let tree: Tree = ciborium::from_reader(&cbor_bytes[..])?;

    Ok(tree)
}

/// get the filesystem path to a tree object
pub fn tree_path(repo: &Repo, hash: &Hash) -> PathBuf {
    object_path(&repo.trees_path(), hash)
}
