use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// point a ref at a snapshot (create or update)
///
/// ref names may be hierarchical, e.g. "hosts/web01/www"
pub fn write_ref(repo: &Repo, ref_name: &str, snapshot: &Hash) -> Result<()> {
    validate_ref_name(ref_name)?;

    let path = ref_path(repo, ref_name);
    let parent = path.parent().unwrap_or(repo.refs_path().as_path()).to_path_buf();
    fs::create_dir_all(&parent).with_path(&parent)?;

    // atomic write: temp -> fsync -> rename
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        writeln!(tmp_file, "{}", snapshot.to_hex()).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;

    // fsync parent directory so the rename itself is durable
    let dir = File::open(&parent).with_path(&parent)?;
    dir.sync_all().with_path(&parent)?;

    Ok(())
}

/// read the snapshot hash a ref points at
pub fn read_ref(repo: &Repo, ref_name: &str) -> Result<Hash> {
    validate_ref_name(ref_name)?;
    let path = ref_path(repo, ref_name);

    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(ref_name.to_string())
        } else {
            Error::Io { path, source: e }
        }
    })?;

    Hash::from_hex(content.trim())
}

/// resolve a ref name or a full snapshot hash
///
/// 64 hex chars are taken as a hash, anything else is looked up as a ref.
pub fn resolve_ref(repo: &Repo, ref_or_hash: &str) -> Result<Hash> {
    if ref_or_hash.len() == 64 && ref_or_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Hash::from_hex(ref_or_hash);
    }
    read_ref(repo, ref_or_hash)
}

/// list all refs, sorted
pub fn list_refs(repo: &Repo) -> Result<Vec<String>> {
    let base = repo.refs_path();
    let mut refs = Vec::new();

    if base.exists() {
        collect_refs(&base, &base, &mut refs)?;
    }

    refs.sort();
    Ok(refs)
}

fn ref_path(repo: &Repo, ref_name: &str) -> PathBuf {
    repo.refs_path().join(ref_name)
}

fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let path = entry.with_path(dir)?.path();

        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            refs.push(rel.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::InvalidRef(format!("{}: {:?}", why, name)));

    if name.is_empty() {
        return invalid("empty ref name");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return invalid("ref name cannot start or end with '/'");
    }
    if name.contains('\0') {
        return invalid("ref name cannot contain null byte");
    }
    if name
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return invalid("ref name has an empty, '.' or '..' component");
    }

    Ok(())
}
