use std::io::{Seek, Write};

use tracing::info;

use crate::config::Config;
use crate::dump::{
    open_stream_writer, open_writer, ArchiveFormat, CancelToken, DumpOptions, DumpStats, Dumper,
    FormatWriter,
};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{read_snapshot, read_tree};
use crate::refs::resolve_ref;
use crate::repo::{Repo, Repository};
use crate::types::{EntryKind, Tree, TreeEntry};

/// how to dump
#[derive(Clone, Debug)]
pub struct DumpRequest {
    pub format: ArchiveFormat,
    /// absolute path archive names are made relative to
    pub root: String,
    pub cache_size: usize,
    pub cancel: CancelToken,
}

impl DumpRequest {
    pub fn new(format: ArchiveFormat) -> Self {
        let defaults = DumpOptions::default();
        Self {
            format,
            root: defaults.root,
            cache_size: defaults.cache_size,
            cancel: defaults.cancel,
        }
    }

    /// request using the repository's `[dump]` defaults
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut request = Self::new(config.dump.format.parse()?);
        request.cache_size = config.dump.cache_size;
        Ok(request)
    }

    fn options(&self) -> DumpOptions {
        DumpOptions {
            root: self.root.clone(),
            cache_size: self.cache_size,
            cancel: self.cancel.clone(),
        }
    }
}

/// what a path inside a snapshot refers to
enum Target {
    Tree(Tree, String),
    File(TreeEntry, String),
}

/// dump `path` of the snapshot `ref_name` resolves to into `dst`
///
/// a directory (or `/` for the whole snapshot) becomes an archive of its
/// contents; a single regular file is written raw. the archive writer is
/// closed exactly once, also when the walk fails, and the walk's error is
/// the one reported.
pub fn dump<W: Write + Seek>(
    repo: &Repo,
    ref_name: &str,
    path: &str,
    dst: &mut W,
    request: DumpRequest,
) -> Result<DumpStats> {
    let (snapshot_id, target) = resolve(repo, ref_name, path)?;
    let mut dumper = Dumper::new(repo, request.options());

    let stats = match target {
        Target::Tree(tree, tree_path) => {
            let writer = open_writer(request.format, &mut *dst);
            archive(&mut dumper, &tree, &tree_path, writer)?
        }
        Target::File(entry, file_path) => raw(&mut dumper, &entry, &file_path, dst)?,
    };

    log_done(&snapshot_id, path, &request, &stats);
    Ok(stats)
}

/// like [`dump`], into a sink that cannot seek (a pipe, stdout)
///
/// only containers that never patch earlier bytes can be streamed this
/// way: a directory asked for as zip is refused with `SeekRequired` before
/// anything is written. single files go out raw as with [`dump`].
pub fn dump_stream<W: Write>(
    repo: &Repo,
    ref_name: &str,
    path: &str,
    dst: &mut W,
    request: DumpRequest,
) -> Result<DumpStats> {
    let (snapshot_id, target) = resolve(repo, ref_name, path)?;
    let mut dumper = Dumper::new(repo, request.options());

    let stats = match target {
        Target::Tree(tree, tree_path) => {
            let writer = open_stream_writer(request.format, &mut *dst)?;
            archive(&mut dumper, &tree, &tree_path, writer)?
        }
        Target::File(entry, file_path) => raw(&mut dumper, &entry, &file_path, dst)?,
    };

    log_done(&snapshot_id, path, &request, &stats);
    Ok(stats)
}

fn resolve(repo: &Repo, ref_name: &str, path: &str) -> Result<(Hash, Target)> {
    let snapshot_id = resolve_ref(repo, ref_name)?;
    let snapshot = read_snapshot(repo, &snapshot_id)?;
    let root = read_tree(repo, &snapshot.tree)?;
    Ok((snapshot_id, locate(repo, root, path)?))
}

/// walk `tree` into `writer`, then close it whatever the walk did
fn archive(
    dumper: &mut Dumper<'_, Repo>,
    tree: &Tree,
    tree_path: &str,
    mut writer: Box<dyn FormatWriter + '_>,
) -> Result<DumpStats> {
    let walked = dumper.dump_tree(tree, tree_path, writer.as_mut());
    let closed = writer.close();
    let stats = walked?;
    closed?;
    Ok(stats)
}

fn raw(
    dumper: &mut Dumper<'_, Repo>,
    entry: &TreeEntry,
    path: &str,
    dst: &mut dyn Write,
) -> Result<DumpStats> {
    let bytes = dumper.write_node(entry, path, dst)?;
    Ok(DumpStats {
        files: 1,
        bytes,
        cache: dumper.cache_stats(),
        ..DumpStats::default()
    })
}

fn log_done(snapshot_id: &Hash, path: &str, request: &DumpRequest, stats: &DumpStats) {
    info!(
        snapshot = %snapshot_id.short(),
        path,
        format = %request.format,
        entries = stats.entries(),
        bytes = stats.bytes,
        "dump complete"
    );
}

/// walk `path` down from the root tree
fn locate<R: Repository + ?Sized>(repo: &R, root: Tree, path: &str) -> Result<Target> {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    let mut tree = root;
    let mut current = String::from("/");

    for (i, part) in parts.iter().enumerate() {
        let entry = tree
            .get(part)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        current = if current == "/" {
            format!("/{}", part)
        } else {
            format!("{}/{}", current, part)
        };
        let last = i + 1 == parts.len();

        match &entry.kind {
            EntryKind::Directory { tree: id } => tree = repo.load_tree(id)?,
            EntryKind::Regular { .. } if last => return Ok(Target::File(entry, current)),
            _ if last => {
                return Err(Error::InvalidObjectType(format!(
                    "{} is a {}, only directories and regular files can be dumped",
                    path,
                    entry.type_name()
                )))
            }
            _ => return Err(Error::PathNotFound(path.to_string())),
        }
    }

    Ok(Target::Tree(tree, current))
}
