use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{read_block, read_tree};
use crate::types::Tree;

/// read access to content blocks and trees
///
/// this is everything a dump needs from the storage layer. implementations
/// are expected to be synchronous and idempotent; retries, if any, happen
/// behind this interface.
pub trait Repository {
    /// load the decoded bytes of one content block
    fn load_block(&self, id: &Hash) -> Result<Vec<u8>>;

    /// load and decode a tree object
    fn load_tree(&self, id: &Hash) -> Result<Tree>;
}

/// a local zub-dump repository
pub struct Repo {
    path: PathBuf,
    config: Config,
}

impl Repo {
    /// initialize a new repository at the given path
    pub fn init(path: &Path) -> Result<Self> {
        Self::init_with_config(path, Config::default())
    }

    /// initialize a new repository with explicit settings
    pub fn init_with_config(path: &Path, config: Config) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        // create directory structure
        std::fs::create_dir_all(path.join("objects/blocks")).with_path(path)?;
        std::fs::create_dir_all(path.join("objects/trees")).with_path(path)?;
        std::fs::create_dir_all(path.join("objects/snapshots")).with_path(path)?;
        std::fs::create_dir_all(path.join("refs")).with_path(path)?;
        std::fs::create_dir_all(path.join("tmp")).with_path(path)?;

        config.save(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// repository root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    /// path to objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    /// path to content blocks directory
    pub fn blocks_path(&self) -> PathBuf {
        self.objects_path().join("blocks")
    }

    /// path to trees directory
    pub fn trees_path(&self) -> PathBuf {
        self.objects_path().join("trees")
    }

    /// path to snapshots directory
    pub fn snapshots_path(&self) -> PathBuf {
        self.objects_path().join("snapshots")
    }

    /// path to refs directory
    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }
}

impl Repository for Repo {
    fn load_block(&self, id: &Hash) -> Result<Vec<u8>> {
        read_block(self, id)
    }

    fn load_tree(&self, id: &Hash) -> Result<Tree> {
        read_tree(self, id)
    }
}
