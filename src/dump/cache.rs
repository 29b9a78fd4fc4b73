use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::hash::Hash;
use crate::repo::Repository;

/// hit/miss counters of a block cache
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Cached {
    data: Arc<[u8]>,
    tick: u64,
}

/// bounded least-recently-used cache of content blocks
///
/// owned by a single dump, so no locking. blocks are handed out as
/// `Arc<[u8]>`; an evicted block stays alive as long as a reader holds it.
pub struct BlockCache {
    max_bytes: usize,
    used: usize,
    tick: u64,
    entries: HashMap<Hash, Cached>,
    // recency order, oldest tick first
    order: BTreeMap<u64, Hash>,
    stats: CacheStats,
}

impl BlockCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used: 0,
            tick: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// return the block with the given id, loading it on a miss
    ///
    /// a miss issues exactly one `load_block`. blocks larger than the whole
    /// capacity are returned but not kept.
    pub fn get<R: Repository + ?Sized>(&mut self, repo: &R, id: &Hash) -> Result<Arc<[u8]>> {
        self.tick += 1;
        let tick = self.tick;

        if let Some(cached) = self.entries.get_mut(id) {
            self.order.remove(&cached.tick);
            self.order.insert(tick, *id);
            cached.tick = tick;
            self.stats.hits += 1;
            return Ok(Arc::clone(&cached.data));
        }

        self.stats.misses += 1;
        let data: Arc<[u8]> = repo.load_block(id)?.into();

        if data.len() > self.max_bytes {
            debug!(block = %id.short(), size = data.len(), "block exceeds cache capacity, not cached");
            return Ok(data);
        }

        self.used += data.len();
        self.order.insert(tick, *id);
        self.entries.insert(
            *id,
            Cached {
                data: Arc::clone(&data),
                tick,
            },
        );
        self.evict();

        Ok(data)
    }

    fn evict(&mut self) {
        while self.used > self.max_bytes {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            if let Some(cached) = self.entries.remove(&oldest) {
                self.used -= cached.data.len();
                self.stats.evictions += 1;
                debug!(block = %oldest.short(), size = cached.data.len(), "evicted block");
            }
        }
    }

    /// is the block currently cached (does not touch recency)
    pub fn contains(&self, id: &Hash) -> bool {
        self.entries.contains_key(id)
    }

    /// bytes currently held
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
