//! 块缓存层: 在内存中缓存磁盘块的数据, 避免频繁读写磁盘
//!
//! 每一次 read_block / write_block 都要经过设备, 开销很大.
//! 因此卷层在访问设备之前先查询 [`BlockCacheManager`], 命中就直接从内存拷贝.
//!
//! 缓存是直写 (write-through) 的: 写请求总是先落到设备上, 再同步到缓存,
//! 所以缓存中的块永远和设备上的内容一致, 替换时也无需写回.
//!
//! 缓存本身不知道字节地址, 只认 (磁盘号, 块号).
//!
//! 替换算法是一种近似的 LFU:
//! 每个缓存项带一个访问计数 access_count, 读命中和 update 各加 1, 新插入时重置为 1.
//! 缓存满时线性扫描所有项, 换出计数最小的那一个 (计数相同取下标最小的).
//! 容量最多 4096 项, O(n) 的扫描完全可以接受, 不需要额外的排序结构.

use std::fmt::{Display, Formatter};

use log::{debug, trace};

use super::{
    Block, JbodError, Result, MAX_BLOCKS_PER_DISK, MAX_CACHE_ENTRIES, MAX_DISKS, MIN_CACHE_ENTRIES,
};

/// Cached block inside memory
#[derive(Clone, Default)]
struct CacheEntry {
    /// valid 为 false 时 disk_id / block_id / data 都没有意义
    valid: bool,
    disk_id: usize,
    block_id: usize,
    data: Block,
    /// 访问计数, 只用于替换时排序
    access_count: usize,
}

impl CacheEntry {
    fn holds(&self, disk_id: usize, block_id: usize) -> bool {
        self.valid && self.disk_id == disk_id && self.block_id == block_id
    }

    fn fill(&mut self, disk_id: usize, block_id: usize, data: &Block) {
        *self = Self {
            valid: true,
            disk_id,
            block_id,
            data: data.clone(),
            access_count: 1,
        };
    }
}

/// 固定容量的缓存项数组, 创建后不会扩容
struct BlockCache {
    entries: Vec<CacheEntry>,
}

impl BlockCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: vec![CacheEntry::default(); capacity],
        }
    }

    fn position(&self, disk_id: usize, block_id: usize) -> Option<usize> {
        self.entries.iter().position(|e| e.holds(disk_id, block_id))
    }

    /// 选出要被换出的槽位: 计数最小者, 相同时取下标最小者
    fn victim(&self) -> usize {
        // min_by_key 在相等时返回第一个, 正好满足 "下标最小"
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.access_count)
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}

/// 缓存命中统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub queries: usize,
}

impl CacheStats {
    /// 命中率, 百分比; 还没有查询时为 0
    pub fn hit_rate(&self) -> f64 {
        if self.queries == 0 {
            return 0.0;
        }
        100.0 * self.hits as f64 / self.queries as f64
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "num_hits: {}, num_queries: {}", self.hits, self.queries)?;
        write!(f, "Hit rate: {:5.1}%", self.hit_rate())
    }
}

/// 块缓存管理器
///
/// 管理缓存的生命周期 (create / destroy) 和命中统计.
/// 未创建缓存时, 除 create 以外的操作都会返回 `NotInitialized`.
#[derive(Default)]
pub struct BlockCacheManager {
    cache: Option<BlockCache>,
    stats: CacheStats,
}

impl BlockCacheManager {
    /// 一个还没有创建缓存的管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接创建一个容量为 capacity 的缓存
    #[cfg(test)]
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut manager = Self::new();
        manager.create(capacity)?;
        Ok(manager)
    }

    pub fn create(&mut self, capacity: usize) -> Result<()> {
        if self.cache.is_some() {
            return Err(JbodError::AlreadyExists);
        }
        if !(MIN_CACHE_ENTRIES..=MAX_CACHE_ENTRIES).contains(&capacity) {
            return Err(JbodError::InvalidArgument("cache capacity must be in 2..=4096"));
        }
        debug!("creating block cache with {} entries", capacity);
        self.cache = Some(BlockCache::new(capacity));
        Ok(())
    }

    /// 释放所有缓存项并清零统计
    pub fn destroy(&mut self) -> Result<()> {
        if self.cache.take().is_none() {
            return Err(JbodError::NotInitialized);
        }
        debug!("destroying block cache, {}", self.stats);
        self.stats = CacheStats::default();
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.as_ref().map_or(false, |c| !c.entries.is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn cache(&self) -> Result<&BlockCache> {
        self.cache.as_ref().ok_or(JbodError::NotInitialized)
    }

    fn cache_mut(&mut self) -> Result<&mut BlockCache> {
        self.cache.as_mut().ok_or(JbodError::NotInitialized)
    }

    /// 查询 (disk_id, block_id), 命中时返回块的副本
    ///
    /// 无论是否命中都计一次查询.
    pub fn lookup(&mut self, disk_id: usize, block_id: usize) -> Result<Option<Block>> {
        let cache = self.cache.as_mut().ok_or(JbodError::NotInitialized)?;
        self.stats.queries += 1;
        match cache.entries.iter_mut().find(|e| e.holds(disk_id, block_id)) {
            Some(entry) => {
                entry.access_count += 1;
                self.stats.hits += 1;
                trace!("block cache hit ({}, {})", disk_id, block_id);
                Ok(Some(entry.data.clone()))
            }
            None => {
                trace!("block cache miss ({}, {})", disk_id, block_id);
                Ok(None)
            }
        }
    }

    /// 只看在不在, 不影响计数和统计
    pub fn contains(&self, disk_id: usize, block_id: usize) -> bool {
        self.cache()
            .map_or(false, |c| c.position(disk_id, block_id).is_some())
    }

    /// 插入一个新块
    ///
    /// 已经缓存的块不会被覆盖, 返回 `AlreadyCached`; 要改内容请用 [`Self::update`].
    pub fn insert(&mut self, disk_id: usize, block_id: usize, data: &Block) -> Result<()> {
        let cache = self.cache_mut()?;
        if disk_id >= MAX_DISKS || block_id >= MAX_BLOCKS_PER_DISK {
            return Err(JbodError::InvalidArgument("block address out of device range"));
        }
        if cache.position(disk_id, block_id).is_some() {
            return Err(JbodError::AlreadyCached {
                disk: disk_id,
                block: block_id,
            });
        }
        let slot = match cache.entries.iter().position(|e| !e.valid) {
            Some(free) => free,
            None => {
                let victim = cache.victim();
                let old = &cache.entries[victim];
                debug!(
                    "evicting ({}, {}) from slot {} with access count {}",
                    old.disk_id, old.block_id, victim, old.access_count
                );
                victim
            }
        };
        cache.entries[slot].fill(disk_id, block_id, data);
        Ok(())
    }

    /// 用设备上刚写入的内容覆盖已缓存的块
    pub fn update(&mut self, disk_id: usize, block_id: usize, data: &Block) -> Result<()> {
        let cache = self.cache_mut()?;
        let idx = cache
            .position(disk_id, block_id)
            .ok_or(JbodError::NotCached {
                disk: disk_id,
                block: block_id,
            })?;
        let entry = &mut cache.entries[idx];
        entry.data = data.clone();
        entry.access_count += 1;
        Ok(())
    }

    #[cfg(test)]
    fn access_counts(&self) -> Vec<usize> {
        self.cache()
            .map(|c| c.entries.iter().map(|e| e.access_count).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn keys(&self) -> Vec<(usize, usize)> {
        self.cache()
            .map(|c| {
                c.entries
                    .iter()
                    .filter(|e| e.valid)
                    .map(|e| (e.disk_id, e.block_id))
                    .collect()
            })
            .unwrap_or_default()
    }
}
