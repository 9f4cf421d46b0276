//! 卷层: 对外暴露字节粒度的 read / write
//!
//! 一次请求先经过地址翻译切成若干块内片段, 再逐段处理:
//!
//! - 读: 先查缓存, 未命中则从设备读出整块, 拷贝需要的部分, 并把整块放进缓存
//! - 写: 总是 读-改-写 整块 (写的范围可能只覆盖块的一部分), 写完后同步缓存
//!
//! 缓存层的错误不会中断请求, 只会退化为直接访问设备;
//! 设备错误和前置条件错误会立即中断整个请求, 已经写下去的片段不会回滚.

use std::sync::Arc;

use log::{debug, error, warn};
use spin::Mutex;

use super::{
    translate, Block, BlockCacheManager, BlockCommand, BlockDevice, CacheStats, Geometry,
    JbodError, Result, Session,
};

pub struct JbodVolume {
    geometry: Geometry,
    device: Arc<dyn BlockDevice>,
    /// 整个请求期间都持有这把锁, 缓存和设备访问因此是串行的
    cache: Mutex<BlockCacheManager>,
    session: Mutex<Session>,
}

impl JbodVolume {
    /// 在设备上创建一个卷, 初始未 mount, 没有缓存
    pub fn new(device: Arc<dyn BlockDevice>, geometry: Geometry) -> Self {
        Self {
            geometry,
            device,
            cache: Mutex::new(BlockCacheManager::new()),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    // 会话状态的变化先交给设备执行, 成功后再更新本地标志

    pub fn mount(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_mounted() {
            return Err(JbodError::AlreadyMounted);
        }
        self.device.control(BlockCommand::Mount)?;
        session.mount()
    }

    pub fn unmount(&self) -> Result<()> {
        let mut session = self.session.lock();
        session.check_mounted()?;
        self.device.control(BlockCommand::Unmount)?;
        session.unmount()
    }

    pub fn grant_write(&self) -> Result<()> {
        let mut session = self.session.lock();
        session.check_mounted()?;
        self.device.control(BlockCommand::WritePermission)?;
        session.grant_write()
    }

    pub fn revoke_write(&self) -> Result<()> {
        let mut session = self.session.lock();
        session.check_mounted()?;
        self.device.control(BlockCommand::RevokeWritePermission)?;
        session.revoke_write()
    }

    pub fn is_mounted(&self) -> bool {
        self.session.lock().is_mounted()
    }

    pub fn is_writable(&self) -> bool {
        self.session.lock().is_writable()
    }

    pub fn create_cache(&self, capacity: usize) -> Result<()> {
        self.cache.lock().create(capacity)
    }

    pub fn destroy_cache(&self) -> Result<()> {
        self.cache.lock().destroy()
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.lock().is_enabled()
    }

    /// 缓存项数, 没有缓存时为 0
    pub fn cache_capacity(&self) -> usize {
        self.cache.lock().capacity()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// 从地址 addr 开始读 buf.len() 个字节到 buf 中, 返回读到的字节数
    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<usize> {
        self.session.lock().check_mounted()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let segments = translate(&self.geometry, addr, buf.len())?;

        let mut cache = self.cache.lock();
        let mut read_size = 0usize;
        for seg in segments {
            let dst = &mut buf[read_size..read_size + seg.length];

            let cached = if cache.is_enabled() {
                cache.lookup(seg.disk_id, seg.block_id).unwrap_or(None)
            } else {
                None
            };

            match cached {
                Some(block) => block.read_into(seg.offset, dst),
                None => {
                    let mut block = Block::zeroed();
                    self.device
                        .read_block(seg.disk_id, seg.block_id, &mut block)
                        .map_err(|err| {
                            error!("read of ({}, {}) failed: {}", seg.disk_id, seg.block_id, err);
                            err
                        })?;
                    block.read_into(seg.offset, dst);
                    if cache.is_enabled() {
                        match cache.insert(seg.disk_id, seg.block_id, &block) {
                            Ok(()) | Err(JbodError::AlreadyCached { .. }) => {}
                            Err(err) => warn!("cannot cache ({}, {}): {}", seg.disk_id, seg.block_id, err),
                        }
                    }
                }
            }
            read_size += seg.length;
        }
        Ok(read_size)
    }

    /// 把 data 写到从 addr 开始的地址上, 返回写入的字节数
    pub fn write(&self, addr: u32, data: &[u8]) -> Result<usize> {
        self.session.lock().check_writable()?;
        if data.is_empty() {
            return Ok(0);
        }
        let segments = translate(&self.geometry, addr, data.len())?;

        let mut cache = self.cache.lock();
        let mut write_size = 0usize;
        for seg in segments {
            let src = &data[write_size..write_size + seg.length];

            // 读-改-写: 先读出整块, 覆盖需要写的那一段, 再整块写回
            let mut block = Block::zeroed();
            self.device
                .read_block(seg.disk_id, seg.block_id, &mut block)
                .map_err(|err| {
                    error!("read of ({}, {}) before write failed: {}", seg.disk_id, seg.block_id, err);
                    err
                })?;
            block.overlay(seg.offset, src);
            self.device
                .write_block(seg.disk_id, seg.block_id, &block)
                .map_err(|err| {
                    error!("write of ({}, {}) failed: {}", seg.disk_id, seg.block_id, err);
                    err
                })?;

            // 缓存中不能留下刚被写过的块的旧内容
            if cache.is_enabled() {
                let synced = if cache.contains(seg.disk_id, seg.block_id) {
                    cache.update(seg.disk_id, seg.block_id, &block)
                } else {
                    cache.insert(seg.disk_id, seg.block_id, &block)
                };
                if let Err(err) = synced {
                    warn!("cannot cache ({}, {}): {}", seg.disk_id, seg.block_id, err);
                }
            }
            write_size += seg.length;
        }
        debug!("wrote {} bytes at {:#x}", write_size, addr);
        Ok(write_size)
    }
}
