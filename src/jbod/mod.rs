//! JBOD 线性卷: 把若干块同构磁盘首尾相接, 拼成一个按字节寻址的地址空间
//!
//! 自底向上分为几层:
//!
//! - 设备接口层 [`BlockDevice`]: 一次只做一个块操作, 以 (磁盘号, 块号) 寻址
//! - 块缓存层 [`BlockCacheManager`]: 固定容量, 近似 LFU 的替换策略
//! - 地址翻译层 [`translate`]: 把 (起始地址, 长度) 切成若干个块内片段 [`Segment`]
//! - 卷层 [`JbodVolume`]: 组合以上三者, 对外提供字节粒度的 read / write

mod address;
mod block;
mod block_cache;
mod block_dev;
mod driver;
mod error;
mod opcode;
mod session;
mod volume;

/// Use a block size of 256 bytes
pub const BLOCK_SIZE: usize = 256;
/// 默认磁盘数量
pub const DEFAULT_NUM_DISKS: usize = 16;
/// 默认每块磁盘的块数
pub const DEFAULT_BLOCKS_PER_DISK: usize = 256;
/// 操作码中磁盘号只占 4 bit, 最多能寻址 16 块磁盘
pub const MAX_DISKS: usize = 1 << opcode::DISK_ID_BITS;
/// 操作码中块号只占 8 bit, 每块磁盘最多 256 个块
pub const MAX_BLOCKS_PER_DISK: usize = 1 << opcode::BLOCK_ID_BITS;
/// 单次读写请求的最大字节数, 受限于设备一次传输的上限
pub const MAX_IO_SIZE: usize = 1024;
/// 块缓存的最小容量
pub const MIN_CACHE_ENTRIES: usize = 2;
/// 块缓存的最大容量
pub const MAX_CACHE_ENTRIES: usize = 4096;

pub use address::{translate, Geometry, Segment};
pub use block::Block;
pub use block_cache::{BlockCacheManager, CacheStats};
pub use block_dev::{BlockDevice, DiskImage, JbodOperation, OpcodePort};
pub use driver::{IoCounts, JbodDriver};
pub use error::{JbodError, Result};
pub use opcode::{BlockCommand, Operation};
pub use session::Session;
pub use volume::JbodVolume;
