//! 地址翻译层: 字节地址 -> (磁盘号, 块号, 块内偏移)
//!
//! 整个地址空间是所有磁盘首尾相接:
//!
//! ```text
//! | disk 0: block 0 .. block n-1 | disk 1: block 0 .. block n-1 | ... |
//! ```

use super::{
    JbodError, Result, BLOCK_SIZE, DEFAULT_BLOCKS_PER_DISK, DEFAULT_NUM_DISKS, MAX_BLOCKS_PER_DISK,
    MAX_DISKS, MAX_IO_SIZE,
};

/// 磁盘阵列的几何参数, 创建之后不再改变
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    num_disks: usize,
    blocks_per_disk: usize,
}

impl Geometry {
    pub fn new(num_disks: usize, blocks_per_disk: usize) -> Result<Self> {
        if num_disks == 0 || num_disks > MAX_DISKS {
            return Err(JbodError::InvalidArgument("number of disks must be in 1..=16"));
        }
        if blocks_per_disk == 0 || blocks_per_disk > MAX_BLOCKS_PER_DISK {
            return Err(JbodError::InvalidArgument("blocks per disk must be in 1..=256"));
        }
        Ok(Self {
            num_disks,
            blocks_per_disk,
        })
    }

    pub fn num_disks(&self) -> usize {
        self.num_disks
    }

    pub fn blocks_per_disk(&self) -> usize {
        self.blocks_per_disk
    }

    /// 每块磁盘的字节数
    pub fn disk_size(&self) -> usize {
        self.blocks_per_disk * BLOCK_SIZE
    }

    /// 整个地址空间的字节数
    pub fn capacity(&self) -> usize {
        self.num_disks * self.disk_size()
    }

    pub fn total_blocks(&self) -> usize {
        self.num_disks * self.blocks_per_disk
    }

    /// 字节地址 -> (disk_id, block_id, offset)
    pub fn locate(&self, addr: usize) -> (usize, usize, usize) {
        (
            addr / self.disk_size(),
            (addr % self.disk_size()) / BLOCK_SIZE,
            addr % BLOCK_SIZE,
        )
    }

    /// (disk_id, block_id) 在磁盘镜像中的线性块号
    pub fn linear_block(&self, disk_id: usize, block_id: usize) -> usize {
        disk_id * self.blocks_per_disk + block_id
    }

    pub fn contains(&self, disk_id: usize, block_id: usize) -> bool {
        disk_id < self.num_disks && block_id < self.blocks_per_disk
    }
}

impl Default for Geometry {
    /// 16 块磁盘, 每块 256 个块, 共 1 MiB
    fn default() -> Self {
        Self {
            num_disks: DEFAULT_NUM_DISKS,
            blocks_per_disk: DEFAULT_BLOCKS_PER_DISK,
        }
    }
}

/// 请求落在某一个块内的一段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub disk_id: usize,
    pub block_id: usize,
    /// 块内起始偏移
    pub offset: usize,
    /// 块内长度, offset + length <= BLOCK_SIZE
    pub length: usize,
}

/// 把 [start, start + length) 切成按地址递增、首尾相接的块内片段
///
/// 长度为 0 或超过 [`MAX_IO_SIZE`] 时返回 `InvalidArgument`,
/// 越过地址空间末尾时返回 `OutOfRange`.
pub fn translate(geometry: &Geometry, start: u32, length: usize) -> Result<Vec<Segment>> {
    if length == 0 {
        return Err(JbodError::InvalidArgument("request length is zero"));
    }
    if length > MAX_IO_SIZE {
        return Err(JbodError::InvalidArgument("request length exceeds 1024 bytes"));
    }
    let capacity = geometry.capacity();
    match (start as usize).checked_add(length) {
        Some(end) if end <= capacity => {}
        _ => {
            return Err(JbodError::OutOfRange {
                addr: start,
                len: length,
                capacity,
            })
        }
    }

    let (mut disk_id, mut block_id, mut offset) = geometry.locate(start as usize);
    let mut remaining = length;
    let mut segments = Vec::with_capacity(length / BLOCK_SIZE + 2);
    while remaining > 0 {
        let chunk = (BLOCK_SIZE - offset).min(remaining);
        segments.push(Segment {
            disk_id,
            block_id,
            offset,
            length: chunk,
        });
        remaining -= chunk;

        // 转到下一个块, 到了磁盘末尾就换下一块磁盘
        offset = 0;
        block_id += 1;
        if block_id == geometry.blocks_per_disk() {
            block_id = 0;
            disk_id += 1;
        }
    }
    Ok(segments)
}
