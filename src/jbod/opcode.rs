//! JBOD 操作码的打包与解包
//!
//! 一个操作码是 32 位整数:
//!
//! ```text
//!  31        18 17        10 9       6 5         0
//! +------------+------------+---------+-----------+
//! |  reserved  |  block id  | disk id |  command  |
//! +------------+------------+---------+-----------+
//! ```
//!
//! 只有设备适配层需要关心这个格式, 其余代码都使用结构化的 [`Operation`]

pub const COMMAND_BITS: u32 = 6;
pub const DISK_ID_BITS: u32 = 4;
pub const BLOCK_ID_BITS: u32 = 8;

const DISK_ID_SHIFT: u32 = COMMAND_BITS;
const BLOCK_ID_SHIFT: u32 = COMMAND_BITS + DISK_ID_BITS;

const COMMAND_MASK: u32 = (1 << COMMAND_BITS) - 1;
const DISK_ID_MASK: u32 = (1 << DISK_ID_BITS) - 1;
const BLOCK_ID_MASK: u32 = (1 << BLOCK_ID_BITS) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum BlockCommand {
    Mount = 0,
    Unmount = 1,
    SeekToDisk = 2,
    SeekToBlock = 3,
    ReadBlock = 4,
    WriteBlock = 5,
    WritePermission = 6,
    RevokeWritePermission = 7,
}

impl BlockCommand {
    pub fn from_code(code: u32) -> Option<Self> {
        use BlockCommand::*;
        Some(match code {
            0 => Mount,
            1 => Unmount,
            2 => SeekToDisk,
            3 => SeekToBlock,
            4 => ReadBlock,
            5 => WriteBlock,
            6 => WritePermission,
            7 => RevokeWritePermission,
            _ => return None,
        })
    }

    /// 该命令是否需要一个块大小的缓冲区
    pub fn transfers_block(&self) -> bool {
        matches!(self, Self::ReadBlock | Self::WriteBlock)
    }
}

/// 一次设备操作: 命令 + 目标磁盘 + 目标块
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operation {
    pub command: BlockCommand,
    pub disk_id: usize,
    pub block_id: usize,
}

impl Operation {
    pub fn new(command: BlockCommand, disk_id: usize, block_id: usize) -> Self {
        Self {
            command,
            disk_id,
            block_id,
        }
    }

    /// 不针对具体块的控制命令 (mount, unmount, 写权限)
    pub fn control(command: BlockCommand) -> Self {
        Self::new(command, 0, 0)
    }

    /// 打包为操作码; 磁盘号或块号超出字段宽度时返回 None
    pub fn encode(&self) -> Option<u32> {
        let disk_id = u32::try_from(self.disk_id).ok()?;
        let block_id = u32::try_from(self.block_id).ok()?;
        if disk_id > DISK_ID_MASK || block_id > BLOCK_ID_MASK {
            return None;
        }
        Some(
            (self.command as u32 & COMMAND_MASK)
                | (disk_id << DISK_ID_SHIFT)
                | (block_id << BLOCK_ID_SHIFT),
        )
    }

    /// 从操作码解包; 命令未知时返回 None
    pub fn decode(op: u32) -> Option<Self> {
        let command = BlockCommand::from_code(op & COMMAND_MASK)?;
        Some(Self {
            command,
            disk_id: ((op >> DISK_ID_SHIFT) & DISK_ID_MASK) as usize,
            block_id: ((op >> BLOCK_ID_SHIFT) & BLOCK_ID_MASK) as usize,
        })
    }
}
