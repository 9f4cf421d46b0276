//! 模拟的 JBOD 驱动: 解析操作码, 在磁盘镜像上完成块读写
//!
//! 驱动自己也维护 mount 与写权限状态, 和真实设备一样:
//! 未 mount 时拒绝一切块操作, 没有写权限时拒绝写块.

use log::{trace, warn};
use spin::Mutex;

use super::{Block, BlockCommand, DiskImage, Geometry, JbodOperation, Operation};

const SUCCESS: i32 = 0;
const FAILURE: i32 = -1;

/// 驱动执行过的操作计数, 仅用于诊断
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoCounts {
    /// 收到的操作码总数, 包括失败的
    pub operations: usize,
    pub reads: usize,
    pub writes: usize,
}

#[derive(Default)]
struct DriverState {
    mounted: bool,
    writable: bool,
    /// 磁头当前所在的 (磁盘号, 块号)
    head: (usize, usize),
    counts: IoCounts,
}

pub struct JbodDriver<I> {
    image: I,
    geometry: Geometry,
    state: Mutex<DriverState>,
}

impl<I: DiskImage> JbodDriver<I> {
    /// 镜像至少要有 geometry.total_blocks() 个块, 由调用者保证
    pub fn new(image: I, geometry: Geometry) -> Self {
        Self {
            image,
            geometry,
            state: Mutex::new(DriverState::default()),
        }
    }

    pub fn io_counts(&self) -> IoCounts {
        self.state.lock().counts
    }

    #[cfg(test)]
    pub fn head(&self) -> (usize, usize) {
        self.state.lock().head
    }

    fn advance(&self, state: &mut DriverState) {
        let (disk_id, block_id) = state.head;
        state.head = if block_id + 1 == self.geometry.blocks_per_disk() {
            (disk_id + 1, 0)
        } else {
            (disk_id, block_id + 1)
        };
    }

    fn dispatch(&self, op: Operation, block: Option<&mut Block>, state: &mut DriverState) -> i32 {
        match op.command {
            BlockCommand::Mount => {
                if state.mounted {
                    return FAILURE;
                }
                state.mounted = true;
                state.head = (0, 0);
                return SUCCESS;
            }
            BlockCommand::Unmount => {
                if !state.mounted {
                    return FAILURE;
                }
                state.mounted = false;
                state.writable = false;
                return SUCCESS;
            }
            _ if !state.mounted => return FAILURE,
            _ => {}
        }

        match op.command {
            BlockCommand::WritePermission => state.writable = true,
            BlockCommand::RevokeWritePermission => state.writable = false,
            BlockCommand::SeekToDisk => {
                if op.disk_id >= self.geometry.num_disks() {
                    return FAILURE;
                }
                state.head = (op.disk_id, 0);
            }
            BlockCommand::SeekToBlock => {
                if op.block_id >= self.geometry.blocks_per_disk() {
                    return FAILURE;
                }
                state.head.1 = op.block_id;
            }
            BlockCommand::ReadBlock | BlockCommand::WriteBlock => {
                if !self.geometry.contains(op.disk_id, op.block_id) {
                    return FAILURE;
                }
                let Some(block) = block else {
                    return FAILURE;
                };
                let linear = self.geometry.linear_block(op.disk_id, op.block_id);
                let result = if op.command == BlockCommand::ReadBlock {
                    state.counts.reads += 1;
                    self.image.read_block(linear, &mut block[..])
                } else {
                    if !state.writable {
                        return FAILURE;
                    }
                    state.counts.writes += 1;
                    self.image.write_block(linear, &block[..])
                };
                if let Err(err) = result {
                    warn!("disk image I/O on block {} failed: {}", linear, err);
                    return FAILURE;
                }
                state.head = (op.disk_id, op.block_id);
                self.advance(state);
            }
            BlockCommand::Mount | BlockCommand::Unmount => unreachable!(),
        }
        SUCCESS
    }
}

impl<I: DiskImage> JbodOperation for JbodDriver<I> {
    fn operation(&self, op: u32, block: Option<&mut Block>) -> i32 {
        let mut state = self.state.lock();
        state.counts.operations += 1;
        let Some(op) = Operation::decode(op) else {
            warn!("unknown jbod opcode {:#x}", op);
            return FAILURE;
        };
        trace!("jbod {:?}", op);
        if op.command.transfers_block() && block.is_none() {
            warn!("jbod {:?} issued without a block buffer", op.command);
            return FAILURE;
        }
        self.dispatch(op, block, &mut state)
    }
}
