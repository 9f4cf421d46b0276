//! 设备接口层
//!
//! 三个 trait 从下往上:
//!
//! - [`DiskImage`]: 真正存放数据的介质 (内存或宿主机上的文件), 以线性块号随机读写
//! - [`JbodOperation`]: JBOD 驱动的原始接口, 一个 32 位操作码加一个可选的块缓冲区, 返回 0 表示成功
//! - [`BlockDevice`]: 卷层使用的结构化接口, 以 (磁盘号, 块号) 寻址, 返回 [`Result`]
//!
//! [`OpcodePort`] 把后者适配到前者, 操作码的打包只发生在这里.

use std::{any::Any, io};

use log::warn;

use super::{Block, BlockCommand, JbodError, Operation, Result};

pub trait DiskImage: Send + Sync + Any {
    // read_block 将线性编号为 block_id 的块读入缓冲区 buf
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()>;

    // write_block 将缓冲区 buf 中的数据写入线性编号为 block_id 的块
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;
}

/// JBOD 驱动的原始操作接口
///
/// `block` 只在读写块时需要, 其余命令传 None 即可
pub trait JbodOperation: Send + Sync {
    fn operation(&self, op: u32, block: Option<&mut Block>) -> i32;
}

pub trait BlockDevice: Send + Sync + Any {
    /// 执行一次设备操作, 一次只做一件事
    fn execute(&self, op: Operation, block: Option<&mut Block>) -> Result<()>;

    fn read_block(&self, disk_id: usize, block_id: usize, buf: &mut Block) -> Result<()> {
        self.execute(
            Operation::new(BlockCommand::ReadBlock, disk_id, block_id),
            Some(buf),
        )
    }

    fn write_block(&self, disk_id: usize, block_id: usize, buf: &Block) -> Result<()> {
        // 协议只有一个缓冲区指针, 写的时候交出去的是副本
        let mut block = buf.clone();
        self.execute(
            Operation::new(BlockCommand::WriteBlock, disk_id, block_id),
            Some(&mut block),
        )
    }

    /// mount / unmount / 写权限这些不针对具体块的命令
    fn control(&self, command: BlockCommand) -> Result<()> {
        self.execute(Operation::control(command), None)
    }
}

/// 把结构化的 [`Operation`] 打包成操作码交给底层驱动
pub struct OpcodePort<J> {
    driver: J,
}

impl<J: JbodOperation> OpcodePort<J> {
    pub fn new(driver: J) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &J {
        &self.driver
    }
}

impl<J: JbodOperation + 'static> BlockDevice for OpcodePort<J> {
    fn execute(&self, op: Operation, block: Option<&mut Block>) -> Result<()> {
        let code = op
            .encode()
            .ok_or(JbodError::InvalidArgument("operation does not fit in an opcode"))?;
        match self.driver.operation(code, block) {
            0 => Ok(()),
            status => {
                warn!("jbod operation {:?} failed with status {}", op, status);
                Err(JbodError::DeviceError(op))
            }
        }
    }
}
