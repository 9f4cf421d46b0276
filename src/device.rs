use crate::jbod::{DiskImage, BLOCK_SIZE};
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

/// 宿主机上的一个文件, 所有磁盘按顺序首尾相接存放在里面
pub struct BlockFile(pub Mutex<File>);

// 镜像按线性块号排布: 磁盘 d 的块 b 位于第 d * blocks_per_disk + b 个块,
// 即文件偏移 (d * blocks_per_disk + b) * BLOCK_SIZE. 磁盘之间没有间隔,
// 换算由驱动完成, 这里只认线性块号.

impl BlockFile {
    /// 打开 (或创建) 镜像文件, 并把大小设置为 total_blocks 个块
    ///
    /// 新扩出来的部分读出来都是 0
    pub fn open<P: AsRef<Path>>(path: P, total_blocks: usize) -> io::Result<Self> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        f.set_len((total_blocks * BLOCK_SIZE) as u64)?;
        Ok(Self(Mutex::new(f)))
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "block file lock poisoned"))
    }
}

impl DiskImage for BlockFile {
    /// 定位到线性块 block_id, 读出整块
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.read_exact(buf)
    }

    /// 定位到线性块 block_id, 整块写入
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.write_all(buf)
    }
}

/// 放在内存里的磁盘镜像, 初始全 0
pub struct MemImage(Mutex<Vec<u8>>);

impl MemImage {
    pub fn new(total_blocks: usize) -> Self {
        Self(Mutex::new(vec![0u8; total_blocks * BLOCK_SIZE]))
    }

    fn range(len: usize, block_id: usize) -> io::Result<std::ops::Range<usize>> {
        let start = block_id * BLOCK_SIZE;
        if start + BLOCK_SIZE > len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "block beyond end of memory image",
            ));
        }
        Ok(start..start + BLOCK_SIZE)
    }
}

impl DiskImage for MemImage {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let data = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory image lock poisoned"))?;
        let range = Self::range(data.len(), block_id)?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut data = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory image lock poisoned"))?;
        let range = Self::range(data.len(), block_id)?;
        data[range].copy_from_slice(buf);
        Ok(())
    }
}
