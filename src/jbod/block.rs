use std::{
    fmt::{Debug, Formatter, Result},
    ops::{Deref, DerefMut},
};

use super::BLOCK_SIZE;

/// 一个块的数据, 恰好 BLOCK_SIZE 字节
///
/// 所有块内拷贝都通过切片完成, 越界会直接 panic 而不是悄悄写坏相邻内存
#[derive(Clone, PartialEq, Eq)]
pub struct Block([u8; BLOCK_SIZE]);

impl Block {
    pub fn zeroed() -> Self {
        Self([0u8; BLOCK_SIZE])
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// 把块内 [offset, offset + dst.len()) 拷贝到 dst
    pub fn read_into(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0[offset..offset + dst.len()]);
    }

    /// 用 src 覆盖块内 [offset, offset + src.len())
    pub fn overlay(&mut self, offset: usize, src: &[u8]) {
        self.0[offset..offset + src.len()].copy_from_slice(src);
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for Block {
    type Target = [u8; BLOCK_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        // 只打印前 16 字节, 完整的 256 字节太吵了
        f.debug_tuple("Block").field(&&self.0[..16]).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_then_read_back() {
        let mut block = Block::zeroed();
        block.overlay(250, &[1, 2, 3, 4, 5, 6]);
        let mut out = [0u8; 6];
        block.read_into(250, &mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
        assert_eq!(block[249], 0);
    }

    #[test]
    #[should_panic]
    fn overlay_past_end_panics() {
        let mut block = Block::zeroed();
        block.overlay(BLOCK_SIZE - 1, &[1, 2]);
    }
}
