use thiserror::Error;

use super::Operation;

/// 卷、缓存与设备各层共用的错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JbodError {
    #[error("block cache is not initialized")]
    NotInitialized,
    #[error("block cache already exists")]
    AlreadyExists,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("request [{addr}, {addr}+{len}) exceeds address space of {capacity} bytes")]
    OutOfRange { addr: u32, len: usize, capacity: usize },
    #[error("volume is not mounted")]
    NotMounted,
    #[error("volume is already mounted")]
    AlreadyMounted,
    #[error("volume is not writable")]
    PermissionDenied,
    #[error("block ({disk}, {block}) is already cached")]
    AlreadyCached { disk: usize, block: usize },
    #[error("block ({disk}, {block}) is not cached")]
    NotCached { disk: usize, block: usize },
    #[error("device failed on {0:?}")]
    DeviceError(Operation),
}

pub type Result<T> = core::result::Result<T, JbodError>;
