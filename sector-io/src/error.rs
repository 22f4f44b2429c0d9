use core::fmt;

use crate::block_dev::BlockIoError;

/// 字节流操作的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// 句柄无法解析为已注册的设备
    DeviceNotFound,
    /// 扇区大小不是 2 的幂
    InvalidGeometry { block_size: u32 },
    /// 底层块读取失败
    Device(BlockIoError),
    /// 无法分配暂存缓冲区
    OutOfMemory { bytes: u64 },
    /// 游标为负，无法映射到扇区
    InvalidOffset(i64),
    /// 块读取已成功，但游标无法推进到 `offset + count`
    CursorUpdate { offset: i64, count: usize },
    /// 句柄以只写方式打开，不能读取
    NotReadable,
    /// 写操作尚未支持
    NotSupported,
}

impl From<BlockIoError> for IoError {
    fn from(err: BlockIoError) -> Self {
        Self::Device(err)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => write!(f, "no device bound to this handle"),
            Self::InvalidGeometry { block_size } => {
                write!(f, "block size {} is not a power of two", block_size)
            }
            Self::Device(err) => write!(f, "block read failed: {}", err),
            Self::OutOfMemory { bytes } => write!(f, "cannot allocate {} bytes", bytes),
            Self::InvalidOffset(offset) => write!(f, "negative offset {}", offset),
            Self::CursorUpdate { offset, count } => write!(
                f,
                "cannot move cursor from {:#x} by {:#x} bytes",
                offset, count
            ),
            Self::NotReadable => write!(f, "handle was opened write-only"),
            Self::NotSupported => write!(f, "operation not supported"),
        }
    }
}

impl core::error::Error for IoError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}
