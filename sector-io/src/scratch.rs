use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use core::mem;

use crate::error::IoError;
use crate::util::memclean;

/// 读请求的暂存缓冲区
///
/// 长度等于对齐后的字节数。缓冲区可能装着设备上的明文数据，
/// 因此在任何返回路径上被丢弃时都会先清零再释放。
pub struct ScratchBuffer {
    buf: Vec<u8>,
}

impl ScratchBuffer {
    /// 分配 `len` 字节的全零缓冲区
    ///
    /// 分配失败时返回 `OutOfMemory`，不会触发 alloc error handler。
    pub fn new(len: u64) -> Result<Self, IoError> {
        let oom = IoError::OutOfMemory { bytes: len };
        let size = usize::try_from(len).map_err(|_| oom)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| oom)?;
        buf.resize(size, 0);
        Ok(Self { buf })
    }
}

impl Deref for ScratchBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        memclean(mem::take(&mut self.buf));
    }
}
