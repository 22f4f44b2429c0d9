//! 字节流接口
//!
//! 在只接受整扇区读请求的块设备上提供 open / close / read / write / seek。
//! 每个句柄有自己的游标，互不干扰。

use bdio_console::critical;
use log::{debug, error};

use crate::error::IoError;
use crate::registry::{resolve, Handle};
use crate::scratch::ScratchBuffer;
use crate::translate::TranslatedRequest;

bitflags::bitflags! {
    /// 打开标志
    pub struct OpenFlags: u32 {
        /// 只读
        const RDONLY = 0;
        /// 只写
        const WRONLY = 1 << 0;
        /// 读写
        const RDWR = 1 << 1;
    }
}

impl OpenFlags {
    /// 以这些标志打开的句柄能否读取
    ///
    /// 只有单独的 `WRONLY` 禁止读取；同时带 `RDWR` 时按读写处理。
    pub fn readable(self) -> bool {
        !self.contains(Self::WRONLY) || self.contains(Self::RDWR)
    }
}

/// seek 的基准位置
///
/// 目前只实现绝对定位，`Current` 与 `End` 按 `Set` 处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

/// 打开句柄对应的字节流
///
/// 游标重置为 0。句柄无法解析时返回 `DeviceNotFound`，是否终止进程由调用方决定。
///
/// # Arguments
///
/// * `selector` - 注册设备时得到的句柄
/// * `flags` - 打开标志；`WRONLY` 句柄不可读，任何标志都不会开启写支持
pub fn open(selector: Handle, flags: OpenFlags) -> Result<Handle, IoError> {
    let Some(binding) = resolve(selector) else {
        critical!("Failed to open device {}", selector);
        return Err(IoError::DeviceNotFound);
    };
    let mut binding = binding.lock();
    binding.cursor = 0;
    binding.flags = flags;
    debug!(
        "Opened {} (sector size {}, flags {:?})",
        selector,
        binding.sector_size(),
        flags
    );
    Ok(selector)
}

/// 关闭句柄
///
/// 没有需要刷写的数据，总是成功，也不改变游标。
pub fn close(handle: Handle) {
    debug!("Closing {}", handle);
}

/// 移动句柄的游标
///
/// 偏移原样写入游标，不做范围检查。
///
/// # Returns
///
/// 新的游标值；句柄无法解析时返回 `DeviceNotFound`。
pub fn seek(handle: Handle, offset: i64, whence: Whence) -> Result<i64, IoError> {
    debug!("Positioning {} at offset {} from {:?}", handle, offset, whence);
    let binding = resolve(handle).ok_or(IoError::DeviceNotFound)?;
    let mut binding = binding.lock();
    binding.cursor = offset;
    Ok(binding.cursor)
}

/// 句柄当前的游标
pub fn position(handle: Handle) -> Result<i64, IoError> {
    let binding = resolve(handle).ok_or(IoError::DeviceNotFound)?;
    let cursor = binding.lock().cursor;
    Ok(cursor)
}

/// 从游标处读取 `buf.len()` 字节
///
/// 把请求扩展为覆盖它的整扇区区间，向设备发出恰好一次块读取，
/// 再从暂存缓冲区中截取调用方需要的字节，最后把游标推进 `buf.len()`。
///
/// 以 `WRONLY` 打开的句柄返回 `NotReadable`，不访问设备。
/// 失败时游标保持原值。若块读取成功但游标无法推进，返回 `CursorUpdate`，
/// 此时 `buf` 中已经写入的数据不会撤回。
///
/// # Returns
///
/// 成功时总是返回 `buf.len()`。
pub fn read(handle: Handle, buf: &mut [u8]) -> Result<usize, IoError> {
    let count = buf.len();
    debug!("Reading {:#x} bytes from {} into {:p}", count, handle, buf.as_ptr());

    let binding = resolve(handle).ok_or(IoError::DeviceNotFound)?;
    let (offset, media, device, flags) = {
        let binding = binding.lock();
        (binding.cursor, binding.media(), binding.device(), binding.flags)
    };
    if !flags.readable() {
        error!("{} was opened write-only ({:?})", handle, flags);
        return Err(IoError::NotReadable);
    }
    if count == 0 {
        return Ok(0);
    }
    if offset < 0 {
        error!("Cannot read {} at negative offset {}", handle, offset);
        return Err(IoError::InvalidOffset(offset));
    }

    let request = TranslatedRequest::new(offset as u64, count as u64, media.block_size);
    let mut scratch = ScratchBuffer::new(request.aligned_count).map_err(|err| {
        error!("Cannot malloc {} bytes", request.aligned_count);
        err
    })?;

    device
        .read_blocks(media.media_id, request.new_offset, &mut scratch)
        .map_err(|err| {
            error!(
                "ReadBlocks of {} sectors at {:#x} failed: {}",
                request.sectors(media.block_size),
                request.new_offset,
                err
            );
            IoError::Device(err)
        })?;

    buf.copy_from_slice(&scratch[request.skip..request.skip + count]);
    drop(scratch);

    let cursor_update = IoError::CursorUpdate { offset, count };
    let target = i64::try_from(count)
        .ok()
        .and_then(|count| offset.checked_add(count))
        .ok_or(cursor_update);
    if let Err(err) = target.and_then(|target| {
        seek(handle, target, Whence::Set).map_err(|_| cursor_update)
    }) {
        error!("Cannot lseek for restore to {:#x} + {:#x}", offset, count);
        return Err(err);
    }
    Ok(count)
}

/// 写入字节流
///
/// 尚未支持：不访问设备，总是返回 `NotSupported`。
pub fn write(handle: Handle, buf: &[u8]) -> Result<usize, IoError> {
    debug!("Writing {:#x} bytes to {} from {:p}", buf.len(), handle, buf.as_ptr());
    Err(IoError::NotSupported)
}
