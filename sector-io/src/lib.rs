//! sector-io：在扇区对齐的块 I/O 设备上模拟按字节寻址的文件接口
//!
//! 上层代码按 open / read / seek 的方式访问任意偏移和长度，
//! 本层把每次读请求换算为覆盖它的整扇区区间，只向设备发出一次块读取。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod block_dev;
mod error;
mod hexdump;
mod registry;
mod scratch;
mod stream;
mod translate;
mod util;

pub use block_dev::{BlockIo, BlockIoError, BlockMedia, MediaId, DEFAULT_SECTOR_SIZE};
pub use error::IoError;
pub use hexdump::{hexdump, hexdump_lines, HexLine, BYTES_PER_LINE};
pub use registry::{
    attach_device, register_device, resolve, unregister_device, DeviceBinding, DeviceRegistry,
    Handle, DEVICE_REGISTRY,
};
pub use scratch::ScratchBuffer;
pub use stream::{close, open, position, read, seek, write, OpenFlags, Whence};
pub use translate::TranslatedRequest;
pub use util::{memclean, secure_clear, xor_buffer, xor_buffer_into};
