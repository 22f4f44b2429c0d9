use core::any::Any;
use core::fmt;

/// 默认扇区大小，固定为 512 字节
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// 介质实例标识
///
/// 介质更换后由设备分配新的值；本层只透传，不做校验。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaId(pub u32);

/// 块设备介质描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMedia {
    /// 当前介质标识
    pub media_id: MediaId,
    /// 每块字节数，必须是 2 的幂
    pub block_size: u32,
    /// 最后一个块的编号
    pub last_block: u64,
    /// 介质是否只读
    pub read_only: bool,
}

impl BlockMedia {
    /// 以默认 512 字节扇区描述一块介质
    pub const fn new(media_id: MediaId, last_block: u64) -> Self {
        Self {
            media_id,
            block_size: DEFAULT_SECTOR_SIZE,
            last_block,
            read_only: true,
        }
    }

    /// 设置扇区大小
    pub const fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// 扇区大小是否合法（非零且为 2 的幂）
    pub fn is_valid(&self) -> bool {
        self.block_size.is_power_of_two()
    }

    /// 介质总字节数
    pub fn capacity(&self) -> u64 {
        (self.last_block + 1) * self.block_size as u64
    }
}

/// 块设备报告的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIoError {
    /// 设备在执行请求时出错
    DeviceError,
    /// 起始块或长度不合法
    InvalidParameter,
    /// 缓冲区长度不是块大小的整数倍
    BadBufferSize,
    /// 设备中没有介质
    NoMedia,
    /// 请求携带的介质标识与当前介质不符
    MediaChanged,
}

impl fmt::Display for BlockIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::DeviceError => "device error",
            Self::InvalidParameter => "invalid parameter",
            Self::BadBufferSize => "buffer size is not a multiple of the block size",
            Self::NoMedia => "no media",
            Self::MediaChanged => "media changed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for BlockIoError {}

/// 块 I/O 协议抽象接口
///
/// 只接受以整块为单位、按块编号寻址的读请求。由平台（固件磁盘服务、磁盘镜像等）实现。
pub trait BlockIo: Send + Sync + Any {
    /// 当前介质描述
    fn media(&self) -> BlockMedia;

    /// 从 `lba` 开始读取若干整块到缓冲区
    ///
    /// # 参数
    /// - `media_id`: 调用方认为的当前介质标识
    /// - `lba`: 起始块编号
    /// - `buf`: 目标缓冲区，长度必须为块大小的整数倍
    fn read_blocks(&self, media_id: MediaId, lba: u64, buf: &mut [u8])
        -> Result<(), BlockIoError>;
}
