use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use spin::{Lazy, Mutex};

use crate::block_dev::{BlockIo, BlockMedia};
use crate::error::IoError;
use crate::stream::OpenFlags;

/// 设备句柄
///
/// 注册表中槽位的下标，对调用方不透明。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(usize);

impl Handle {
    /// 由整数句柄构造
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// 整数句柄值
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 设备绑定
///
/// 一个句柄对应的块设备、注册时的介质描述，以及该句柄自己的游标。
pub struct DeviceBinding {
    /// 块设备引用
    device: Arc<dyn BlockIo>,
    /// 注册时读取的介质描述，绑定期间不变
    media: BlockMedia,
    /// 当前字节偏移
    pub(crate) cursor: i64,
    /// 最近一次 open 使用的标志
    pub(crate) flags: OpenFlags,
}

impl DeviceBinding {
    fn new(device: Arc<dyn BlockIo>, media: BlockMedia) -> Self {
        Self {
            device,
            media,
            cursor: 0,
            flags: OpenFlags::RDONLY,
        }
    }

    /// 介质描述
    pub fn media(&self) -> BlockMedia {
        self.media
    }

    /// 扇区大小
    pub fn sector_size(&self) -> u32 {
        self.media.block_size
    }

    /// 当前游标
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// 最近一次 open 使用的标志
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// 块设备引用
    pub fn device(&self) -> Arc<dyn BlockIo> {
        Arc::clone(&self.device)
    }
}

/// 设备句柄注册表
///
/// 把整数句柄映射到设备绑定。注销后的槽位会被后续注册复用。
pub struct DeviceRegistry {
    slots: Vec<Option<Arc<Mutex<DeviceBinding>>>>,
}

impl DeviceRegistry {
    /// 创建空注册表
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// 注册块设备，返回新句柄
    ///
    /// 扇区大小不是 2 的幂时返回 `InvalidGeometry`。
    pub fn register(&mut self, device: Arc<dyn BlockIo>) -> Result<Handle, IoError> {
        let media = device.media();
        if !media.is_valid() {
            return Err(IoError::InvalidGeometry {
                block_size: media.block_size,
            });
        }
        let binding = Some(Arc::new(Mutex::new(DeviceBinding::new(device, media))));
        // 优先复用空槽位
        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = binding;
                index
            }
            None => {
                self.slots.push(binding);
                self.slots.len() - 1
            }
        };
        Ok(Handle(index))
    }

    /// 解析句柄
    pub fn resolve(&self, handle: Handle) -> Option<Arc<Mutex<DeviceBinding>>> {
        self.slots.get(handle.0)?.as_ref().map(Arc::clone)
    }

    /// 查找已注册的设备实例对应的句柄
    pub fn find(&self, device: &Arc<dyn BlockIo>) -> Option<Handle> {
        self.slots
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .is_some_and(|binding| Arc::ptr_eq(&binding.lock().device, device))
            })
            .map(Handle)
    }

    /// 注销句柄，返回句柄此前是否有效
    pub fn unregister(&mut self, handle: Handle) -> bool {
        match self.slots.get_mut(handle.0) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// 当前有效句柄数量
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// 是否没有任何有效句柄
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局设备注册表
pub static DEVICE_REGISTRY: Lazy<Mutex<DeviceRegistry>> =
    Lazy::new(|| Mutex::new(DeviceRegistry::new()));

/// 在全局注册表中注册块设备
pub fn register_device(device: Arc<dyn BlockIo>) -> Result<Handle, IoError> {
    let handle = DEVICE_REGISTRY.lock().register(device)?;
    log::debug!("Registered block device as {}", handle);
    Ok(handle)
}

/// 在全局注册表中解析句柄
pub fn resolve(handle: Handle) -> Option<Arc<Mutex<DeviceBinding>>> {
    DEVICE_REGISTRY.lock().resolve(handle)
}

/// 取得设备实例在全局注册表中的句柄
///
/// 同一设备实例已注册过时返回原有句柄，否则注册为新句柄。
pub fn attach_device(device: Arc<dyn BlockIo>) -> Result<Handle, IoError> {
    let mut registry = DEVICE_REGISTRY.lock();
    if let Some(handle) = registry.find(&device) {
        log::debug!("Block device already bound to {}", handle);
        return Ok(handle);
    }
    let handle = registry.register(device)?;
    log::debug!("Registered block device as {}", handle);
    Ok(handle)
}

/// 从全局注册表注销句柄
pub fn unregister_device(handle: Handle) -> bool {
    DEVICE_REGISTRY.lock().unregister(handle)
}
