//! 以磁盘镜像文件充当块 I/O 设备

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use sector_io::{BlockIo, BlockIoError, BlockMedia, MediaId};

/// 镜像文件块设备
///
/// 镜像长度不是扇区大小整数倍时，最后一个扇区的缺失部分按零读出。
pub struct ImageBlockIo {
    file: Mutex<File>,
    media: BlockMedia,
    len: u64,
}

impl ImageBlockIo {
    pub fn open(path: &Path, block_size: u32, media_id: MediaId) -> Result<Self> {
        if !block_size.is_power_of_two() {
            bail!("sector size {block_size} is not a power of two");
        }
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let len = file.metadata()?.len();
        let blocks = len.div_ceil(block_size as u64).max(1);
        let media = BlockMedia::new(media_id, blocks - 1).with_block_size(block_size);
        Ok(Self {
            file: Mutex::new(file),
            media,
            len,
        })
    }

    /// 镜像文件字节数
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl BlockIo for ImageBlockIo {
    fn media(&self) -> BlockMedia {
        self.media
    }

    fn read_blocks(&self, media_id: MediaId, lba: u64, buf: &mut [u8]) -> Result<(), BlockIoError> {
        if media_id != self.media.media_id {
            return Err(BlockIoError::MediaChanged);
        }
        let block_size = self.media.block_size as u64;
        if buf.len() as u64 % block_size != 0 {
            return Err(BlockIoError::BadBufferSize);
        }
        let blocks = buf.len() as u64 / block_size;
        if blocks > 0 && lba.saturating_add(blocks - 1) > self.media.last_block {
            return Err(BlockIoError::InvalidParameter);
        }

        let start = lba * block_size;
        let mut file = self.file.lock().map_err(|_| BlockIoError::DeviceError)?;
        file.seek(SeekFrom::Start(start))
            .map_err(|_| BlockIoError::DeviceError)?;
        let available = self.len.saturating_sub(start).min(buf.len() as u64) as usize;
        file.read_exact(&mut buf[..available])
            .map_err(|_| BlockIoError::DeviceError)?;
        buf[available..].fill(0);
        Ok(())
    }
}
