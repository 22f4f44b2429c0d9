//! 字节区间到扇区区间的换算

/// 一次读请求换算出的对齐扇区区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatedRequest {
    /// 起始扇区编号
    pub new_offset: u64,
    /// 需要向设备请求的字节数，扇区大小的整数倍
    pub aligned_count: u64,
    /// 对齐缓冲区开头需要丢弃的字节数
    pub skip: usize,
}

impl TranslatedRequest {
    /// 换算字节区间 `[offset, offset + count)`
    ///
    /// 首扇区不完整时多读一个扇区，尾扇区不完整时再多读一个扇区。
    /// 记 `r = offset % sector_size`、`s = count % sector_size`，当 `r > 0` 且
    /// `r + s < sector_size` 时，结果比最小覆盖区间多出尾部一个扇区
    /// （例如 offset 10、count 512 跨两个扇区，却读取三个）。
    ///
    /// # Arguments
    ///
    /// * `offset` - 起始字节偏移
    /// * `count` - 字节数
    /// * `sector_size` - 扇区大小，必须是 2 的幂
    pub fn new(offset: u64, count: u64, sector_size: u32) -> Self {
        let sector_size = sector_size as u64;
        debug_assert!(sector_size.is_power_of_two());
        let mut sector_to_add = 0;
        if offset % sector_size != 0 {
            sector_to_add += 1;
        }
        if (offset + count) % sector_size != 0 {
            sector_to_add += 1;
        }
        let new_offset = offset / sector_size;
        let aligned_count = (count / sector_size + sector_to_add) * sector_size;
        Self {
            new_offset,
            aligned_count,
            // 余数小于扇区大小，必然装得下 usize
            skip: (offset - new_offset * sector_size) as usize,
        }
    }

    /// 对齐区间占用的扇区数
    pub fn sectors(&self, sector_size: u32) -> u64 {
        self.aligned_count / sector_size as u64
    }
}
