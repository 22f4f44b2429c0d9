//! 十六进制转储
//!
//! 每行 16 字节：`0x%08x ` 偏移前缀，随后每字节两位十六进制加一个分隔符。
//! 第 8 个字节后若本行还有字节，分隔符用 `-` 代替空格。

use bdio_console::{enabled, log_at, Verbosity};
use core::fmt;

/// 每行字节数
pub const BYTES_PER_LINE: usize = 16;

/// 转储中的一行
#[derive(Debug, Clone, Copy)]
pub struct HexLine<'a> {
    /// 本行首字节在整个缓冲区中的偏移
    pub offset: usize,
    /// 本行字节，最多 16 个
    pub bytes: &'a [u8],
}

impl fmt::Display for HexLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x} ", self.offset)?;
        for (i, byte) in self.bytes.iter().enumerate() {
            let sep = if i == BYTES_PER_LINE / 2 - 1 && i + 1 != self.bytes.len() {
                '-'
            } else {
                ' '
            };
            write!(f, "{:02x}{}", byte, sep)?;
        }
        Ok(())
    }
}

/// 按行切分缓冲区
pub fn hexdump_lines(data: &[u8]) -> impl Iterator<Item = HexLine<'_>> {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, bytes)| HexLine {
            offset: i * BYTES_PER_LINE,
            bytes,
        })
}

/// 以给定严重级别输出缓冲区的十六进制转储
///
/// 该级别被过滤时直接返回，不做任何格式化。
pub fn hexdump(severity: Verbosity, data: &[u8]) {
    if !enabled(severity) {
        return;
    }
    for line in hexdump_lines(data) {
        log_at(severity, format_args!("{}", line));
    }
}
