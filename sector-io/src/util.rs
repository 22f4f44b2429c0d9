//! 缓冲区工具：异或合并与清零释放

use alloc::vec::Vec;
use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// 按字节异或两个等长缓冲区，结果写回 `buf1`
///
/// # Panics
///
/// 两个缓冲区长度不同时 panic。
pub fn xor_buffer(buf1: &mut [u8], buf2: &[u8]) {
    assert_eq!(buf1.len(), buf2.len());
    for (a, b) in buf1.iter_mut().zip(buf2) {
        *a ^= *b;
    }
}

/// 按字节异或两个等长缓冲区，结果写入 `output`
///
/// # Panics
///
/// 三个缓冲区长度不同时 panic。
pub fn xor_buffer_into(buf1: &[u8], buf2: &[u8], output: &mut [u8]) {
    assert_eq!(buf1.len(), buf2.len());
    assert_eq!(buf1.len(), output.len());
    for ((out, a), b) in output.iter_mut().zip(buf1).zip(buf2) {
        *out = *a ^ *b;
    }
}

/// 把内存区域全部写零
///
/// 使用 volatile 写入，保证清零不会因为区域随后被释放而被优化掉。
pub fn secure_clear(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        // SAFETY: byte 来自有效的可变引用
        unsafe { ptr::write_volatile(byte, 0) };
    }
    compiler_fence(Ordering::SeqCst);
}

/// 清零后释放缓冲区
///
/// 清零范围覆盖整个已分配容量，而不只是当前长度。
pub fn memclean(mut buf: Vec<u8>) {
    // 填满到容量不会重新分配
    buf.resize(buf.capacity(), 0);
    secure_clear(&mut buf);
}
