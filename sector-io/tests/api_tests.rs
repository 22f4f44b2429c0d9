//! sector-io crate 功能性验证测试
//!
//! 这些测试验证 sector-io crate 对外提供的 API 的正确性。
//! 测试在用户态环境运行，使用 std 实现 mock 块设备。
//!
//! 注意：注册表是全局的，每个测试注册自己的设备，句柄互不相同，可以并行执行。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bdio_console::{init_console, set_verbosity, Console, Verbosity};
use sector_io::{
    attach_device, close, hexdump, memclean, open, position, read, register_device, resolve,
    secure_clear, seek, unregister_device, write, xor_buffer, xor_buffer_into, BlockIo,
    BlockIoError, BlockMedia, DeviceRegistry, Handle, IoError, MediaId, OpenFlags,
    ScratchBuffer, Whence,
};

// 捕获全部日志输出
static LOG_OUTPUT: Mutex<Vec<u8>> = Mutex::new(Vec::new());

struct CaptureConsole;

impl Console for CaptureConsole {
    fn put_char(&self, c: u8) {
        LOG_OUTPUT.lock().unwrap().push(c);
    }

    fn put_str(&self, s: &str) {
        LOG_OUTPUT.lock().unwrap().extend_from_slice(s.as_bytes());
    }
}

static CAPTURE: CaptureConsole = CaptureConsole;

/// 在 main 之前安装日志，使读路径上的 debug 日志也被执行到
#[ctor::ctor]
fn init_logging() {
    init_console(&CAPTURE);
    set_verbosity(Verbosity::Debug);
}

fn log_output() -> String {
    String::from_utf8_lossy(&LOG_OUTPUT.lock().unwrap()).into_owned()
}

/// 设备上第 `pos` 个字节的内容
fn pattern(pos: u64) -> u8 {
    (pos % 251) as u8 ^ (pos / 512) as u8
}

// Mock 块设备实现，记录每次块读取
struct MockBlockIo {
    media: BlockMedia,
    data: Vec<u8>,
    calls: Mutex<Vec<(MediaId, u64, usize)>>,
    fail: AtomicBool,
}

impl MockBlockIo {
    fn new(block_size: u32, num_blocks: u64) -> Arc<Self> {
        let media = BlockMedia::new(MediaId(7), num_blocks - 1).with_block_size(block_size);
        let data = (0..media.capacity()).map(pattern).collect();
        Arc::new(Self {
            media,
            data,
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> Vec<(MediaId, u64, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlockIo for MockBlockIo {
    fn media(&self) -> BlockMedia {
        self.media
    }

    fn read_blocks(&self, media_id: MediaId, lba: u64, buf: &mut [u8]) -> Result<(), BlockIoError> {
        self.calls.lock().unwrap().push((media_id, lba, buf.len()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(BlockIoError::DeviceError);
        }
        if media_id != self.media.media_id {
            return Err(BlockIoError::MediaChanged);
        }
        let block_size = self.media.block_size as usize;
        if buf.len() % block_size != 0 {
            return Err(BlockIoError::BadBufferSize);
        }
        let start = lba as usize * block_size;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(BlockIoError::InvalidParameter);
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

// 没有边界的块设备，任意扇区都可读
struct EndlessBlockIo;

impl BlockIo for EndlessBlockIo {
    fn media(&self) -> BlockMedia {
        BlockMedia::new(MediaId(0), u64::MAX / 512 - 1)
    }

    fn read_blocks(&self, _media_id: MediaId, lba: u64, buf: &mut [u8]) -> Result<(), BlockIoError> {
        let base = lba * 512;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = pattern(base + i as u64);
        }
        Ok(())
    }
}

fn open_mock(block_size: u32, num_blocks: u64) -> (Arc<MockBlockIo>, Handle) {
    let device = MockBlockIo::new(block_size, num_blocks);
    let handle = register_device(device.clone()).unwrap();
    assert_eq!(open(handle, OpenFlags::RDONLY).unwrap(), handle);
    (device, handle)
}

fn expected(offset: u64, count: usize) -> Vec<u8> {
    (offset..offset + count as u64).map(pattern).collect()
}

#[test]
fn test_open_resets_cursor() {
    let (_device, handle) = open_mock(512, 8);
    assert_eq!(position(handle).unwrap(), 0);

    seek(handle, 777, Whence::Set).unwrap();
    assert_eq!(position(handle).unwrap(), 777);

    open(handle, OpenFlags::RDONLY).unwrap();
    assert_eq!(position(handle).unwrap(), 0);
}

#[test]
fn test_open_unknown_handle_fails() {
    let result = open(Handle::from_raw(usize::MAX), OpenFlags::RDONLY);
    assert_eq!(result, Err(IoError::DeviceNotFound));
}

#[test]
fn test_open_records_flags() {
    let (_device, handle) = open_mock(512, 4);
    open(handle, OpenFlags::RDWR).unwrap();
    let binding = resolve(handle).unwrap();
    assert_eq!(binding.lock().flags(), OpenFlags::RDWR);
}

#[test]
fn test_register_rejects_bad_sector_size() {
    struct Odd;
    impl BlockIo for Odd {
        fn media(&self) -> BlockMedia {
            BlockMedia::new(MediaId(0), 0).with_block_size(500)
        }
        fn read_blocks(&self, _: MediaId, _: u64, _: &mut [u8]) -> Result<(), BlockIoError> {
            Ok(())
        }
    }
    assert_eq!(
        register_device(Arc::new(Odd)).err(),
        Some(IoError::InvalidGeometry { block_size: 500 })
    );
}

#[test]
fn test_read_head_of_first_sector() {
    // 游标 0，读 100 字节：只有尾部不完整，读 1 个扇区
    let (device, handle) = open_mock(512, 8);
    let mut buf = [0u8; 100];

    assert_eq!(read(handle, &mut buf).unwrap(), 100);
    assert_eq!(device.calls(), vec![(MediaId(7), 0, 512)]);
    assert_eq!(buf.as_slice(), expected(0, 100).as_slice());
    assert_eq!(position(handle).unwrap(), 100);
}

#[test]
fn test_read_straddling_sector_boundary() {
    // 游标 500，读 100 字节：首尾都不完整，读 2 个扇区
    let (device, handle) = open_mock(512, 8);
    seek(handle, 500, Whence::Set).unwrap();
    let mut buf = [0u8; 100];

    assert_eq!(read(handle, &mut buf).unwrap(), 100);
    assert_eq!(device.calls(), vec![(MediaId(7), 0, 1024)]);
    assert_eq!(buf.as_slice(), expected(500, 100).as_slice());
    assert_eq!(position(handle).unwrap(), 600);
}

#[test]
fn test_read_aligned_multi_sector() {
    let (device, handle) = open_mock(512, 8);
    seek(handle, 1024, Whence::Set).unwrap();
    let mut buf = vec![0u8; 2048];

    assert_eq!(read(handle, &mut buf).unwrap(), 2048);
    assert_eq!(device.calls(), vec![(MediaId(7), 2, 2048)]);
    assert_eq!(buf, expected(1024, 2048));
    assert_eq!(position(handle).unwrap(), 3072);
}

#[test]
fn test_read_matches_direct_access() {
    // 每次读取都只发出一次块读取，且内容与直接访问一致
    let (device, handle) = open_mock(512, 16);
    for &offset in &[0u64, 1, 255, 511, 512, 513, 1000, 2047] {
        for &count in &[1usize, 15, 511, 512, 513, 1024, 3000] {
            seek(handle, offset as i64, Whence::Set).unwrap();
            let calls_before = device.calls().len();
            let mut buf = vec![0u8; count];

            assert_eq!(read(handle, &mut buf).unwrap(), count);
            assert_eq!(buf, expected(offset, count), "offset={} count={}", offset, count);
            assert_eq!(device.calls().len(), calls_before + 1);
            assert_eq!(position(handle).unwrap(), (offset + count as u64) as i64);
        }
    }
}

#[test]
fn test_sequential_reads_advance_cursor() {
    let (_device, handle) = open_mock(512, 8);
    let mut first = [0u8; 300];
    let mut second = [0u8; 300];

    read(handle, &mut first).unwrap();
    read(handle, &mut second).unwrap();
    assert_eq!(first.as_slice(), expected(0, 300).as_slice());
    assert_eq!(second.as_slice(), expected(300, 300).as_slice());
    assert_eq!(position(handle).unwrap(), 600);
}

#[test]
fn test_read_large_sector_size() {
    let (device, handle) = open_mock(4096, 4);
    seek(handle, 4000, Whence::Set).unwrap();
    let mut buf = [0u8; 200];

    read(handle, &mut buf).unwrap();
    assert_eq!(device.calls(), vec![(MediaId(7), 0, 8192)]);
    assert_eq!(buf.as_slice(), expected(4000, 200).as_slice());
}

#[test]
fn test_zero_length_read_keeps_cursor() {
    let (device, handle) = open_mock(512, 8);
    seek(handle, 1234, Whence::Set).unwrap();

    assert_eq!(read(handle, &mut []).unwrap(), 0);
    assert_eq!(position(handle).unwrap(), 1234);
    assert!(device.calls().is_empty());
}

#[test]
fn test_read_round_trip() {
    let (_device, handle) = open_mock(512, 8);
    let mut buf1 = vec![0u8; 1500];
    let mut buf2 = vec![0u8; 1500];

    seek(handle, 0, Whence::Set).unwrap();
    read(handle, &mut buf1).unwrap();
    seek(handle, 0, Whence::Set).unwrap();
    read(handle, &mut buf2).unwrap();
    assert_eq!(buf1, buf2);
}

#[test]
fn test_seek_is_absolute_and_unchecked() {
    let (_device, handle) = open_mock(512, 2);
    assert_eq!(seek(handle, 100, Whence::Set).unwrap(), 100);
    // 其他基准按绝对定位处理
    assert_eq!(seek(handle, 40, Whence::Current).unwrap(), 40);
    assert_eq!(seek(handle, 8, Whence::End).unwrap(), 8);
    // 超出设备容量也原样接受
    assert_eq!(seek(handle, 1 << 40, Whence::Set).unwrap(), 1 << 40);
    assert_eq!(position(handle).unwrap(), 1 << 40);
}

#[test]
fn test_seek_unknown_handle_fails() {
    assert_eq!(
        seek(Handle::from_raw(usize::MAX), 0, Whence::Set),
        Err(IoError::DeviceNotFound)
    );
}

#[test]
fn test_device_failure_keeps_cursor() {
    let (device, handle) = open_mock(512, 8);
    seek(handle, 700, Whence::Set).unwrap();
    device.fail.store(true, Ordering::SeqCst);
    let mut buf = [0u8; 64];

    assert_eq!(
        read(handle, &mut buf),
        Err(IoError::Device(BlockIoError::DeviceError))
    );
    // 只尝试一次，不重试
    assert_eq!(device.calls().len(), 1);
    assert_eq!(position(handle).unwrap(), 700);
}

#[test]
fn test_cursor_update_failure_keeps_data() {
    // 块读取成功但游标溢出：读取报告失败，数据保留，游标不动
    let device: Arc<dyn BlockIo> = Arc::new(EndlessBlockIo);
    let handle = register_device(device).unwrap();
    open(handle, OpenFlags::RDONLY).unwrap();
    let offset = i64::MAX - 10;
    seek(handle, offset, Whence::Set).unwrap();
    let mut buf = [0u8; 100];

    assert_eq!(
        read(handle, &mut buf),
        Err(IoError::CursorUpdate { offset, count: 100 })
    );
    assert_eq!(buf.as_slice(), expected(offset as u64, 100).as_slice());
    assert_eq!(position(handle).unwrap(), offset);
}

#[test]
fn test_negative_cursor_fails() {
    let (device, handle) = open_mock(512, 8);
    seek(handle, -4, Whence::Set).unwrap();
    let mut buf = [0u8; 8];

    assert_eq!(read(handle, &mut buf), Err(IoError::InvalidOffset(-4)));
    assert!(device.calls().is_empty());
}

#[test]
fn test_read_near_end_may_request_sector_past_media() {
    // 起点不对齐且整段落在最后一个扇区内时，会多请求一个扇区
    let (device, handle) = open_mock(512, 4);
    seek(handle, 2000, Whence::Set).unwrap();
    let mut buf = [0u8; 10];

    assert_eq!(
        read(handle, &mut buf),
        Err(IoError::Device(BlockIoError::InvalidParameter))
    );
    assert_eq!(device.calls(), vec![(MediaId(7), 3, 1024)]);
    assert_eq!(position(handle).unwrap(), 2000);
}

#[test]
fn test_read_spanning_two_sectors_near_end_requests_three() {
    // [1100, 1613) 落在扇区 2..=3 内，但首尾余数之和小于扇区大小，多请求扇区 4
    let (device, handle) = open_mock(512, 4);
    seek(handle, 1100, Whence::Set).unwrap();
    let mut buf = [0u8; 513];

    assert_eq!(
        read(handle, &mut buf),
        Err(IoError::Device(BlockIoError::InvalidParameter))
    );
    assert_eq!(device.calls(), vec![(MediaId(7), 2, 1536)]);
    assert_eq!(position(handle).unwrap(), 1100);

    // 同样的区间在多一个扇区的设备上可以读出
    let (device, handle) = open_mock(512, 5);
    seek(handle, 1100, Whence::Set).unwrap();
    assert_eq!(read(handle, &mut buf).unwrap(), 513);
    assert_eq!(&buf[..], &expected(1100, 513)[..]);
    assert_eq!(device.calls(), vec![(MediaId(7), 2, 1536)]);
}

#[test]
fn test_write_not_supported() {
    let (device, handle) = open_mock(512, 4);
    open(handle, OpenFlags::RDWR).unwrap();

    assert_eq!(write(handle, b"data"), Err(IoError::NotSupported));
    assert!(device.calls().is_empty());
    assert_eq!(position(handle).unwrap(), 0);
}

#[test]
fn test_close_is_noop() {
    let (_device, handle) = open_mock(512, 4);
    seek(handle, 42, Whence::Set).unwrap();
    close(handle);
    assert_eq!(position(handle).unwrap(), 42);
    close(Handle::from_raw(usize::MAX));
}

#[test]
fn test_handles_have_independent_cursors() {
    let (_dev_a, a) = open_mock(512, 4);
    let (_dev_b, b) = open_mock(512, 4);
    let mut buf = [0u8; 10];

    seek(a, 100, Whence::Set).unwrap();
    read(b, &mut buf).unwrap();
    assert_eq!(position(a).unwrap(), 100);
    assert_eq!(position(b).unwrap(), 10);
}

#[test]
fn test_attach_and_unregister_device() {
    let device: Arc<dyn BlockIo> = MockBlockIo::new(512, 2);
    let handle = register_device(Arc::clone(&device)).unwrap();
    // 已注册的实例复用原句柄
    assert_eq!(attach_device(Arc::clone(&device)).unwrap(), handle);

    assert!(unregister_device(handle));
    assert!(!unregister_device(handle));
    assert!(resolve(handle).is_none());
    assert_eq!(read(handle, &mut [0u8; 4]), Err(IoError::DeviceNotFound));

    // 注销后重新挂接得到新绑定，游标从 0 开始
    let again = attach_device(Arc::clone(&device)).unwrap();
    assert_eq!(open(again, OpenFlags::RDONLY).unwrap(), again);
    assert_eq!(position(again).unwrap(), 0);
    assert_eq!(attach_device(device).unwrap(), again);
    unregister_device(again);
}

#[test]
fn test_attach_distinct_devices_get_distinct_handles() {
    let a: Arc<dyn BlockIo> = MockBlockIo::new(512, 1);
    let b: Arc<dyn BlockIo> = MockBlockIo::new(512, 1);
    let ha = attach_device(a).unwrap();
    let hb = attach_device(b).unwrap();
    assert_ne!(ha, hb);
    unregister_device(ha);
    unregister_device(hb);
}

#[test]
fn test_local_registry_reuses_slots() {
    let mut registry = DeviceRegistry::new();
    let a = registry.register(MockBlockIo::new(512, 1)).unwrap();
    let b = registry.register(MockBlockIo::new(512, 1)).unwrap();
    assert_eq!(a.raw(), 0);
    assert_eq!(b.raw(), 1);
    assert_eq!(registry.len(), 2);

    assert!(registry.unregister(a));
    assert_eq!(registry.len(), 1);
    let c = registry.register(MockBlockIo::new(512, 1)).unwrap();
    assert_eq!(c, a);
    assert!(!registry.is_empty());
}

#[test]
fn test_open_flags_readable() {
    assert!(OpenFlags::RDONLY.readable());
    assert!(!OpenFlags::WRONLY.readable());
    assert!(OpenFlags::RDWR.readable());
    assert!((OpenFlags::WRONLY | OpenFlags::RDWR).readable());
}

#[test]
fn test_write_only_handle_cannot_read() {
    let (device, handle) = open_mock(512, 4);
    open(handle, OpenFlags::WRONLY).unwrap();
    seek(handle, 100, Whence::Set).unwrap();
    let mut buf = [0xaau8; 16];

    assert_eq!(read(handle, &mut buf), Err(IoError::NotReadable));
    assert_eq!(read(handle, &mut [0u8; 0]), Err(IoError::NotReadable));
    assert!(device.calls().is_empty());
    assert_eq!(buf, [0xaa; 16]);
    assert_eq!(position(handle).unwrap(), 100);

    // 重新以读写方式打开后可以读取
    open(handle, OpenFlags::RDWR).unwrap();
    assert_eq!(read(handle, &mut buf).unwrap(), 16);
    assert_eq!(&buf[..], &expected(0, 16)[..]);
}

#[test]
fn test_xor_buffer() {
    let mut a = [0b1100u8, 0xff, 0x00];
    let b = [0b1010u8, 0x0f, 0x00];
    xor_buffer(&mut a, &b);
    assert_eq!(a, [0b0110, 0xf0, 0x00]);

    let mut out = [0u8; 3];
    xor_buffer_into(&a, &b, &mut out);
    assert_eq!(out, [0b1100, 0xff, 0x00]);
}

#[test]
#[should_panic]
fn test_xor_buffer_length_mismatch_panics() {
    let mut a = [0u8; 4];
    xor_buffer(&mut a, &[0u8; 3]);
}

#[test]
fn test_secure_clear() {
    let mut buf = vec![0xa5u8; 64];
    secure_clear(&mut buf);
    assert!(buf.iter().all(|&b| b == 0));

    let mut spare = Vec::with_capacity(32);
    spare.extend_from_slice(b"key material");
    memclean(spare);
}

#[test]
fn test_scratch_buffer() {
    let scratch = ScratchBuffer::new(1024).unwrap();
    assert_eq!(scratch.len(), 1024);
    assert!(scratch.iter().all(|&b| b == 0));

    assert_eq!(
        ScratchBuffer::new(u64::MAX).err(),
        Some(IoError::OutOfMemory { bytes: u64::MAX })
    );
}

#[test]
fn test_hexdump_logs_lines() {
    let data: Vec<u8> = (0x40..0x58).collect();
    hexdump(Verbosity::Info, &data);

    let output = log_output();
    assert!(output.contains("INFO: 0x00000000 40 41 42 43 44 45 46 47-48 49 4a 4b 4c 4d 4e 4f "));
    assert!(output.contains("INFO: 0x00000010 50 51 52 53 54 55 56 57 "));
}

#[test]
fn test_read_logs_debug_trace() {
    let (_device, handle) = open_mock(512, 2);
    let mut buf = [0u8; 0x20];
    read(handle, &mut buf).unwrap();
    assert!(log_output().contains(&format!("Reading 0x20 bytes from {}", handle)));
}
