mod config;
mod image;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bdio_console::{init_console, set_verbosity, Console};
use clap::{Args, Parser, Subcommand};
use sector_io::{
    attach_device, close, hexdump_lines, open, read, seek, unregister_device, xor_buffer,
    BlockIo, Handle, MediaId, OpenFlags, Whence,
};

use config::Config;
use image::ImageBlockIo;

#[derive(Parser)]
#[command(about = "Read disk images through the sector-aligned byte stream")]
struct Cli {
    /// Configuration file (defaults to bdio.toml at the workspace root)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Diagnostic verbosity: quiet, critical, error, warning, info or debug
    #[arg(long, short, global = true, value_name = "LEVEL")]
    verbosity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the media geometry of an image
    Info(DeviceArgs),
    /// Hex dump a byte range of an image
    Dump(DumpArgs),
    /// Hex dump the XOR of the same byte range of two images
    Xor(XorArgs),
}

#[derive(Args)]
struct DeviceArgs {
    /// Disk image used as the block device
    image: PathBuf,

    /// Bytes per sector
    #[arg(long)]
    sector_size: Option<u32>,

    /// Media identifier passed to every block read
    #[arg(long)]
    media_id: Option<u32>,
}

#[derive(Args)]
struct RangeArgs {
    /// Byte offset to seek to before reading
    #[arg(long, default_value_t = 0)]
    offset: i64,

    /// Number of bytes to read
    #[arg(long, default_value_t = 512)]
    count: usize,
}

#[derive(Args)]
struct DumpArgs {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    range: RangeArgs,
}

#[derive(Args)]
struct XorArgs {
    #[command(flatten)]
    device: DeviceArgs,

    /// Second disk image
    other: PathBuf,

    #[command(flatten)]
    range: RangeArgs,
}

/// 日志输出到 stderr，stdout 只留给转储结果
struct StderrConsole;

impl Console for StderrConsole {
    fn put_char(&self, c: u8) {
        let _ = std::io::stderr().write_all(&[c]);
    }

    fn put_str(&self, s: &str) {
        let _ = std::io::stderr().write_all(s.as_bytes());
    }
}

static CONSOLE: StderrConsole = StderrConsole;

/// 打开的镜像：注册表句柄与设备本身
struct Stream {
    handle: Handle,
    device: Arc<ImageBlockIo>,
}

impl Stream {
    fn open(path: &Path, device: &DeviceArgs, config: &Config) -> Result<Self> {
        let sector_size = config.sector_size(device.sector_size);
        let media_id = MediaId(config.media_id(device.media_id));
        let device = Arc::new(ImageBlockIo::open(path, sector_size, media_id)?);
        let handle = attach_device(device.clone())?;
        // 无法打开的设备在这里终止整个命令
        let handle = open(handle, OpenFlags::RDONLY)?;
        Ok(Self { handle, device })
    }

    fn read_range(&self, range: &RangeArgs) -> Result<Vec<u8>> {
        seek(self.handle, range.offset, Whence::Set)?;
        let mut buf = read_buffer(range.count)?;
        read(self.handle, &mut buf)
            .with_context(|| format!("cannot read {} bytes at {:#x}", range.count, range.offset))?;
        Ok(buf)
    }
}

/// 分配 `count` 字节的零填充缓冲区，分配失败时报错而不是终止进程
fn read_buffer(count: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(count)
        .map_err(|_| anyhow!("cannot allocate {count} bytes for the read buffer"))?;
    buf.resize(count, 0);
    Ok(buf)
}

impl Drop for Stream {
    fn drop(&mut self) {
        close(self.handle);
        unregister_device(self.handle);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    init_console(&CONSOLE);
    set_verbosity(config.verbosity(cli.verbosity.as_deref())?);

    match cli.command {
        Command::Info(args) => info(&args, &config),
        Command::Dump(args) => dump(&args, &config),
        Command::Xor(args) => xor(&args, &config),
    }
}

fn info(args: &DeviceArgs, config: &Config) -> Result<()> {
    let stream = Stream::open(&args.image, args, config)?;
    let media = stream.device.media();
    println!("image:       {}", args.image.display());
    println!("bytes:       {}", stream.device.len());
    println!("media id:    {}", media.media_id.0);
    println!("sector size: {}", media.block_size);
    println!("last block:  {}", media.last_block);
    println!("read only:   {}", media.read_only);
    Ok(())
}

fn dump(args: &DumpArgs, config: &Config) -> Result<()> {
    let stream = Stream::open(&args.device.image, &args.device, config)?;
    let data = stream.read_range(&args.range)?;
    print_hex(&data);
    Ok(())
}

fn xor(args: &XorArgs, config: &Config) -> Result<()> {
    let first = Stream::open(&args.device.image, &args.device, config)?;
    let second = Stream::open(&args.other, &args.device, config)?;
    let mut data = first.read_range(&args.range)?;
    xor_buffer(&mut data, &second.read_range(&args.range)?);
    print_hex(&data);
    Ok(())
}

fn print_hex(data: &[u8]) {
    for line in hexdump_lines(data) {
        println!("{line}");
    }
}
