//! bdio-console: 提供可定制实现的 `print!`、`println!` 与按详细级别过滤的 `log::Log`
//!
//! 诊断消息分为五个严重级别，从最严重到最轻依次为
//! CRITICAL、ERROR、WARNING、INFO、DEBUG。低于全局详细级别的消息直接丢弃，不做格式化。

#![no_std]

pub extern crate log;

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

/// CRITICAL 级别消息使用的 log target
///
/// `log` 只有一个 `Error` 级别，CRITICAL 通过此 target 与普通 ERROR 区分。
pub const CRITICAL_TARGET: &str = "critical";

/// 控制台输出抽象 trait
///
/// 实现者必须提供 `put_char` 方法以输出单个字节。
/// 默认的 `put_str` 实现会逐字节调用 `put_char`。
pub trait Console: Sync {
    /// 输出单个字节
    fn put_char(&self, c: u8);

    /// 输出字符串（默认实现逐字节调用 `put_char`）
    fn put_str(&self, s: &str) {
        for byte in s.bytes() {
            self.put_char(byte);
        }
    }
}

/// 诊断详细级别
///
/// `Quiet` 关闭全部输出；其余取值表示允许输出的最轻严重级别。
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Critical = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
}

impl Verbosity {
    /// 解析级别名称（不区分大小写）
    ///
    /// 接受 `quiet`、`critical`、`error`、`warning`/`warn`、`info`、`debug`，
    /// `trace` 视为 `debug`。
    pub fn parse(name: &str) -> Option<Self> {
        const NAMES: [(&str, Verbosity); 8] = [
            ("quiet", Verbosity::Quiet),
            ("critical", Verbosity::Critical),
            ("error", Verbosity::Error),
            ("warning", Verbosity::Warning),
            ("warn", Verbosity::Warning),
            ("info", Verbosity::Info),
            ("debug", Verbosity::Debug),
            ("trace", Verbosity::Debug),
        ];
        let name = name.trim();
        NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// 消息前缀中使用的级别名
    pub const fn label(self) -> &'static str {
        match self {
            Self::Quiet => "QUIET",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// 由 `log` 记录的级别与 target 推出严重级别
    pub fn of(level: Level, target: &str) -> Self {
        match level {
            Level::Error if target == CRITICAL_TARGET => Self::Critical,
            Level::Error => Self::Error,
            Level::Warn => Self::Warning,
            Level::Info => Self::Info,
            Level::Debug | Level::Trace => Self::Debug,
        }
    }

    fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Off,
            Self::Critical | Self::Error => LevelFilter::Error,
            Self::Warning => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Trace,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Quiet,
            1 => Self::Critical,
            2 => Self::Error,
            3 => Self::Warning,
            4 => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// 全局控制台单例
static CONSOLE: Once<&'static dyn Console> = Once::new();

/// 全局详细级别，初始为 `Quiet`
static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Quiet as u8);

/// 初始化全局控制台单例并注册 logger
///
/// # 参数
/// * `console` - 静态控制台实现引用
///
/// # 行为
/// - 首次调用会设置全局控制台单例
/// - 注册全局 logger，重复注册被忽略
pub fn init_console(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
    let _ = log::set_logger(&Logger);
}

/// 设置全局详细级别
pub fn set_verbosity(verbosity: Verbosity) {
    VERBOSITY.store(verbosity as u8, Ordering::Relaxed);
    log::set_max_level(verbosity.level_filter());
}

/// 当前全局详细级别
pub fn verbosity() -> Verbosity {
    Verbosity::from_u8(VERBOSITY.load(Ordering::Relaxed))
}

/// 以字符串设置全局详细级别
///
/// # 参数
/// * `env` - 级别名称，见 [`Verbosity::parse`]。
///   如果为 `None` 或无法解析，则设置为 `Debug`
pub fn set_log_level(env: Option<&str>) {
    let verbosity = env.and_then(Verbosity::parse).unwrap_or(Verbosity::Debug);
    set_verbosity(verbosity);
}

/// 给定严重级别的消息当前是否会被输出
pub fn enabled(severity: Verbosity) -> bool {
    severity != Verbosity::Quiet && severity <= verbosity()
}

/// 以运行时给定的严重级别输出一条消息
pub fn log_at(severity: Verbosity, args: fmt::Arguments) {
    match severity {
        Verbosity::Quiet => {}
        Verbosity::Critical => log::error!(target: CRITICAL_TARGET, "{}", args),
        Verbosity::Error => log::error!("{}", args),
        Verbosity::Warning => log::warn!("{}", args),
        Verbosity::Info => log::info!("{}", args),
        Verbosity::Debug => log::debug!("{}", args),
    }
}

/// 内部打印函数，供宏使用
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(console) = CONSOLE.get() {
        let mut writer = ConsoleWriter { console: *console };
        let _ = writer.write_fmt(args);
    }
}

/// 控制台写入器，用于格式化输出
struct ConsoleWriter {
    console: &'static dyn Console,
}

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.put_str(s);
        Ok(())
    }
}

/// Logger 实现
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        enabled(Verbosity::of(metadata.level(), metadata.target()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = CONSOLE.get() else {
            return;
        };

        let severity = Verbosity::of(record.level(), record.target());
        let color = match severity {
            Verbosity::Critical => 91,
            Verbosity::Error => 31,
            Verbosity::Warning => 93,
            Verbosity::Info => 34,
            _ => 32,
        };

        // 格式: \x1b[{color}m{LEVEL}: {args}\x1b[0m\n
        let mut writer = ConsoleWriter { console: *console };
        let _ = writeln!(
            writer,
            "\x1b[{}m{}: {}\x1b[0m",
            color,
            severity.label(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// 输出 CRITICAL 级别日志
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        $crate::log::error!(target: $crate::CRITICAL_TARGET, $($arg)+)
    };
}

/// 格式化输出宏（无自动换行）
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::_print(format_args!($($arg)*));
    };
}

/// 格式化输出宏（自动追加换行）
#[macro_export]
macro_rules! println {
    () => {
        $crate::_print(format_args!("\n"));
    };
    ($($arg:tt)*) => {
        {
            $crate::_print(format_args!($($arg)*));
            $crate::_print(format_args!("\n"));
        }
    };
}
