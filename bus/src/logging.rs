use log::{Level, LevelFilter, Log, Metadata, Record, set_logger, set_max_level};
use num_enum::TryFromPrimitive;

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 20,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        kserial_println!(
            "\u{1B}[{}m[{:}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

/// Numeric log levels as written in `flags.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(usize)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Maximum level selected by the `LOG_LEVEL` build flag. Out-of-range values mean `Trace`.
pub fn configured_level() -> LevelFilter {
    LogLevel::try_from(config::LOG_LEVEL)
        .map(LevelFilter::from)
        .unwrap_or(LevelFilter::Trace)
}

#[macro_export]
/// Trigger panic during initialization
macro_rules! panic_init {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        panic!(
            concat!("An unexpected error occurred during platform initialization:\n\t",$fmt)
             $(, $($arg)+)?)
    }
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::log::log!(target: $target, $crate::log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::log::log!($crate::log::Level::Debug, $($arg)+)
        }
    }
}

/// Log at error level, prefixed with the device name.
#[macro_export]
macro_rules! dev_err {
    ($dev: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $crate::log::error!(concat!("{}: ", $fmt), $dev.name $(, $($arg)+)?)
    }
}

/// Log at warn level, prefixed with the device name.
#[macro_export]
macro_rules! dev_warn {
    ($dev: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $crate::log::warn!(concat!("{}: ", $fmt), $dev.name $(, $($arg)+)?)
    }
}

/// Log at info level, prefixed with the device name.
#[macro_export]
macro_rules! dev_info {
    ($dev: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $crate::log::info!(concat!("{}: ", $fmt), $dev.name $(, $($arg)+)?)
    }
}

/// Debug-build-only device message.
#[macro_export]
macro_rules! dev_dbg {
    ($dev: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $crate::debug_ex!(concat!("{}: ", $fmt), $dev.name $(, $($arg)+)?)
    }
}

/// Install [Logger] as the `log` backend.
pub fn init() {
    static LOGGER: Logger = Logger;
    set_logger(&LOGGER).unwrap_or_else(|err| panic_init!("Error initializing logger: {:?}", err));
    set_max_level(configured_level());
}

#[cfg(test)]
mod tests {
    use super::LogLevel;
    use log::LevelFilter;

    #[test]
    fn numeric_levels_map_to_filters() {
        assert_eq!(LevelFilter::from(LogLevel::try_from(1usize).unwrap()), LevelFilter::Error);
        assert_eq!(LevelFilter::from(LogLevel::try_from(4usize).unwrap()), LevelFilter::Debug);
        assert!(LogLevel::try_from(9usize).is_err());
    }
}
