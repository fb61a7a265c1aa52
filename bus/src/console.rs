use core::fmt::{Arguments, Error, Write};
use spin::Once;

/// Byte sink the console forwards formatted text to, e.g. a UART or a firmware call.
pub trait ConsoleSink: Sync {
    fn write_str(&self, s: &str) -> Result<(), Error>;
}

static SINK: Once<&'static dyn ConsoleSink> = Once::new();

/// Install the console output. Only the first call takes effect.
pub fn set_sink(sink: &'static dyn ConsoleSink) -> bool {
    let mut installed = false;
    SINK.call_once(|| {
        installed = true;
        sink
    });
    installed
}

struct SerialOut;

impl Write for SerialOut {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        match SINK.get() {
            Some(sink) => sink.write_str(s),
            None => Ok(()),
        }
    }
}

pub fn serial_print(args: Arguments) {
    // nowhere left to report a failing console
    let _ = SerialOut.write_fmt(args);
}

#[macro_export]
/// print string macro
macro_rules! kserial_print {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::serial_print(format_args!($fmt $(, $($arg)+)?));
    }
}

#[macro_export]
macro_rules! kserial_println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::serial_print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));   // Use LF instead of CR-LF
    }
}
