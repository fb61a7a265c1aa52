//! Test doubles: a recording register backend, a programmable clock provider, a log
//! recorder and a Tegra board tree.

use crate::dev::{
    clk::{ClockProvider, Hertz},
    driver::ClkError,
    mmio::IoAccess,
};
use alloc::{
    collections::btree_map::BTreeMap,
    format,
    string::String,
    sync::Arc,
    vec::Vec,
};
use dt::{builder::NodeBuilder, node::DeviceTree};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::{Mutex, Once};
use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read { addr: usize, value: u32 },
    Write { addr: usize, value: u32 },
}

/// Register file in a map. Reads return the last written value with the sticky bits of
/// the address set, like status bits latched by hardware.
#[derive(Default)]
pub struct FakeIo {
    regs: Mutex<BTreeMap<usize, u32>>,
    sticky: Mutex<BTreeMap<usize, u32>>,
    ops: Mutex<Vec<IoOp>>,
}

impl FakeIo {
    pub fn new() -> Arc<FakeIo> {
        Arc::new(FakeIo::default())
    }

    /// Last value written to `addr`.
    pub fn value(&self, addr: usize) -> u32 {
        self.regs.lock().get(&addr).copied().unwrap_or(0)
    }

    pub fn set_sticky_bits(&self, addr: usize, bits: u32) {
        self.sticky.lock().insert(addr, bits);
    }

    pub fn ops(&self) -> Vec<IoOp> {
        self.ops.lock().clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                IoOp::Write { addr, value } => Some((addr, value)),
                IoOp::Read { .. } => None,
            })
            .collect()
    }
}

impl IoAccess for FakeIo {
    fn read32(&self, addr: usize) -> u32 {
        let sticky = self.sticky.lock().get(&addr).copied().unwrap_or(0);
        let value = self.value(addr) | sticky;
        self.ops.lock().push(IoOp::Read { addr, value });
        value
    }

    fn write32(&self, addr: usize, value: u32) {
        self.regs.lock().insert(addr, value);
        self.ops.lock().push(IoOp::Write { addr, value });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClkCall {
    Prepare(usize),
    Unprepare(usize),
    Enable(usize),
    Disable(usize),
}

/// Clock provider recording the gating calls that succeeded.
pub struct FakeClock {
    name: &'static str,
    rate: Hertz,
    enable_error: Mutex<Option<ClkError>>,
    calls: Mutex<Vec<ClkCall>>,
}

impl FakeClock {
    pub fn new(name: &'static str, rate: Hertz) -> Arc<FakeClock> {
        Arc::new(FakeClock {
            name,
            rate,
            enable_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Make every later `enable` fail with `err`.
    pub fn fail_enable(&self, err: ClkError) {
        *self.enable_error.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<ClkCall> {
        self.calls.lock().clone()
    }
}

impl ClockProvider for FakeClock {
    fn name(&self) -> &str {
        self.name
    }

    fn prepare(&self, idx: usize) -> Result<(), ClkError> {
        self.calls.lock().push(ClkCall::Prepare(idx));
        Ok(())
    }

    fn unprepare(&self, idx: usize) {
        self.calls.lock().push(ClkCall::Unprepare(idx));
    }

    fn enable(&self, idx: usize) -> Result<(), ClkError> {
        if let Some(err) = *self.enable_error.lock() {
            return Err(err);
        }
        self.calls.lock().push(ClkCall::Enable(idx));
        Ok(())
    }

    fn disable(&self, idx: usize) {
        self.calls.lock().push(ClkCall::Disable(idx));
    }

    fn rate(&self, _idx: usize) -> Hertz {
        self.rate
    }
}

pub const NOR_BASE: usize = 0x7000_9000;
/// Phandle of the clock and reset controller in [tegra_board].
pub const CAR_PHANDLE: u32 = 1;
/// Clock index of the NOR controller in the clock and reset controller.
pub const NOR_CLK: usize = 42;

/// A NOR controller node as found in Tegra20 board files.
pub fn nor_node() -> NodeBuilder {
    NodeBuilder::new("gmi@70009000")
        .prop_strlist("compatible", &["nvidia,tegra20-nor"])
        .prop_u32_list("reg", &[NOR_BASE as u32, 0x1000])
        .prop_u32_list("clocks", &[CAR_PHANDLE, NOR_CLK as u32])
        .prop_u32("#address-cells", 2)
        .prop_u32("#size-cells", 1)
}

/// Root with the clock and reset controller and the given extra nodes.
pub fn tegra_board(nodes: Vec<NodeBuilder>) -> Arc<DeviceTree> {
    let mut root = NodeBuilder::new("")
        .prop_strlist("compatible", &["toradex,colibri_t20", "nvidia,tegra20"])
        .prop_u32("#address-cells", 1)
        .prop_u32("#size-cells", 1)
        .child(NodeBuilder::new("chosen").prop_str("bootargs", "console=ttyS0"))
        .child(
            NodeBuilder::new("clock@60006000")
                .prop_strlist("compatible", &["nvidia,tegra20-car"])
                .prop_u32_list("reg", &[0x6000_6000, 0x1000])
                .prop_u32("#clock-cells", 1)
                .prop_u32("phandle", CAR_PHANDLE),
        );
    for node in nodes {
        root = root.child(node);
    }
    Arc::new(root.build())
}

/// `log` backend keeping every record, tagged with the thread that emitted it so
/// tests running in parallel only see their own output.
pub struct LogCapture {
    records: Mutex<Vec<(ThreadId, Level, String)>>,
}

static CAPTURE: LogCapture = LogCapture {
    records: Mutex::new(Vec::new()),
};
static CAPTURE_INSTALLED: Once<()> = Once::new();

impl LogCapture {
    /// Install the recorder as the logger of the test binary.
    pub fn install() -> &'static LogCapture {
        CAPTURE_INSTALLED.call_once(|| {
            // the test binary installs no other logger
            let _ = log::set_logger(&CAPTURE);
            log::set_max_level(LevelFilter::Trace);
        });
        &CAPTURE
    }

    /// Remove and return the records of the calling thread.
    pub fn take(&self) -> Vec<(Level, String)> {
        let me = thread::current().id();
        let mut records = self.records.lock();
        let (mine, others): (Vec<_>, Vec<_>) = records.drain(..).partition(|(id, _, _)| *id == me);
        *records = others;
        mine.into_iter().map(|(_, level, msg)| (level, msg)).collect()
    }

    /// Messages of the calling thread at exactly `level`.
    pub fn take_at(&self, level: Level) -> Vec<String> {
        self.take()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl Log for LogCapture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let msg = format!("{}", record.args());
        self.records
            .lock()
            .push((thread::current().id(), record.level(), msg));
    }

    fn flush(&self) {}
}
