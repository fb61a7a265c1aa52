//! `fixed-clock`: an always running oscillator described by the device tree.

use crate::dev::{
    Device,
    clk::{ClockProvider, Hertz},
    driver::{ClkError, Driver, DriverProbeError},
    handle::Handle,
    platform::Platform,
};
use alloc::{boxed::Box, sync::Arc};

pub struct FixedClock {
    name: Box<str>,
    rate: Hertz,
}

impl ClockProvider for FixedClock {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable(&self, _idx: usize) -> Result<(), ClkError> {
        Ok(())
    }

    fn disable(&self, _idx: usize) {}

    fn rate(&self, _idx: usize) -> Hertz {
        self.rate
    }
}

#[derive(Debug)]
pub struct FixedClockDriver;

impl Driver for FixedClockDriver {
    fn get_name(&self) -> &'static str {
        "fixed-clock"
    }

    fn get_comp_strs(&self) -> &'static [&'static str] {
        &["fixed-clock"]
    }

    fn probe(&self, platform: &Platform, dev: &Handle<Device>) -> Result<(), DriverProbeError> {
        let node = dev.node.as_ref().ok_or(DriverProbeError::Customized {
            info: "fixed-clock without a device tree node",
        })?;
        let phandle = node.phandle().ok_or(DriverProbeError::Customized {
            info: "fixed-clock is not referenced by a phandle",
        })?;
        let rate = node
            .property("clock-frequency")
            .and_then(|prop| prop.value_as_u32().ok())
            .ok_or(DriverProbeError::Customized {
                info: "missing or malformed clock-frequency",
            })?;
        let name = node
            .property("clock-output-names")
            .and_then(|prop| prop.value_as_str().ok())
            .unwrap_or(node.node().node_name.as_ref());

        let provider = FixedClock {
            name: Box::from(name),
            rate: Hertz(rate as u64),
        };
        let registration = platform
            .clocks()
            .register_provider(phandle, Arc::new(provider))?;
        dev.add_resource(registration);
        dev_dbg!(dev, "{} Hz", rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FixedClockDriver;
    use crate::{
        dev::{
            clk::Hertz,
            driver::{ClkError, DriverProbeError},
            of::FwNode,
            platform::Platform,
        },
        testing::FakeIo,
    };
    use alloc::sync::Arc;
    use dt::builder::NodeBuilder;

    fn platform() -> Platform {
        let tree = NodeBuilder::new("")
            .child(
                NodeBuilder::new("clk32k")
                    .prop_strlist("compatible", &["fixed-clock"])
                    .prop_u32("#clock-cells", 0)
                    .prop_u32("clock-frequency", 32768)
                    .prop_str("clock-output-names", "rtc-32k")
                    .prop_u32("phandle", 3),
            )
            .child(
                NodeBuilder::new("broken")
                    .prop_strlist("compatible", &["fixed-clock"])
                    .prop_u32("#clock-cells", 0)
                    .prop_u32("phandle", 4),
            )
            .child(NodeBuilder::new("uart").prop_u32_list("clocks", &[3]))
            .build();
        let platform = Platform::new(Arc::new(tree), FakeIo::new());
        platform.register_driver(Arc::new(FixedClockDriver));
        platform
    }

    #[test]
    fn provider_lives_with_the_device() {
        let platform = platform();
        platform.default_populate().unwrap();
        let dev = platform.find_device("clk32k").unwrap();
        assert_eq!(dev.driver(), Some("fixed-clock"));

        let tree = platform.tree().clone();
        let uart = FwNode::new(tree.clone(), tree.get_node("/uart").unwrap().node_id);
        let clk = platform.clocks().get(&uart, None).unwrap();
        assert_eq!(clk.rate(), Hertz(32768));
        assert_eq!(clk.name(), "rtc-32k");
        assert_eq!(clk.prepare_enable(), Ok(()));

        platform.remove_device(&dev);
        assert_eq!(platform.clocks().get(&uart, None).err(), Some(ClkError::ProbeDefer));
    }

    #[test]
    fn frequency_is_required() {
        let platform = platform();
        platform.default_populate().unwrap();
        let dev = platform.find_device("broken").unwrap();
        assert_eq!(dev.driver(), None);
        assert!(matches!(
            platform.probe_device(&dev),
            Err(DriverProbeError::Customized { .. })
        ));
    }
}
