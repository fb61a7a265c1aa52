//! Clock providers and consumers.
//!
//! Providers register under the phandle of their device tree node. Consumers look clocks
//! up through the `clocks`/`clock-names` properties of their own node and get a [Clk],
//! which shares one reference counted core per (provider, index) with every other
//! consumer of the same clock.

use crate::dev::{driver::ClkError, of::FwNode};
use alloc::{collections::btree_map::BTreeMap, sync::Arc};
use spin::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hertz(pub u64);

impl Hertz {
    pub const fn from_khz(khz: u64) -> Hertz {
        Hertz(khz * 1_000)
    }
    pub const fn from_mhz(mhz: u64) -> Hertz {
        Hertz(mhz * 1_000_000)
    }
    pub const fn as_hz(&self) -> u64 {
        self.0
    }
    pub const fn as_khz(&self) -> u64 {
        self.0 / 1_000
    }
}

/// A hardware block producing one or more clocks.
///
/// `prepare`/`unprepare` and `enable`/`disable` are only called on the first and last
/// reference of a clock; the registry does the counting.
pub trait ClockProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Map the specifier cells following the phandle to a clock index.
    fn xlate(&self, args: &[u32]) -> Result<usize, ClkError> {
        Ok(args.first().copied().unwrap_or(0) as usize)
    }
    fn prepare(&self, _idx: usize) -> Result<(), ClkError> {
        Ok(())
    }
    fn unprepare(&self, _idx: usize) {}
    fn enable(&self, idx: usize) -> Result<(), ClkError>;
    fn disable(&self, idx: usize);
    fn rate(&self, idx: usize) -> Hertz;
}

#[derive(Default)]
struct ClkState {
    prepare_count: usize,
    enable_count: usize,
    consumers: usize,
}

pub struct ClkCore {
    provider: Arc<dyn ClockProvider>,
    index: usize,
    state: Mutex<ClkState>,
}

pub struct ClockRegistry {
    providers: RwLock<BTreeMap<u32, Arc<dyn ClockProvider>>>,
    cores: Mutex<BTreeMap<(u32, usize), Arc<ClkCore>>>,
}

impl ClockRegistry {
    pub const fn new() -> ClockRegistry {
        ClockRegistry {
            providers: RwLock::new(BTreeMap::new()),
            cores: Mutex::new(BTreeMap::new()),
        }
    }

    /// Publish `provider` under `phandle` until the returned registration is dropped.
    pub fn register_provider(
        self: &Arc<Self>,
        phandle: u32,
        provider: Arc<dyn ClockProvider>,
    ) -> Result<ProviderRegistration, ClkError> {
        let mut guard = self.providers.write();
        if guard.contains_key(&phandle) {
            return Err(ClkError::DuplicatedProvider);
        }
        debug_ex!("\tRegistered clock provider '{}' (phandle {}).", provider.name(), phandle);
        guard.insert(phandle, provider);
        Ok(ProviderRegistration {
            registry: self.clone(),
            phandle,
        })
    }

    pub fn unregister_provider(&self, phandle: u32) {
        if self.providers.write().remove(&phandle).is_some() {
            self.cores.lock().retain(|(owner, _), _| *owner != phandle);
            debug_ex!("\tUnregistered clock provider (phandle {}).", phandle);
        }
    }

    pub fn has_provider(&self, phandle: u32) -> bool {
        self.providers.read().contains_key(&phandle)
    }

    /// Look up a clock of `consumer`: the first one, or the one listed as `name` in
    /// `clock-names`.
    pub fn get(&self, consumer: &FwNode, name: Option<&str>) -> Result<Clk, ClkError> {
        let index = match name {
            None => 0,
            Some(name) => consumer
                .property("clock-names")
                .and_then(|prop| prop.value_as_strlist().ok())
                .and_then(|names| names.iter().position(|n| *n == name))
                .ok_or(ClkError::NotFound)?,
        };
        let cells = consumer
            .property("clocks")
            .ok_or(ClkError::NotFound)?
            .value_as_u32_list()
            .map_err(|_| ClkError::InvalidSpecifier)?;

        let tree = consumer.tree();
        let mut pos = 0;
        let mut current = 0;
        let (phandle, args) = loop {
            let phandle = *cells.get(pos).ok_or(ClkError::NotFound)?;
            let provider_node = tree
                .get_node_by_phandle(phandle)
                .ok_or(ClkError::InvalidSpecifier)?;
            let nr_cells = tree
                .get_property(provider_node, "#clock-cells")
                .ok_or(ClkError::InvalidSpecifier)?
                .value_as_u32()
                .map_err(|_| ClkError::InvalidSpecifier)? as usize;
            let end = (pos + 1)
                .checked_add(nr_cells)
                .ok_or(ClkError::InvalidSpecifier)?;
            let args = cells.get(pos + 1..end).ok_or(ClkError::InvalidSpecifier)?;
            if current == index {
                break (phandle, args);
            }
            pos = end;
            current += 1;
        };

        let provider = self
            .providers
            .read()
            .get(&phandle)
            .cloned()
            .ok_or(ClkError::ProbeDefer)?;
        let idx = provider.xlate(args)?;
        let core = self
            .cores
            .lock()
            .entry((phandle, idx))
            .or_insert_with(|| {
                Arc::new(ClkCore {
                    provider,
                    index: idx,
                    state: Mutex::new(ClkState::default()),
                })
            })
            .clone();
        core.state.lock().consumers += 1;
        Ok(Clk { core })
    }
}

impl Default for ClockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a provider registered; dropping it unregisters the provider.
pub struct ProviderRegistration {
    registry: Arc<ClockRegistry>,
    phandle: u32,
}

impl Drop for ProviderRegistration {
    fn drop(&mut self) {
        self.registry.unregister_provider(self.phandle);
    }
}

/// A consumer reference to a clock.
pub struct Clk {
    core: Arc<ClkCore>,
}

impl Clk {
    pub fn prepare(&self) -> Result<(), ClkError> {
        let mut state = self.core.state.lock();
        if state.prepare_count == 0 {
            self.core.provider.prepare(self.core.index)?;
        }
        state.prepare_count += 1;
        Ok(())
    }

    pub fn unprepare(&self) {
        let mut state = self.core.state.lock();
        if state.prepare_count == 0 {
            log::warn!("clk {}: unbalanced unprepare", self.name());
            return;
        }
        state.prepare_count -= 1;
        if state.prepare_count == 0 {
            self.core.provider.unprepare(self.core.index);
        }
    }

    pub fn enable(&self) -> Result<(), ClkError> {
        let mut state = self.core.state.lock();
        if state.prepare_count == 0 {
            return Err(ClkError::NotPrepared);
        }
        if state.enable_count == 0 {
            self.core.provider.enable(self.core.index)?;
        }
        state.enable_count += 1;
        Ok(())
    }

    pub fn disable(&self) {
        let mut state = self.core.state.lock();
        if state.enable_count == 0 {
            log::warn!("clk {}: unbalanced disable", self.name());
            return;
        }
        state.enable_count -= 1;
        if state.enable_count == 0 {
            self.core.provider.disable(self.core.index);
        }
    }

    /// Prepare then enable. A failed enable is undone back to the unprepared state.
    pub fn prepare_enable(&self) -> Result<(), ClkError> {
        self.prepare()?;
        if let Err(err) = self.enable() {
            self.unprepare();
            return Err(err);
        }
        Ok(())
    }

    pub fn disable_unprepare(&self) {
        self.disable();
        self.unprepare();
    }

    pub fn rate(&self) -> Hertz {
        self.core.provider.rate(self.core.index)
    }

    pub fn name(&self) -> &str {
        self.core.provider.name()
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_count() > 0
    }

    pub fn enable_count(&self) -> usize {
        self.core.state.lock().enable_count
    }

    pub fn prepare_count(&self) -> usize {
        self.core.state.lock().prepare_count
    }

    /// Live consumer references to this clock.
    pub fn consumers(&self) -> usize {
        self.core.state.lock().consumers
    }
}

impl Clone for Clk {
    fn clone(&self) -> Self {
        self.core.state.lock().consumers += 1;
        Clk {
            core: self.core.clone(),
        }
    }
}

impl Drop for Clk {
    fn drop(&mut self) {
        self.core.state.lock().consumers -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockRegistry, Hertz};
    use crate::{
        dev::{driver::ClkError, of::FwNode},
        testing::{ClkCall, FakeClock},
    };
    use alloc::sync::Arc;
    use dt::builder::NodeBuilder;

    fn consumer() -> FwNode {
        let tree = NodeBuilder::new("")
            .child(
                NodeBuilder::new("car@60006000")
                    .prop_u32("#clock-cells", 1)
                    .prop_u32("phandle", 1),
            )
            .child(NodeBuilder::new("osc").prop_u32("#clock-cells", 0).prop_u32("phandle", 2))
            .child(NodeBuilder::new("nocells").prop_u32("phandle", 4))
            .child(
                NodeBuilder::new("nor@70009000")
                    .prop_u32_list("clocks", &[1, 42, 2])
                    .prop_strlist("clock-names", &["nor", "ref"]),
            )
            .child(NodeBuilder::new("dangling").prop_u32_list("clocks", &[9]))
            .child(NodeBuilder::new("bad").prop_u32_list("clocks", &[4]))
            .child(
                NodeBuilder::new("wide")
                    .prop_u32("#clock-cells", u32::MAX)
                    .prop_u32("phandle", 6),
            )
            .child(NodeBuilder::new("greedy").prop_u32_list("clocks", &[6, 0, 1, 42]))
            .build();
        let tree = Arc::new(tree);
        let id = tree.get_node("/nor@70009000").unwrap().node_id;
        FwNode::new(tree, id)
    }

    fn sibling(node: &FwNode, path: &str) -> FwNode {
        let id = node.tree().get_node(path).unwrap().node_id;
        FwNode::new(node.tree().clone(), id)
    }

    #[test]
    fn lookup_defers_until_provider_registers() {
        let registry = Arc::new(ClockRegistry::new());
        let node = consumer();
        assert_eq!(registry.get(&node, None).err(), Some(ClkError::ProbeDefer));

        let car = FakeClock::new("car", Hertz::from_mhz(216));
        let registration = registry.register_provider(1, car.clone()).unwrap();
        assert_eq!(
            registry.register_provider(1, car.clone()).err(),
            Some(ClkError::DuplicatedProvider)
        );
        let clk = registry.get(&node, None).unwrap();
        assert_eq!(clk.rate(), Hertz(216_000_000));
        assert_eq!(registry.get(&node, Some("ref")).err(), Some(ClkError::ProbeDefer));
        assert_eq!(registry.get(&node, Some("missing")).err(), Some(ClkError::NotFound));

        drop(registration);
        assert!(!registry.has_provider(1));
        assert_eq!(registry.get(&node, Some("nor")).err(), Some(ClkError::ProbeDefer));
    }

    #[test]
    fn malformed_specifiers() {
        let registry = Arc::new(ClockRegistry::new());
        let node = consumer();
        assert_eq!(
            registry.get(&sibling(&node, "/dangling"), None).err(),
            Some(ClkError::InvalidSpecifier)
        );
        assert_eq!(
            registry.get(&sibling(&node, "/bad"), None).err(),
            Some(ClkError::InvalidSpecifier)
        );
        assert_eq!(
            registry.get(&sibling(&node, "/osc"), None).err(),
            Some(ClkError::NotFound)
        );
        // a cell count past the end of the list must not wrap the cursor
        let greedy = sibling(&node, "/greedy");
        assert_eq!(registry.get(&greedy, None).err(), Some(ClkError::InvalidSpecifier));
    }

    #[test]
    fn gating_is_reference_counted() {
        let registry = Arc::new(ClockRegistry::new());
        let node = consumer();
        let car = FakeClock::new("car", Hertz::from_khz(32));
        let _registration = registry.register_provider(1, car.clone()).unwrap();

        let a = registry.get(&node, Some("nor")).unwrap();
        let b = registry.get(&node, None).unwrap();
        assert_eq!(a.consumers(), 2);
        assert_eq!(a.enable(), Err(ClkError::NotPrepared));

        a.prepare_enable().unwrap();
        b.prepare_enable().unwrap();
        assert_eq!(a.enable_count(), 2);
        a.disable_unprepare();
        assert!(b.is_enabled());
        b.disable_unprepare();
        b.disable();
        assert_eq!(
            car.calls(),
            vec![
                ClkCall::Prepare(42),
                ClkCall::Enable(42),
                ClkCall::Disable(42),
                ClkCall::Unprepare(42)
            ]
        );
    }

    #[test]
    fn failed_enable_is_unprepared() {
        let registry = Arc::new(ClockRegistry::new());
        let node = consumer();
        let car = FakeClock::new("car", Hertz(0));
        car.fail_enable(ClkError::Failed(-5));
        let _registration = registry.register_provider(1, car.clone()).unwrap();

        let clk = registry.get(&node, None).unwrap();
        assert_eq!(clk.prepare_enable(), Err(ClkError::Failed(-5)));
        assert_eq!(clk.prepare_count(), 0);
        assert_eq!(car.calls(), vec![ClkCall::Prepare(42), ClkCall::Unprepare(42)]);
    }

    #[test]
    fn dropping_a_consumer_keeps_the_clock_running() {
        let registry = Arc::new(ClockRegistry::new());
        let node = consumer();
        let car = FakeClock::new("car", Hertz(0));
        let _registration = registry.register_provider(1, car.clone()).unwrap();

        let clk = registry.get(&node, None).unwrap();
        clk.prepare_enable().unwrap();
        let copy = clk.clone();
        assert_eq!(clk.consumers(), 2);
        drop(clk);
        assert_eq!(copy.consumers(), 1);
        drop(copy);

        let again = registry.get(&node, None).unwrap();
        assert!(again.is_enabled());
        assert_eq!(again.consumers(), 1);
        assert_eq!(car.calls(), vec![ClkCall::Prepare(42), ClkCall::Enable(42)]);
    }
}
