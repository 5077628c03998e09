use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use adapter::{Endpoint, ExtendedAddress, ShortAddress};

use crate::network::NetworkConfiguration;
use crate::zdo::{LogicalType, MacCapabilities, PowerDescriptor, SimpleDescriptor};
use crate::Result;

pub const COORDINATOR_ADDRESS: ShortAddress = 0x0000;

/// A node whose capabilities are known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub ieee_address: ExtendedAddress,
    pub short_address: ShortAddress,
    pub logical_type: LogicalType,
    pub mac_capabilities: MacCapabilities,
    pub manufacturer_code: u16,
    pub power_descriptor: Option<PowerDescriptor>,
    pub endpoints: BTreeMap<Endpoint, SimpleDescriptor>,
}

impl Node {
    pub fn coordinator(configuration: &NetworkConfiguration) -> Self {
        Self {
            ieee_address: configuration.ieee_address,
            short_address: COORDINATOR_ADDRESS,
            logical_type: LogicalType::Coordinator,
            mac_capabilities: MacCapabilities(0x8F),
            manufacturer_code: 0,
            power_descriptor: None,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.short_address == COORDINATOR_ADDRESS
    }
}

/// Initialized nodes, keyed by IEEE address with an index on the current short address.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: HashMap<ExtendedAddress, Node>,
    by_short: HashMap<ShortAddress, ExtendedAddress>,
}

impl NodeTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts or replaces a node, returning the previous entry.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        let previous = self.remove(node.ieee_address);
        // Short addresses are reused after a node leaves.
        if let Some(stale) = self.by_short.insert(node.short_address, node.ieee_address) {
            if stale != node.ieee_address {
                debug!(
                    "short address {:#06x} moved from {:#018x} to {:#018x}",
                    node.short_address, stale, node.ieee_address
                );
            }
        }
        self.nodes.insert(node.ieee_address, node);
        previous
    }

    pub fn remove(&mut self, ieee_address: ExtendedAddress) -> Option<Node> {
        let node = self.nodes.remove(&ieee_address)?;
        if self.by_short.get(&node.short_address) == Some(&ieee_address) {
            self.by_short.remove(&node.short_address);
        }
        Some(node)
    }

    pub fn get(&self, ieee_address: ExtendedAddress) -> Option<&Node> {
        self.nodes.get(&ieee_address)
    }

    pub fn by_short(&self, short_address: ShortAddress) -> Option<&Node> {
        self.by_short
            .get(&short_address)
            .and_then(|ieee_address| self.nodes.get(ieee_address))
    }

    /// Records that a known node now uses `short_address`.
    pub fn update_short_address(&mut self, ieee_address: ExtendedAddress, short_address: ShortAddress) {
        if let Some(node) = self.nodes.get_mut(&ieee_address) {
            if self.by_short.get(&node.short_address) == Some(&ieee_address) {
                self.by_short.remove(&node.short_address);
            }
            node.short_address = short_address;
            self.by_short.insert(short_address, ieee_address);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_short.clear();
    }
}

/// Persistence for nodes and the network they belong to.
pub trait NodeStore: Send {
    fn load_nodes(&mut self) -> Result<Vec<Node>>;

    fn node_added(&mut self, node: &Node) -> Result<()>;

    fn node_removed(&mut self, ieee_address: ExtendedAddress) -> Result<()>;

    fn load_network(&mut self) -> Result<Option<NetworkConfiguration>>;

    fn save_network(&mut self, configuration: &NetworkConfiguration) -> Result<()>;

    /// Forgets everything, for a factory reset.
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct Stored {
    nodes: BTreeMap<ExtendedAddress, Node>,
    network: Option<NetworkConfiguration>,
}

/// A `NodeStore` that lives as long as the process. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    stored: Arc<Mutex<Stored>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, Stored> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_network(self, configuration: NetworkConfiguration) -> Self {
        self.lock().network = Some(configuration);
        self
    }

    pub fn with_node(self, node: Node) -> Self {
        self.lock().nodes.insert(node.ieee_address, node);
        self
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.lock().nodes.values().cloned().collect()
    }

    pub fn network(&self) -> Option<NetworkConfiguration> {
        self.lock().network.clone()
    }
}

impl NodeStore for MemoryStore {
    fn load_nodes(&mut self) -> Result<Vec<Node>> {
        Ok(self.nodes())
    }

    fn node_added(&mut self, node: &Node) -> Result<()> {
        self.lock().nodes.insert(node.ieee_address, node.clone());
        Ok(())
    }

    fn node_removed(&mut self, ieee_address: ExtendedAddress) -> Result<()> {
        self.lock().nodes.remove(&ieee_address);
        Ok(())
    }

    fn load_network(&mut self) -> Result<Option<NetworkConfiguration>> {
        Ok(self.network())
    }

    fn save_network(&mut self, configuration: &NetworkConfiguration) -> Result<()> {
        self.lock().network = Some(configuration.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        *self.lock() = Stored::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(ieee_address: ExtendedAddress, short_address: ShortAddress) -> Node {
        Node {
            ieee_address,
            short_address,
            logical_type: LogicalType::EndDevice,
            mac_capabilities: MacCapabilities(0x80),
            manufacturer_code: 0x115F,
            power_descriptor: None,
            endpoints: BTreeMap::new(),
        }
    }

    #[test]
    fn looks_up_by_short_address() {
        let mut table = NodeTable::new();
        table.insert(node(0xA, 0x1111));
        assert_eq!(table.by_short(0x1111).unwrap().ieee_address, 0xA);

        table.update_short_address(0xA, 0x2222);
        assert!(table.by_short(0x1111).is_none());
        assert_eq!(table.by_short(0x2222).unwrap().ieee_address, 0xA);
    }

    #[test]
    fn reused_short_address_points_at_newest_node() {
        let mut table = NodeTable::new();
        table.insert(node(0xA, 0x1111));
        table.insert(node(0xB, 0x1111));
        assert_eq!(table.by_short(0x1111).unwrap().ieee_address, 0xB);

        // Removing the old owner must not drop the new mapping.
        table.remove(0xA);
        assert_eq!(table.by_short(0x1111).unwrap().ieee_address, 0xB);
    }

    #[test]
    fn memory_store_clones_share_contents() {
        let store = MemoryStore::new();
        let mut handle = store.clone();
        handle.node_added(&node(0xA, 0x1111)).unwrap();
        handle
            .save_network(&NetworkConfiguration::default())
            .unwrap();

        assert_eq!(store.nodes().len(), 1);
        assert!(store.network().is_some());

        handle.clear().unwrap();
        assert!(store.nodes().is_empty());
        assert!(store.network().is_none());
    }
}
