//! Sharded binding table for multi-worker detection
//!
//! Each `observe` runs while holding the shard lock for its address, so the
//! lookup and the conditional insert cannot interleave with another worker
//! observing the same address. The capacity bound is enforced through an
//! admission counter shared by all shards.

use arpguard_core::{Error, MacAddr, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::table::{compare, Binding, BindingStore, Outcome};

/// Cloneable handle to one shared table
#[derive(Debug, Clone)]
pub struct SharedBindingTable {
    bindings: Arc<DashMap<Ipv4Addr, Binding>>,
    admitted: Arc<AtomicUsize>,
    capacity: Option<usize>,
}

impl SharedBindingTable {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            bindings: Arc::new(DashMap::new()),
            admitted: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Reserve room for one more binding
    fn admit(&self) -> Result<()> {
        match self.capacity {
            Some(capacity) => self
                .admitted
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < capacity).then_some(n + 1)
                })
                .map(|_| ())
                .map_err(|_| Error::TableFull { capacity }),
            None => {
                self.admitted.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
        }
    }

    /// `observe` through a shared reference; the trait method delegates here
    pub fn observe_shared(&self, address: Ipv4Addr, hardware: MacAddr) -> Result<Outcome> {
        match self.bindings.entry(address) {
            Entry::Occupied(entry) => Ok(compare(entry.get(), hardware)),
            Entry::Vacant(entry) => {
                self.admit()?;
                entry.insert(Binding::new(hardware));
                Ok(Outcome::NewHost)
            }
        }
    }
}

impl Default for SharedBindingTable {
    fn default() -> Self {
        Self::new(Some(crate::table::DEFAULT_CAPACITY))
    }
}

impl BindingStore for SharedBindingTable {
    fn lookup(&self, address: Ipv4Addr) -> Option<Binding> {
        self.bindings.get(&address).map(|entry| *entry.value())
    }

    fn observe(&mut self, address: Ipv4Addr, hardware: MacAddr) -> Result<Outcome> {
        self.observe_shared(address, hardware)
    }

    fn len(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn snapshot(&self) -> Vec<(Ipv4Addr, Binding)> {
        let mut all: Vec<_> = self
            .bindings
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        all.sort_by_key(|(ip, _)| *ip);
        all
    }
}
