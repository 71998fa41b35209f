//! Binding table: IPv4 address to hardware address
//!
//! The first hardware address seen for an address is authoritative for the
//! lifetime of the table. A later claim for a different hardware address is
//! reported, never stored, so a stream of forged replies can neither replace
//! the real binding nor silence the alerts that follow it.

use arpguard_core::{Error, MacAddr, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::SystemTime;

/// Bound used when none is configured
pub const DEFAULT_CAPACITY: usize = 256;

/// A recorded binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub hardware: MacAddr,
    /// When the binding was admitted; informational only, nothing expires
    pub first_seen: SystemTime,
}

impl Binding {
    pub fn new(hardware: MacAddr) -> Self {
        Self {
            hardware,
            first_seen: SystemTime::now(),
        }
    }
}

/// Result of observing a sender pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First time this address was seen; binding admitted
    NewHost,
    /// Same hardware address as recorded; table untouched
    Refresh,
    /// A different hardware address claims an already bound address
    SpoofSuspected { previous: MacAddr, observed: MacAddr },
}

/// Storage behind the detection engine.
///
/// `observe` must behave as one atomic step per address: two conflicting
/// first observations may not both come back as `NewHost`.
pub trait BindingStore {
    /// Current binding for `address`
    fn lookup(&self, address: Ipv4Addr) -> Option<Binding>;

    /// Record or check a sender pair. Fails with `Error::TableFull` when a
    /// new address cannot be admitted.
    fn observe(&mut self, address: Ipv4Addr, hardware: MacAddr) -> Result<Outcome>;

    /// Number of bindings held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of bindings, `None` when unbounded
    fn capacity(&self) -> Option<usize>;

    /// Copy of every binding, sorted by address
    fn snapshot(&self) -> Vec<(Ipv4Addr, Binding)>;
}

/// Single-owner binding table
#[derive(Debug, Clone)]
pub struct BindingTable {
    bindings: HashMap<Ipv4Addr, Binding>,
    capacity: Option<usize>,
}

impl BindingTable {
    /// Table holding at most `capacity` bindings, or unbounded for `None`
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            bindings: HashMap::with_capacity(
                capacity.map_or(DEFAULT_CAPACITY, |c| c.min(DEFAULT_CAPACITY)),
            ),
            capacity,
        }
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Iterate over bindings in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &Binding)> {
        self.bindings.iter()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::bounded(DEFAULT_CAPACITY)
    }
}

impl BindingStore for BindingTable {
    fn lookup(&self, address: Ipv4Addr) -> Option<Binding> {
        self.bindings.get(&address).copied()
    }

    fn observe(&mut self, address: Ipv4Addr, hardware: MacAddr) -> Result<Outcome> {
        if let Some(existing) = self.bindings.get(&address) {
            return Ok(compare(existing, hardware));
        }

        if let Some(capacity) = self.capacity {
            if self.bindings.len() >= capacity {
                return Err(Error::TableFull { capacity });
            }
        }

        self.bindings.insert(address, Binding::new(hardware));
        Ok(Outcome::NewHost)
    }

    fn len(&self) -> usize {
        self.bindings.len()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn snapshot(&self) -> Vec<(Ipv4Addr, Binding)> {
        let mut all: Vec<_> = self.bindings.iter().map(|(ip, b)| (*ip, *b)).collect();
        all.sort_by_key(|(ip, _)| *ip);
        all
    }
}

/// Classify a claim against an existing binding
pub(crate) fn compare(existing: &Binding, hardware: MacAddr) -> Outcome {
    if existing.hardware == hardware {
        Outcome::Refresh
    } else {
        Outcome::SpoofSuspected {
            previous: existing.hardware,
            observed: hardware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AA: MacAddr = MacAddr::new([0xAA; 6]);
    const BB: MacAddr = MacAddr::new([0xBB; 6]);

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[test]
    fn test_new_host_admission() {
        let mut table = BindingTable::default();
        assert!(table.lookup(ip(5)).is_none());

        assert_eq!(table.observe(ip(5), AA).unwrap(), Outcome::NewHost);
        assert_eq!(table.lookup(ip(5)).map(|b| b.hardware), Some(AA));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut table = BindingTable::default();
        table.observe(ip(5), AA).unwrap();
        let before = table.lookup(ip(5)).unwrap();

        for _ in 0..10 {
            assert_eq!(table.observe(ip(5), AA).unwrap(), Outcome::Refresh);
        }

        assert_eq!(table.lookup(ip(5)), Some(before));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_writer_wins() {
        let mut table = BindingTable::default();
        table.observe(ip(5), AA).unwrap();

        assert_eq!(
            table.observe(ip(5), BB).unwrap(),
            Outcome::SpoofSuspected {
                previous: AA,
                observed: BB
            }
        );
        // repeated forged claims keep alerting and never replace the binding
        assert_eq!(
            table.observe(ip(5), BB).unwrap(),
            Outcome::SpoofSuspected {
                previous: AA,
                observed: BB
            }
        );
        assert_eq!(table.lookup(ip(5)).unwrap().hardware, AA);
    }

    #[test]
    fn test_capacity_bound() {
        let mut table = BindingTable::bounded(3);
        for last in 1..=3 {
            assert_eq!(table.observe(ip(last), AA).unwrap(), Outcome::NewHost);
        }

        assert!(matches!(
            table.observe(ip(4), AA),
            Err(Error::TableFull { capacity: 3 })
        ));
        assert_eq!(table.len(), 3);
        assert!(table.lookup(ip(4)).is_none());

        // known addresses are still checked when full
        assert_eq!(table.observe(ip(1), AA).unwrap(), Outcome::Refresh);
        assert!(matches!(
            table.observe(ip(2), BB).unwrap(),
            Outcome::SpoofSuspected { .. }
        ));
    }

    #[test]
    fn test_unbounded() {
        let mut table = BindingTable::unbounded();
        assert_eq!(table.capacity(), None);
        for last in 0..=255 {
            table.observe(ip(last), AA).unwrap();
        }
        table.observe(Ipv4Addr::new(10, 0, 1, 0), AA).unwrap();
        assert_eq!(table.len(), 257);
    }

    #[test]
    fn test_huge_bound_allocates_lazily() {
        let mut table = BindingTable::bounded(usize::MAX);
        assert_eq!(table.capacity(), Some(usize::MAX));
        assert_eq!(table.observe(ip(5), AA).unwrap(), Outcome::NewHost);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted() {
        let mut table = BindingTable::default();
        table.observe(ip(9), BB).unwrap();
        table.observe(ip(2), AA).unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, ip(2));
        assert_eq!(snapshot[1].1.hardware, BB);
    }
}
