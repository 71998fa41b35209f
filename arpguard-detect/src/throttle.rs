//! Duplicate alert suppression

use arpguard_core::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

type AlertKey = (Ipv4Addr, MacAddr, MacAddr);

/// Upper bound on remembered alerts. Past it, alerts still fire but are
/// not recorded for suppression.
pub const MAX_TRACKED: usize = 4096;

/// Remembers when each (address, previous, observed) alert last fired
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    window: Duration,
    last_fired: HashMap<AlertKey, Instant>,
    next_prune: Option<Instant>,
}

impl AlertThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
            next_prune: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if the alert should be emitted, recording it as fired.
    ///
    /// Expired records are swept at most once per window, so the map only
    /// holds alerts fired within the last two windows.
    pub fn permit(
        &mut self,
        address: Ipv4Addr,
        previous: MacAddr,
        observed: MacAddr,
        now: Instant,
    ) -> bool {
        let key = (address, previous, observed);
        if let Some(fired) = self.last_fired.get(&key) {
            if now.saturating_duration_since(*fired) < self.window {
                return false;
            }
        }

        if self.next_prune.map_or(true, |at| now >= at) {
            self.prune(now);
            self.next_prune = Some(now + self.window);
        }

        if self.last_fired.len() < MAX_TRACKED || self.last_fired.contains_key(&key) {
            self.last_fired.insert(key, now);
        }
        true
    }

    /// Drop records whose window has passed
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_fired
            .retain(|_, fired| now.saturating_duration_since(*fired) < window);
    }

    pub fn tracked(&self) -> usize {
        self.last_fired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
    const AA: MacAddr = MacAddr::new([0xAA; 6]);
    const BB: MacAddr = MacAddr::new([0xBB; 6]);
    const CC: MacAddr = MacAddr::new([0xCC; 6]);

    #[test]
    fn test_suppresses_within_window() {
        let mut throttle = AlertThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(throttle.permit(IP, AA, BB, t0));
        assert!(!throttle.permit(IP, AA, BB, t0 + Duration::from_secs(3)));
        assert!(!throttle.permit(IP, AA, BB, t0 + Duration::from_secs(9)));
        assert!(throttle.permit(IP, AA, BB, t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_distinct_claims_not_suppressed() {
        let mut throttle = AlertThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(throttle.permit(IP, AA, BB, t0));
        assert!(throttle.permit(IP, AA, CC, t0));
        assert!(throttle.permit(Ipv4Addr::new(10, 0, 0, 6), AA, BB, t0));
        assert_eq!(throttle.tracked(), 3);
    }

    #[test]
    fn test_prune() {
        let mut throttle = AlertThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();
        throttle.permit(IP, AA, BB, t0);
        throttle.permit(IP, AA, CC, t0 + Duration::from_millis(1500));

        throttle.prune(t0 + Duration::from_secs(2));
        assert_eq!(throttle.tracked(), 1);
    }

    #[test]
    fn test_expired_records_swept_on_permit() {
        let mut throttle = AlertThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now() + Duration::from_secs(3600);

        for i in 0..1000u32 {
            let [a, b, c, d] = i.to_be_bytes();
            let observed = MacAddr::new([0x02, 0, a, b, c, d]);
            assert!(throttle.permit(IP, AA, observed, t0 + Duration::from_secs(u64::from(i))));
        }

        // only alerts from the last two windows survive
        assert!(throttle.tracked() <= 61, "tracked {}", throttle.tracked());
    }

    #[test]
    fn test_tracking_is_capped() {
        let mut throttle = AlertThrottle::new(Duration::from_secs(3600));
        let t0 = Instant::now();

        for i in 0..(MAX_TRACKED as u32 + 100) {
            let [a, b, c, d] = i.to_be_bytes();
            assert!(throttle.permit(IP, AA, MacAddr::new([0x02, 0, a, b, c, d]), t0));
        }

        assert_eq!(throttle.tracked(), MAX_TRACKED);
        // recorded claims are still suppressed
        assert!(!throttle.permit(IP, AA, MacAddr::new([0x02, 0, 0, 0, 0, 0]), t0));
    }
}
