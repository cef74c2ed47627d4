//! Diagnostic reply cache
//!
//! Holds the latest reply per originator. Writes overwrite, reads are
//! preceded by age-based eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::DiagTlv;

/// Default age after which a cached reply is dropped (3 seconds)
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(3);

/// Key used for replies that carried no short address
pub const PLACEHOLDER_KEY: &str = "0xffee";

/// Originator key for a short address, e.g. `0x1200`
#[must_use]
pub fn originator_key(rloc16: u16) -> String {
    format!("{rloc16:#06x}")
}

/// Latest reply from one originator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub entries: Vec<DiagTlv>,
    pub received_at: Instant,
}

/// Last-writer-wins map from originator key to reply
#[derive(Debug)]
pub struct DiagnosticCache {
    records: HashMap<String, DiagnosticRecord>,
    reset_timeout: Duration,
}

impl Default for DiagnosticCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_TIMEOUT)
    }
}

impl DiagnosticCache {
    #[must_use]
    pub fn new(reset_timeout: Duration) -> Self {
        Self {
            records: HashMap::new(),
            reset_timeout,
        }
    }

    /// Insert or replace the record for `key`
    pub fn put(&mut self, key: impl Into<String>, entries: Vec<DiagTlv>, now: Instant) {
        self.records.insert(
            key.into(),
            DiagnosticRecord {
                entries,
                received_at: now,
            },
        );
    }

    /// Drop every record at least `reset_timeout` old, returning how many went
    pub fn evict(&mut self, now: Instant) -> usize {
        let before = self.records.len();
        let ttl = self.reset_timeout;
        self.records
            .retain(|_, record| now.saturating_duration_since(record.received_at) < ttl);
        before - self.records.len()
    }

    /// Entry lists of every held record, in no particular order
    #[must_use]
    pub fn snapshot(&self) -> Vec<&[DiagTlv]> {
        self.records.values().map(|r| r.entries.as_slice()).collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DiagnosticRecord> {
        self.records.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert_eq!(originator_key(0x1200), "0x1200");
        assert_eq!(originator_key(0x0400), "0x0400");
        assert_eq!(originator_key(0x0001), "0x0001");
    }

    #[test]
    fn record_survives_until_threshold() {
        let t0 = Instant::now();
        let mut cache = DiagnosticCache::new(Duration::from_secs(3));
        cache.put("0x1200", vec![DiagTlv::ShortAddress(0x1200)], t0);

        assert_eq!(cache.evict(t0 + Duration::from_millis(2999)), 0);
        assert_eq!(cache.snapshot().len(), 1);

        assert_eq!(cache.evict(t0 + Duration::from_secs(3)), 1);
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn put_overwrites_without_merging() {
        let t0 = Instant::now();
        let mut cache = DiagnosticCache::default();
        cache.put("0x1200", vec![DiagTlv::BatteryLevel(10)], t0);
        cache.put(
            "0x1200",
            vec![DiagTlv::SupplyVoltage(3300)],
            t0 + Duration::from_millis(5),
        );

        assert_eq!(cache.len(), 1);
        let record = cache.get("0x1200").unwrap();
        assert_eq!(record.entries, vec![DiagTlv::SupplyVoltage(3300)]);
        assert_eq!(record.received_at, t0 + Duration::from_millis(5));
    }

    #[test]
    fn overwrite_refreshes_age() {
        let t0 = Instant::now();
        let mut cache = DiagnosticCache::new(Duration::from_secs(3));
        cache.put("0x3400", vec![], t0);
        cache.put("0x3400", vec![], t0 + Duration::from_secs(2));

        cache.evict(t0 + Duration::from_secs(4));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn earlier_now_does_not_evict() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut cache = DiagnosticCache::default();
        cache.put(PLACEHOLDER_KEY, vec![], t0);

        assert_eq!(cache.evict(t0 - Duration::from_secs(5)), 0);
    }
}
