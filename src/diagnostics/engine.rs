//! Diagnostic aggregation engine
//!
//! A round starts when a diagnostics request arrives: one query goes to the
//! device's own routing locator and one to the all-routers multicast group.
//! Replies trickle in through [`DiagnosticEngine::on_event`] and land in the
//! shared cache. The round ends only when [`DiagnosticEngine::poll`] sees the
//! collection window has elapsed; it then flushes the cache into the
//! response.

use std::net::Ipv6Addr;
use std::time::{Duration, Instant};

use super::cache::{DEFAULT_RESET_TIMEOUT, DiagnosticCache, PLACEHOLDER_KEY, originator_key};
use super::tlv::{self, DiagTlv, QUERY_TLV_TYPES};
use crate::mesh::{DiagnosticEvent, MeshControl};
use crate::rest::{HttpStatus, Response};
use crate::{Error, Result};

/// Realm-local all-routers multicast group
pub const ALL_ROUTERS_MULTICAST: Ipv6Addr = Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 2);

/// Default collection window (2 seconds)
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Where a diagnostics round stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// No query issued for this response
    Idle,
    /// Queries are being handed to the mesh library
    QuerySent,
    /// Both queries accepted, window open
    Collecting,
    /// Cache flushed into the response, which is complete
    Flushed,
}

/// Fans out diagnostic queries and folds replies into the cache
#[derive(Debug)]
pub struct DiagnosticEngine {
    cache: DiagnosticCache,
    collect_timeout: Duration,
}

impl Default for DiagnosticEngine {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECT_TIMEOUT, DEFAULT_RESET_TIMEOUT)
    }
}

impl DiagnosticEngine {
    /// Create an engine with the given collection window and cache reset age
    #[must_use]
    pub fn new(collect_timeout: Duration, reset_timeout: Duration) -> Self {
        Self {
            cache: DiagnosticCache::new(reset_timeout),
            collect_timeout,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &DiagnosticCache {
        &self.cache
    }

    #[must_use]
    pub const fn collect_timeout(&self) -> Duration {
        self.collect_timeout
    }

    /// Issue the fan-out and open the collection window on `response`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if either query cannot be sent; the
    /// response is left without a callback so the caller completes it.
    pub fn begin(
        &mut self,
        mesh: &mut dyn MeshControl,
        response: &mut Response,
        now: Instant,
    ) -> Result<RoundState> {
        let rloc = mesh.rloc_address();

        for target in [rloc, ALL_ROUTERS_MULTICAST] {
            mesh.send_diagnostic_query(target, &QUERY_TLV_TYPES)
                .map_err(|e| Error::internal(format!("diagnostic query to {target}: {e}")))?;
            tracing::trace!(%target, state = ?RoundState::QuerySent, "diagnostic query sent");
        }

        response.set_callback(now);
        tracing::debug!(%rloc, "diagnostics round collecting");
        Ok(RoundState::Collecting)
    }

    /// Fold one asynchronous query outcome into the cache
    pub fn on_event(&mut self, event: DiagnosticEvent, now: Instant) {
        match event {
            DiagnosticEvent::Reply { source, entries } => {
                let key = self.on_reply(entries, now);
                tracing::debug!(%source, key, "diagnostic reply cached");
            }
            DiagnosticEvent::Failure(err) => {
                tracing::warn!(error = %err, "diagnostic reply failed");
            }
        }
    }

    /// Cache a reply under its originator key, returning the key used
    ///
    /// The last short-address entry names the originator. Replies with none
    /// are filed under [`PLACEHOLDER_KEY`] and overwrite each other.
    pub fn on_reply(&mut self, entries: Vec<DiagTlv>, now: Instant) -> String {
        let key = entries
            .iter()
            .rev()
            .find_map(|tlv| match tlv {
                DiagTlv::ShortAddress(rloc16) => Some(originator_key(*rloc16)),
                _ => None,
            })
            .unwrap_or_else(|| PLACEHOLDER_KEY.to_string());
        self.cache.put(key.clone(), entries, now);
        key
    }

    /// Close the window on `response` if it has elapsed
    ///
    /// Evicts stale records, then writes every remaining record into the
    /// body and completes the response. Before the deadline nothing changes.
    pub fn poll(&mut self, response: &mut Response, now: Instant) -> RoundState {
        if response.is_complete() {
            return RoundState::Flushed;
        }
        let Some(started) = response.start_time() else {
            return RoundState::Idle;
        };

        let elapsed = now.saturating_duration_since(started);
        if elapsed < self.collect_timeout {
            return RoundState::Collecting;
        }

        let evicted = self.cache.evict(now);
        match tlv::to_json(self.cache.snapshot()) {
            Ok(body) => {
                response.set_status(HttpStatus::Ok);
                response.set_body(body);
                response.set_complete();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize diagnostics");
                response.set_error(HttpStatus::InternalServerError);
            }
        }

        tracing::debug!(
            records = self.cache.len(),
            evicted,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "diagnostics flushed"
        );
        RoundState::Flushed
    }
}
