//! Network diagnostics aggregation
//!
//! - [`tlv`]: diagnostic entries and their JSON form
//! - [`cache`]: latest reply per originator, with age-based eviction
//! - [`engine`]: fan-out queries, reply folding, deadline-driven flush

pub mod cache;
pub mod engine;
pub mod tlv;

pub use cache::{DiagnosticCache, DiagnosticRecord, PLACEHOLDER_KEY, originator_key};
pub use engine::{ALL_ROUTERS_MULTICAST, DiagnosticEngine, RoundState};
pub use tlv::{DiagTlv, QUERY_TLV_TYPES};
