//! Network diagnostic entries
//!
//! A reply from one device is an ordered list of [`DiagTlv`]s. Serialized, a
//! reply becomes one JSON object whose keys are the entry names in arrival
//! order.

use std::net::Ipv6Addr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::mesh::LeaderData;

/// Diagnostic TLV type codes
pub mod tlv_type {
    pub const EXT_ADDRESS: u8 = 0;
    pub const SHORT_ADDRESS: u8 = 1;
    pub const MODE: u8 = 2;
    pub const TIMEOUT: u8 = 3;
    pub const CONNECTIVITY: u8 = 4;
    pub const ROUTE: u8 = 5;
    pub const LEADER_DATA: u8 = 6;
    pub const NETWORK_DATA: u8 = 7;
    pub const IP6_ADDRESS_LIST: u8 = 8;
    pub const MAC_COUNTERS: u8 = 9;
    pub const BATTERY_LEVEL: u8 = 14;
    pub const SUPPLY_VOLTAGE: u8 = 15;
    pub const CHILD_TABLE: u8 = 16;
    pub const CHANNEL_PAGES: u8 = 17;
    pub const MAX_CHILD_TIMEOUT: u8 = 19;
}

/// TLV types requested by every diagnostics query
pub const QUERY_TLV_TYPES: [u8; 15] = [
    tlv_type::EXT_ADDRESS,
    tlv_type::SHORT_ADDRESS,
    tlv_type::MODE,
    tlv_type::TIMEOUT,
    tlv_type::CONNECTIVITY,
    tlv_type::ROUTE,
    tlv_type::LEADER_DATA,
    tlv_type::NETWORK_DATA,
    tlv_type::IP6_ADDRESS_LIST,
    tlv_type::MAC_COUNTERS,
    tlv_type::BATTERY_LEVEL,
    tlv_type::SUPPLY_VOLTAGE,
    tlv_type::CHILD_TABLE,
    tlv_type::CHANNEL_PAGES,
    tlv_type::MAX_CHILD_TIMEOUT,
];

/// MLE link mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkMode {
    pub rx_on_when_idle: bool,
    pub device_type_ftd: bool,
    pub full_network_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Connectivity {
    pub parent_priority: i8,
    pub link_quality3: u8,
    pub link_quality2: u8,
    pub link_quality1: u8,
    pub leader_cost: u8,
    pub id_sequence: u8,
    pub active_routers: u8,
    pub sed_buffer_size: u16,
    pub sed_datagram_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteEntry {
    pub router_id: u8,
    pub link_quality_out: u8,
    pub link_quality_in: u8,
    pub route_cost: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteData {
    pub id_sequence: u8,
    pub route_data: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MacCounters {
    pub if_in_unknown_protos: u32,
    pub if_in_errors: u32,
    pub if_out_errors: u32,
    pub if_in_ucast_pkts: u32,
    pub if_in_broadcast_pkts: u32,
    pub if_in_discards: u32,
    pub if_out_ucast_pkts: u32,
    pub if_out_broadcast_pkts: u32,
    pub if_out_discards: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChildEntry {
    pub child_id: u16,
    /// Timeout exponent: the child's timeout is `2^(timeout + 4)` seconds
    pub timeout: u8,
    pub mode: LinkMode,
}

/// One diagnostic entry as delivered by the mesh library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagTlv {
    ExtAddress([u8; 8]),
    ShortAddress(u16),
    Mode(LinkMode),
    Timeout(u32),
    Connectivity(Connectivity),
    Route(RouteData),
    LeaderData(LeaderData),
    NetworkData(Vec<u8>),
    Ip6AddressList(Vec<Ipv6Addr>),
    MacCounters(MacCounters),
    BatteryLevel(u8),
    SupplyVoltage(u16),
    ChildTable(Vec<ChildEntry>),
    ChannelPages(Vec<u8>),
    MaxChildTimeout(u32),
}

impl DiagTlv {
    /// Wire type code
    #[must_use]
    pub const fn tlv_type(&self) -> u8 {
        match self {
            Self::ExtAddress(_) => tlv_type::EXT_ADDRESS,
            Self::ShortAddress(_) => tlv_type::SHORT_ADDRESS,
            Self::Mode(_) => tlv_type::MODE,
            Self::Timeout(_) => tlv_type::TIMEOUT,
            Self::Connectivity(_) => tlv_type::CONNECTIVITY,
            Self::Route(_) => tlv_type::ROUTE,
            Self::LeaderData(_) => tlv_type::LEADER_DATA,
            Self::NetworkData(_) => tlv_type::NETWORK_DATA,
            Self::Ip6AddressList(_) => tlv_type::IP6_ADDRESS_LIST,
            Self::MacCounters(_) => tlv_type::MAC_COUNTERS,
            Self::BatteryLevel(_) => tlv_type::BATTERY_LEVEL,
            Self::SupplyVoltage(_) => tlv_type::SUPPLY_VOLTAGE,
            Self::ChildTable(_) => tlv_type::CHILD_TABLE,
            Self::ChannelPages(_) => tlv_type::CHANNEL_PAGES,
            Self::MaxChildTimeout(_) => tlv_type::MAX_CHILD_TIMEOUT,
        }
    }

    /// JSON key for this entry
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ExtAddress(_) => "ExtAddress",
            Self::ShortAddress(_) => "Rloc16",
            Self::Mode(_) => "Mode",
            Self::Timeout(_) => "Timeout",
            Self::Connectivity(_) => "Connectivity",
            Self::Route(_) => "Route",
            Self::LeaderData(_) => "LeaderData",
            Self::NetworkData(_) => "NetworkData",
            Self::Ip6AddressList(_) => "IP6AddressList",
            Self::MacCounters(_) => "MACCounters",
            Self::BatteryLevel(_) => "BatteryLevel",
            Self::SupplyVoltage(_) => "SupplyVoltage",
            Self::ChildTable(_) => "ChildTable",
            Self::ChannelPages(_) => "ChannelPages",
            Self::MaxChildTimeout(_) => "MaxChildTimeout",
        }
    }
}

/// Serializes the entry's value only; the key comes from [`DiagTlv::name`]
impl Serialize for DiagTlv {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::ExtAddress(addr) => s.serialize_str(&hex::encode_upper(addr)),
            Self::ShortAddress(rloc16) => s.serialize_u16(*rloc16),
            Self::Mode(mode) => mode.serialize(s),
            Self::Timeout(v) | Self::MaxChildTimeout(v) => s.serialize_u32(*v),
            Self::Connectivity(c) => c.serialize(s),
            Self::Route(route) => route.serialize(s),
            Self::LeaderData(data) => data.serialize(s),
            Self::NetworkData(data) => s.serialize_str(&hex::encode_upper(data)),
            Self::Ip6AddressList(addrs) => addrs.serialize(s),
            Self::MacCounters(counters) => counters.serialize(s),
            Self::BatteryLevel(level) => s.serialize_u8(*level),
            Self::SupplyVoltage(mv) => s.serialize_u16(*mv),
            Self::ChildTable(children) => children.serialize(s),
            Self::ChannelPages(pages) => pages.serialize(s),
        }
    }
}

/// One device's reply as a JSON object, keys in arrival order
pub struct DiagRecordJson<'a>(pub &'a [DiagTlv]);

impl Serialize for DiagRecordJson<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for tlv in self.0 {
            map.serialize_entry(tlv.name(), tlv)?;
        }
        map.end()
    }
}

/// Serialize a set of replies as a JSON array of objects
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json<'a, I>(records: I) -> serde_json::Result<String>
where
    I: IntoIterator<Item = &'a [DiagTlv]>,
{
    let records: Vec<DiagRecordJson<'a>> = records.into_iter().map(DiagRecordJson).collect();
    serde_json::to_string(&records)
}
