//! Domain values exposed by the mesh control library

use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

/// Role of a device in the mesh partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl DeviceRole {
    /// API name of the state; the match is exhaustive, so no raw value falls back to `""`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Detached => "detached",
            Self::Child => "child",
            Self::Router => "router",
            Self::Leader => "leader",
        }
    }

    /// Whether the device forwards for others (answers all-routers multicast)
    #[must_use]
    pub const fn is_router(self) -> bool {
        matches!(self, Self::Router | Self::Leader)
    }
}

/// Commissioner role state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionerState {
    Disabled,
    Petition,
    Active,
}

impl CommissionerState {
    /// API name of the state; the match is exhaustive, so no raw value falls back to `""`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Petition => "petitioning",
            Self::Active => "active",
        }
    }
}

/// SRP server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrpServerState {
    Disabled,
    Running,
    Stopped,
}

impl SrpServerState {
    /// API name of the state; the match is exhaustive, so no raw value falls back to `""`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Registration state of an SRP client host or service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrpClientItemState {
    ToAdd,
    Adding,
    ToRefresh,
    Refreshing,
    ToRemove,
    Removing,
    Registered,
    Removed,
}

impl SrpClientItemState {
    /// API name of the state; the match is exhaustive, so no raw value falls back to `""`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToAdd => "ToAdd",
            Self::Adding => "Adding",
            Self::ToRefresh => "ToRefresh",
            Self::Refreshing => "Refreshing",
            Self::ToRemove => "ToRemove",
            Self::Removing => "Removing",
            Self::Registered => "Registered",
            Self::Removed => "Removed",
        }
    }
}

impl Serialize for SrpClientItemState {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Leader data of the current partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeaderData {
    pub partition_id: u32,
    pub weighting: u8,
    pub data_version: u8,
    pub stable_data_version: u8,
    pub leader_router_id: u8,
}

/// Joiner discerner: the low `length` bits of `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinerDiscerner {
    pub value: u64,
    pub length: u8,
}

/// Maximum discerner length in bits
pub const MAX_DISCERNER_LENGTH: u8 = 64;

/// How a joiner is identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinerId {
    /// Any joiner (wildcard `*`)
    Any,
    /// IEEE EUI-64
    Eui64([u8; 8]),
    /// Joiner discerner
    Discerner(JoinerDiscerner),
}

impl std::fmt::Display for JoinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Eui64(eui) => f.write_str(&hex::encode_upper(eui)),
            Self::Discerner(d) => write!(f, "{}/{}", d.value, d.length),
        }
    }
}

/// A joiner entry in the commissioner's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinerInfo {
    pub id: JoinerId,
    pub pskd: String,
    /// Seconds until the entry expires
    pub timeout: u32,
}

/// Host address mode for the SRP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAddress {
    /// Let the stack pick addresses automatically
    Auto,
    /// A single explicit address
    Address(Ipv6Addr),
}

/// SRP client host registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SrpHostInfo {
    pub name: String,
    pub addresses: Vec<Ipv6Addr>,
    pub auto_address: bool,
    pub state: SrpClientItemState,
}

/// SRP client service registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SrpService {
    pub service_name: String,
    pub instance_name: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
    pub txt_entries: Vec<TxtEntry>,
    pub state: SrpClientItemState,
}

/// DNS-SD TXT key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxtEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Which operational dataset an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Active,
    Pending,
}

impl DatasetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }
}
