//! Operational dataset
//!
//! Two representations are supported: a JSON object with PascalCase keys, and
//! the MeshCoP TLV byte string carried hex-encoded in `text/plain` bodies.
//! Every component is optional; [`OperationalDataset::update`] overlays one
//! partial dataset onto another.

use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest encoded dataset accepted
pub const MAX_DATASET_TLVS_LENGTH: usize = 254;

/// Longest network name in bytes
pub const MAX_NETWORK_NAME_LENGTH: usize = 16;

mod tlv_type {
    pub const CHANNEL: u8 = 0;
    pub const PAN_ID: u8 = 1;
    pub const EXT_PAN_ID: u8 = 2;
    pub const NETWORK_NAME: u8 = 3;
    pub const PSKC: u8 = 4;
    pub const NETWORK_KEY: u8 = 5;
    pub const MESH_LOCAL_PREFIX: u8 = 7;
    pub const SECURITY_POLICY: u8 = 12;
    pub const ACTIVE_TIMESTAMP: u8 = 14;
    pub const PENDING_TIMESTAMP: u8 = 51;
    pub const DELAY_TIMER: u8 = 52;
    pub const CHANNEL_MASK: u8 = 53;
}

/// Dataset timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Timestamp {
    pub seconds: u64,
    #[serde(default)]
    pub ticks: u16,
    #[serde(default)]
    pub authoritative: bool,
}

impl Timestamp {
    fn to_bytes(self) -> [u8; 8] {
        let packed = (self.seconds << 16)
            | (u64::from(self.ticks & 0x7fff) << 1)
            | u64::from(self.authoritative);
        packed.to_be_bytes()
    }

    fn from_bytes(bytes: [u8; 8]) -> Self {
        let packed = u64::from_be_bytes(bytes);
        #[allow(clippy::cast_possible_truncation)]
        let ticks = ((packed >> 1) & 0x7fff) as u16;
        Self {
            seconds: packed >> 16,
            ticks,
            authoritative: packed & 1 == 1,
        }
    }
}

/// Network security policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SecurityPolicy {
    /// Key rotation time in hours
    pub rotation_time: u16,
    pub obtain_network_key: bool,
    pub native_commissioning: bool,
    pub routers: bool,
    pub external_commissioning: bool,
    pub commercial_commissioning: bool,
    pub autonomous_enrollment: bool,
    pub network_key_provisioning: bool,
    pub toble_link: bool,
    pub non_ccm_routers: bool,
    pub version_threshold_for_routing: u8,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            rotation_time: 672,
            obtain_network_key: true,
            native_commissioning: true,
            routers: true,
            external_commissioning: true,
            commercial_commissioning: false,
            autonomous_enrollment: false,
            network_key_provisioning: false,
            toble_link: true,
            non_ccm_routers: false,
            version_threshold_for_routing: 0,
        }
    }
}

impl SecurityPolicy {
    const OBTAIN_NETWORK_KEY: u8 = 1 << 7;
    const NATIVE_COMMISSIONING: u8 = 1 << 6;
    const ROUTERS: u8 = 1 << 5;
    const EXTERNAL_COMMISSIONING: u8 = 1 << 4;
    const RESERVED_FIRST: u8 = 1 << 3;
    const COMMERCIAL_COMMISSIONING: u8 = 1 << 2;
    const AUTONOMOUS_ENROLLMENT: u8 = 1 << 1;
    const NETWORK_KEY_PROVISIONING: u8 = 1;
    const TOBLE_LINK: u8 = 1 << 7;
    const NON_CCM_ROUTERS: u8 = 1 << 6;
    const RESERVED_SECOND: u8 = 0x38;
    const VERSION_THRESHOLD: u8 = 0x07;

    fn to_bytes(self) -> [u8; 4] {
        let [hi, lo] = self.rotation_time.to_be_bytes();
        // Commercial-mode bits are active-low on the wire
        let mut first = Self::RESERVED_FIRST;
        set_bit(&mut first, Self::OBTAIN_NETWORK_KEY, self.obtain_network_key);
        set_bit(&mut first, Self::NATIVE_COMMISSIONING, self.native_commissioning);
        set_bit(&mut first, Self::ROUTERS, self.routers);
        set_bit(&mut first, Self::EXTERNAL_COMMISSIONING, self.external_commissioning);
        set_bit(&mut first, Self::COMMERCIAL_COMMISSIONING, !self.commercial_commissioning);
        set_bit(&mut first, Self::AUTONOMOUS_ENROLLMENT, !self.autonomous_enrollment);
        set_bit(&mut first, Self::NETWORK_KEY_PROVISIONING, !self.network_key_provisioning);

        let mut second = Self::RESERVED_SECOND;
        set_bit(&mut second, Self::TOBLE_LINK, self.toble_link);
        set_bit(&mut second, Self::NON_CCM_ROUTERS, !self.non_ccm_routers);
        second |= self.version_threshold_for_routing & Self::VERSION_THRESHOLD;

        [hi, lo, first, second]
    }

    fn from_bytes(value: &[u8]) -> Result<Self> {
        let [hi, lo, first, rest @ ..] = value else {
            return Err(Error::invalid_args("security policy TLV too short"));
        };
        let second = rest
            .first()
            .copied()
            .unwrap_or(Self::RESERVED_SECOND | Self::NON_CCM_ROUTERS);
        Ok(Self {
            rotation_time: u16::from_be_bytes([*hi, *lo]),
            obtain_network_key: first & Self::OBTAIN_NETWORK_KEY != 0,
            native_commissioning: first & Self::NATIVE_COMMISSIONING != 0,
            routers: first & Self::ROUTERS != 0,
            external_commissioning: first & Self::EXTERNAL_COMMISSIONING != 0,
            commercial_commissioning: first & Self::COMMERCIAL_COMMISSIONING == 0,
            autonomous_enrollment: first & Self::AUTONOMOUS_ENROLLMENT == 0,
            network_key_provisioning: first & Self::NETWORK_KEY_PROVISIONING == 0,
            toble_link: second & Self::TOBLE_LINK != 0,
            non_ccm_routers: second & Self::NON_CCM_ROUTERS == 0,
            version_threshold_for_routing: second & Self::VERSION_THRESHOLD,
        })
    }
}

fn set_bit(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

/// Operational dataset; every component is optional
///
/// Serializes to the active-dataset JSON form. The pending-only components
/// are carried by [`OperationalDataset::to_pending_json`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OperationalDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_timestamp: Option<Timestamp>,

    #[serde(skip)]
    pub pending_timestamp: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    pub network_key: Option<[u8; 16]>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "network_name_opt"
    )]
    pub network_name: Option<String>,

    #[serde(
        default,
        rename = "ExtPanId",
        skip_serializing_if = "Option::is_none",
        with = "hex_opt"
    )]
    pub ext_pan_id: Option<[u8; 8]>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "prefix_opt")]
    pub mesh_local_prefix: Option<[u8; 8]>,

    /// Milliseconds until a pending dataset becomes active
    #[serde(skip)]
    pub delay: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_id: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,

    #[serde(
        default,
        rename = "PSKc",
        skip_serializing_if = "Option::is_none",
        with = "hex_opt"
    )]
    pub pskc: Option<[u8; 16]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<SecurityPolicy>,

    /// Supported channels on page 0, bit n for channel n
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_mask: Option<u32>,
}

/// JSON form of a pending dataset
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PendingDatasetJson {
    #[serde(default)]
    active_dataset: OperationalDataset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<u32>,
}

impl OperationalDataset {
    /// Overlay every component present in `other`
    pub fn update(&mut self, other: &Self) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field.is_some() {
                        self.$field.clone_from(&other.$field);
                    }
                )*
            };
        }
        overlay!(
            active_timestamp,
            pending_timestamp,
            network_key,
            network_name,
            ext_pan_id,
            mesh_local_prefix,
            delay,
            pan_id,
            channel,
            pskc,
            security_policy,
            channel_mask,
        );
    }

    /// Active-dataset JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_active_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pending-dataset JSON: the active components nested under `ActiveDataset`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pending_json(&self) -> Result<String> {
        let json = PendingDatasetJson {
            active_dataset: self.clone(),
            pending_timestamp: self.pending_timestamp,
            delay: self.delay,
        };
        Ok(serde_json::to_string(&json)?)
    }

    /// Parse an active-dataset JSON body
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] if the body is not a valid dataset.
    pub fn from_active_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::invalid_args(e.to_string()))
    }

    /// Parse a pending-dataset JSON body
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] if the body is not a valid dataset.
    pub fn from_pending_json(body: &[u8]) -> Result<Self> {
        let json: PendingDatasetJson =
            serde_json::from_slice(body).map_err(|e| Error::invalid_args(e.to_string()))?;
        let mut dataset = json.active_dataset;
        dataset.pending_timestamp = json.pending_timestamp;
        dataset.delay = json.delay;
        Ok(dataset)
    }

    /// Encode as MeshCoP TLVs, in ascending type order
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] if a component does not fit its TLV.
    pub fn to_tlvs(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_DATASET_TLVS_LENGTH);

        if let Some(channel) = self.channel {
            let [hi, lo] = channel.to_be_bytes();
            push_tlv(&mut out, tlv_type::CHANNEL, &[0, hi, lo])?;
        }
        if let Some(pan_id) = self.pan_id {
            push_tlv(&mut out, tlv_type::PAN_ID, &pan_id.to_be_bytes())?;
        }
        if let Some(ext_pan_id) = &self.ext_pan_id {
            push_tlv(&mut out, tlv_type::EXT_PAN_ID, ext_pan_id)?;
        }
        if let Some(name) = &self.network_name {
            push_tlv(&mut out, tlv_type::NETWORK_NAME, name.as_bytes())?;
        }
        if let Some(pskc) = &self.pskc {
            push_tlv(&mut out, tlv_type::PSKC, pskc)?;
        }
        if let Some(key) = &self.network_key {
            push_tlv(&mut out, tlv_type::NETWORK_KEY, key)?;
        }
        if let Some(prefix) = &self.mesh_local_prefix {
            push_tlv(&mut out, tlv_type::MESH_LOCAL_PREFIX, prefix)?;
        }
        if let Some(policy) = self.security_policy {
            push_tlv(&mut out, tlv_type::SECURITY_POLICY, &policy.to_bytes())?;
        }
        if let Some(ts) = self.active_timestamp {
            push_tlv(&mut out, tlv_type::ACTIVE_TIMESTAMP, &ts.to_bytes())?;
        }
        if let Some(ts) = self.pending_timestamp {
            push_tlv(&mut out, tlv_type::PENDING_TIMESTAMP, &ts.to_bytes())?;
        }
        if let Some(delay) = self.delay {
            push_tlv(&mut out, tlv_type::DELAY_TIMER, &delay.to_be_bytes())?;
        }
        if let Some(mask) = self.channel_mask {
            let mut entry = vec![0, 4];
            entry.extend_from_slice(&mask.reverse_bits().to_be_bytes());
            push_tlv(&mut out, tlv_type::CHANNEL_MASK, &entry)?;
        }

        Ok(out)
    }

    /// Decode MeshCoP TLVs; unknown types are skipped
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] for truncated or malformed TLVs.
    pub fn from_tlvs(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_DATASET_TLVS_LENGTH {
            return Err(Error::invalid_args("dataset TLVs too long"));
        }

        let mut dataset = Self::default();
        let mut rest = bytes;
        while let [kind, len, tail @ ..] = rest {
            let len = usize::from(*len);
            if tail.len() < len {
                return Err(Error::invalid_args(format!("truncated TLV type {kind}")));
            }
            let (value, next) = tail.split_at(len);
            rest = next;

            match *kind {
                tlv_type::CHANNEL => {
                    let [_page, hi, lo] = fixed::<3>(*kind, value)?;
                    dataset.channel = Some(u16::from_be_bytes([hi, lo]));
                }
                tlv_type::PAN_ID => {
                    dataset.pan_id = Some(u16::from_be_bytes(fixed(*kind, value)?));
                }
                tlv_type::EXT_PAN_ID => dataset.ext_pan_id = Some(fixed(*kind, value)?),
                tlv_type::NETWORK_NAME => {
                    if value.len() > MAX_NETWORK_NAME_LENGTH {
                        return Err(Error::invalid_args("network name too long"));
                    }
                    let name = std::str::from_utf8(value)
                        .map_err(|_| Error::invalid_args("network name is not UTF-8"))?;
                    dataset.network_name = Some(name.to_string());
                }
                tlv_type::PSKC => dataset.pskc = Some(fixed(*kind, value)?),
                tlv_type::NETWORK_KEY => dataset.network_key = Some(fixed(*kind, value)?),
                tlv_type::MESH_LOCAL_PREFIX => {
                    dataset.mesh_local_prefix = Some(fixed(*kind, value)?);
                }
                tlv_type::SECURITY_POLICY => {
                    dataset.security_policy = Some(SecurityPolicy::from_bytes(value)?);
                }
                tlv_type::ACTIVE_TIMESTAMP => {
                    dataset.active_timestamp = Some(Timestamp::from_bytes(fixed(*kind, value)?));
                }
                tlv_type::PENDING_TIMESTAMP => {
                    dataset.pending_timestamp = Some(Timestamp::from_bytes(fixed(*kind, value)?));
                }
                tlv_type::DELAY_TIMER => {
                    dataset.delay = Some(u32::from_be_bytes(fixed(*kind, value)?));
                }
                tlv_type::CHANNEL_MASK => dataset.channel_mask = parse_channel_mask(value)?,
                _ => {}
            }
        }

        if !rest.is_empty() {
            return Err(Error::invalid_args("trailing byte after last TLV"));
        }
        Ok(dataset)
    }
}

fn push_tlv(out: &mut Vec<u8>, kind: u8, value: &[u8]) -> Result<()> {
    let len = u8::try_from(value.len())
        .map_err(|_| Error::invalid_args(format!("TLV type {kind} value too long")))?;
    out.push(kind);
    out.push(len);
    out.extend_from_slice(value);
    Ok(())
}

/// Network name from JSON, bounded like the network name TLV
fn network_name_opt<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let name = Option::<String>::deserialize(d)?;
    if name.as_ref().is_some_and(|n| n.len() > MAX_NETWORK_NAME_LENGTH) {
        return Err(serde::de::Error::custom(format!(
            "network name longer than {MAX_NETWORK_NAME_LENGTH} bytes"
        )));
    }
    Ok(name)
}

fn fixed<const N: usize>(kind: u8, value: &[u8]) -> Result<[u8; N]> {
    value
        .try_into()
        .map_err(|_| Error::invalid_args(format!("TLV type {kind} must be {N} bytes")))
}

/// Page-0 mask from a channel mask TLV; other pages are ignored
fn parse_channel_mask(mut value: &[u8]) -> Result<Option<u32>> {
    let mut mask = None;
    while let [page, len, tail @ ..] = value {
        let len = usize::from(*len);
        if tail.len() < len {
            return Err(Error::invalid_args("truncated channel mask entry"));
        }
        let (bits, next) = tail.split_at(len);
        if *page == 0 {
            mask = Some(u32::from_be_bytes(fixed(tlv_type::CHANNEL_MASK, bits)?).reverse_bits());
        }
        value = next;
    }
    Ok(mask)
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer, const N: usize>(
        value: &Option<[u8; N]>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&hex::encode_upper(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<Option<[u8; N]>, D::Error> {
        let Some(text) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let bytes = hex::decode(text).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected {N} hex-encoded bytes")))
    }
}

mod prefix_opt {
    use std::net::Ipv6Addr;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<[u8; 8]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(prefix) => s.serialize_str(&format!("{}/64", super::prefix_address(*prefix))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 8]>, D::Error> {
        let Some(text) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let address = text.strip_suffix("/64").unwrap_or(&text);
        let address: Ipv6Addr = address.parse().map_err(serde::de::Error::custom)?;
        let octets = address.octets();
        let mut prefix = [0; 8];
        prefix.copy_from_slice(&octets[..8]);
        Ok(Some(prefix))
    }
}

/// Address with `prefix` as its upper 64 bits and a zero interface id
#[must_use]
pub fn prefix_address(prefix: [u8; 8]) -> Ipv6Addr {
    let mut octets = [0; 16];
    octets[..8].copy_from_slice(&prefix);
    Ipv6Addr::from(octets)
}
