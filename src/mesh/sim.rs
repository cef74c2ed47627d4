//! Simulated mesh backend
//!
//! An in-memory stand-in for the mesh stack. The local node and its peers
//! come from a [`SimTopology`]; diagnostic queries are answered by spawned
//! tasks after each node's configured delay, so replies arrive out of order
//! just as they would over the air.

use std::collections::BTreeSet;
use std::net::Ipv6Addr;
use std::time::Duration;

use serde::Deserialize;

use super::dataset::{OperationalDataset, SecurityPolicy, Timestamp, prefix_address};
use super::{
    CommissionerState, DatasetKind, DeviceRole, DiagnosticEvent, DiagnosticSink, HostAddress,
    JoinerId, JoinerInfo, LeaderData, MeshControl, MeshError, SrpClientItemState, SrpHostInfo,
    SrpServerState, SrpService,
};
use crate::diagnostics::ALL_ROUTERS_MULTICAST;
use crate::diagnostics::tlv::{
    ChildEntry, Connectivity, DiagTlv, LinkMode, MacCounters, RouteData, RouteEntry,
};

/// Joiner table capacity
pub const MAX_JOINERS: usize = 4;

/// SRP client service pool size
pub const MAX_SRP_SERVICES: usize = 2;

/// SRP client host name buffer size, terminator included
pub const SRP_HOST_NAME_CAPACITY: usize = 64;

const DEFAULT_MESH_LOCAL_PREFIX: [u8; 8] = [0xfd, 0x00, 0x0d, 0xb8, 0, 0, 0, 0];
const DEFAULT_EXT_PANID: [u8; 8] = [0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0xca, 0xfe];
const MAX_ROUTER_ID: u8 = 62;

/// A peer node in the simulated partition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimPeer {
    pub rloc16: u16,
    pub role: DeviceRole,
    /// Delay before this peer's diagnostic reply arrives
    pub reply_delay_ms: u64,
    /// Unreachable peers never answer
    pub reachable: bool,
    /// Whether replies carry a short-address entry
    pub reports_rloc16: bool,
}

impl Default for SimPeer {
    fn default() -> Self {
        Self {
            rloc16: 0x0800,
            role: DeviceRole::Router,
            reply_delay_ms: 100,
            reachable: true,
            reports_rloc16: true,
        }
    }
}

/// Simulated network layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimTopology {
    pub network_name: String,
    pub rloc16: u16,
    /// Role taken once the node attaches
    pub role: DeviceRole,
    pub partition_id: u32,
    /// Start with an active dataset and the stack up
    pub commissioned: bool,
    /// Delay before the local node answers its own query
    pub reply_delay_ms: u64,
    pub peers: Vec<SimPeer>,
}

impl Default for SimTopology {
    fn default() -> Self {
        Self {
            network_name: "OpenThread".to_string(),
            rloc16: 0x0400,
            role: DeviceRole::Leader,
            partition_id: 0x1234_5678,
            commissioned: true,
            reply_delay_ms: 10,
            peers: vec![
                SimPeer {
                    rloc16: 0x1000,
                    reply_delay_ms: 80,
                    ..SimPeer::default()
                },
                SimPeer {
                    rloc16: 0x2000,
                    reply_delay_ms: 400,
                    ..SimPeer::default()
                },
                SimPeer {
                    rloc16: 0x1001,
                    role: DeviceRole::Child,
                    reply_delay_ms: 150,
                    ..SimPeer::default()
                },
            ],
        }
    }
}

/// In-memory mesh stack
#[derive(Debug)]
pub struct SimulatedMesh {
    topology: SimTopology,
    role: DeviceRole,
    ip6_enabled: bool,
    thread_enabled: bool,
    ext_address: [u8; 8],
    factory_eui64: [u8; 8],
    ba_id: [u8; 16],
    active: Option<OperationalDataset>,
    pending: Option<OperationalDataset>,
    commissioner: CommissionerState,
    joiners: Vec<JoinerInfo>,
    srp_server_enabled: bool,
    srp_client_running: bool,
    srp_auto_start: bool,
    host: SrpHostInfo,
    services: Vec<SrpService>,
    sink: Option<DiagnosticSink>,
    fail_queries: bool,
    queries: Vec<(Ipv6Addr, Vec<u8>)>,
}

impl Default for SimulatedMesh {
    fn default() -> Self {
        Self::new(SimTopology::default(), None)
    }
}

impl SimulatedMesh {
    /// Build a node from `topology`; replies go to `sink` when one is given
    #[must_use]
    pub fn new(topology: SimTopology, sink: Option<DiagnosticSink>) -> Self {
        let factory_eui64 = ext_address_for(topology.rloc16);
        let active = topology.commissioned.then(|| OperationalDataset {
            active_timestamp: Some(Timestamp {
                seconds: 1,
                ..Timestamp::default()
            }),
            network_name: Some(topology.network_name.clone()),
            ext_pan_id: Some(DEFAULT_EXT_PANID),
            mesh_local_prefix: Some(DEFAULT_MESH_LOCAL_PREFIX),
            pan_id: Some(0xface),
            channel: Some(15),
            security_policy: Some(SecurityPolicy::default()),
            channel_mask: Some(0x07ff_f800),
            ..OperationalDataset::default()
        });
        let role = if topology.commissioned {
            topology.role
        } else {
            DeviceRole::Disabled
        };

        let mut ba_id = [0; 16];
        ba_id[..8].copy_from_slice(&factory_eui64);
        ba_id[8..].copy_from_slice(&topology.partition_id.to_be_bytes().repeat(2));

        Self {
            role,
            ip6_enabled: topology.commissioned,
            thread_enabled: topology.commissioned,
            ext_address: factory_eui64,
            factory_eui64,
            ba_id,
            active,
            pending: None,
            commissioner: CommissionerState::Disabled,
            joiners: Vec::new(),
            srp_server_enabled: false,
            srp_client_running: false,
            srp_auto_start: false,
            host: SrpHostInfo {
                name: String::new(),
                addresses: Vec::new(),
                auto_address: false,
                state: SrpClientItemState::ToAdd,
            },
            services: Vec::new(),
            sink,
            fail_queries: false,
            queries: Vec::new(),
            topology,
        }
    }

    /// Make every subsequent diagnostic query fail to send
    pub fn fail_diagnostic_queries(&mut self, fail: bool) {
        self.fail_queries = fail;
    }

    /// Queries accepted so far, as `(target, tlv types)`
    #[must_use]
    pub fn sent_queries(&self) -> &[(Ipv6Addr, Vec<u8>)] {
        &self.queries
    }

    const fn is_attached(&self) -> bool {
        !matches!(self.role, DeviceRole::Disabled | DeviceRole::Detached)
    }

    fn mesh_local_prefix(&self) -> [u8; 8] {
        self.active
            .as_ref()
            .and_then(|d| d.mesh_local_prefix)
            .unwrap_or(DEFAULT_MESH_LOCAL_PREFIX)
    }

    fn rloc_for(&self, rloc16: u16) -> Ipv6Addr {
        let mut octets = prefix_address(self.mesh_local_prefix()).octets();
        octets[11] = 0xff;
        octets[12] = 0xfe;
        octets[14..].copy_from_slice(&rloc16.to_be_bytes());
        Ipv6Addr::from(octets)
    }

    fn router_ids(&self) -> BTreeSet<u8> {
        if !self.is_attached() {
            return BTreeSet::new();
        }
        let mut ids: BTreeSet<u8> = self
            .topology
            .peers
            .iter()
            .filter(|p| p.role.is_router())
            .map(|p| router_id(p.rloc16))
            .collect();
        if self.role.is_router() {
            ids.insert(router_id(self.topology.rloc16));
        }
        ids
    }

    fn leader_router_id(&self) -> u8 {
        if self.role == DeviceRole::Leader {
            return router_id(self.topology.rloc16);
        }
        self.topology
            .peers
            .iter()
            .find(|p| p.role == DeviceRole::Leader)
            .map_or_else(|| router_id(self.topology.rloc16), |p| router_id(p.rloc16))
    }

    fn srp_item_state(&self) -> SrpClientItemState {
        if self.srp_client_running {
            SrpClientItemState::Registered
        } else {
            SrpClientItemState::ToAdd
        }
    }

    /// Diagnostic entries a node reports, restricted to `tlv_types`
    fn diagnostic_entries(
        &self,
        rloc16: u16,
        role: DeviceRole,
        reports_rloc16: bool,
        tlv_types: &[u8],
    ) -> Vec<DiagTlv> {
        let routers = self.router_ids();
        let mode = LinkMode {
            rx_on_when_idle: true,
            device_type_ftd: true,
            full_network_data: true,
        };
        let leader = self.leader_data().unwrap_or_default();
        let children: Vec<ChildEntry> = if rloc16 == self.topology.rloc16 {
            self.topology
                .peers
                .iter()
                .filter(|p| p.role == DeviceRole::Child)
                .map(|p| ChildEntry {
                    child_id: p.rloc16 & 0x01ff,
                    timeout: 4,
                    mode,
                })
                .collect()
        } else {
            Vec::new()
        };

        #[allow(clippy::cast_possible_truncation)]
        let active_routers = routers.len() as u8;
        let mut entries = vec![
            DiagTlv::ExtAddress(ext_address_for(rloc16)),
            DiagTlv::ShortAddress(rloc16),
            DiagTlv::Mode(mode),
            DiagTlv::Connectivity(Connectivity {
                parent_priority: 0,
                link_quality3: active_routers.saturating_sub(1),
                leader_cost: 1,
                id_sequence: 1,
                active_routers,
                sed_buffer_size: 1280,
                sed_datagram_count: 1,
                ..Connectivity::default()
            }),
            DiagTlv::Route(RouteData {
                id_sequence: 1,
                route_data: routers
                    .iter()
                    .map(|&id| RouteEntry {
                        router_id: id,
                        link_quality_out: 3,
                        link_quality_in: 3,
                        route_cost: u8::from(id != router_id(rloc16)),
                    })
                    .collect(),
            }),
            DiagTlv::LeaderData(leader),
            DiagTlv::NetworkData(vec![0x08, 0x04, 0x0b, 0x02, 0x00, 0x00]),
            DiagTlv::Ip6AddressList(vec![self.rloc_for(rloc16)]),
            DiagTlv::MacCounters(MacCounters {
                if_in_ucast_pkts: u32::from(rloc16),
                if_out_ucast_pkts: u32::from(rloc16),
                ..MacCounters::default()
            }),
            DiagTlv::ChildTable(children),
            DiagTlv::ChannelPages(vec![0]),
            DiagTlv::MaxChildTimeout(0),
        ];
        if role == DeviceRole::Child {
            entries.push(DiagTlv::Timeout(240));
        }

        entries.retain(|tlv| tlv_types.contains(&tlv.tlv_type()));
        if !reports_rloc16 {
            entries.retain(|tlv| !matches!(tlv, DiagTlv::ShortAddress(_)));
        }
        entries
    }

    fn deliver(&self, delay: Duration, event: DiagnosticEvent) {
        let Some(sink) = self.sink.clone() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if sink.send(event).is_err() {
                        tracing::trace!("diagnostic sink closed");
                    }
                });
            }
            Err(_) => {
                if sink.send(event).is_err() {
                    tracing::trace!("diagnostic sink closed");
                }
            }
        }
    }
}

impl MeshControl for SimulatedMesh {
    fn border_agent_id(&self) -> Result<[u8; 16], MeshError> {
        Ok(self.ba_id)
    }

    fn device_role(&self) -> DeviceRole {
        self.role
    }

    fn leader_data(&self) -> Result<LeaderData, MeshError> {
        if !self.is_attached() {
            return Err(MeshError::InvalidState);
        }
        Ok(LeaderData {
            partition_id: self.topology.partition_id,
            weighting: 64,
            data_version: 1,
            stable_data_version: 1,
            leader_router_id: self.leader_router_id(),
        })
    }

    fn max_router_id(&self) -> u8 {
        MAX_ROUTER_ID
    }

    fn is_router_allocated(&self, router_id: u8) -> bool {
        self.router_ids().contains(&router_id)
    }

    fn ext_address(&self) -> [u8; 8] {
        self.ext_address
    }

    fn factory_eui64(&self) -> [u8; 8] {
        self.factory_eui64
    }

    fn set_ext_address(&mut self, address: [u8; 8]) -> Result<(), MeshError> {
        if self.role != DeviceRole::Disabled {
            return Err(MeshError::InvalidState);
        }
        self.ext_address = address;
        Ok(())
    }

    fn network_name(&self) -> String {
        self.active
            .as_ref()
            .and_then(|d| d.network_name.clone())
            .unwrap_or_else(|| self.topology.network_name.clone())
    }

    fn rloc16(&self) -> u16 {
        self.topology.rloc16
    }

    fn ext_panid(&self) -> [u8; 8] {
        self.active
            .as_ref()
            .and_then(|d| d.ext_pan_id)
            .unwrap_or(DEFAULT_EXT_PANID)
    }

    fn rloc_address(&self) -> Ipv6Addr {
        self.rloc_for(self.topology.rloc16)
    }

    fn mesh_local_eid(&self) -> Ipv6Addr {
        let mut octets = prefix_address(self.mesh_local_prefix()).octets();
        octets[8..].copy_from_slice(&self.ext_address);
        Ipv6Addr::from(octets)
    }

    fn is_ip6_enabled(&self) -> bool {
        self.ip6_enabled
    }

    fn set_ip6_enabled(&mut self, enabled: bool) -> Result<(), MeshError> {
        if !enabled && self.thread_enabled {
            return Err(MeshError::InvalidState);
        }
        self.ip6_enabled = enabled;
        Ok(())
    }

    fn set_thread_enabled(&mut self, enabled: bool) -> Result<(), MeshError> {
        if enabled {
            if !self.ip6_enabled {
                return Err(MeshError::InvalidState);
            }
            self.thread_enabled = true;
            self.role = if self.active.is_some() {
                self.topology.role
            } else {
                DeviceRole::Detached
            };
        } else {
            self.thread_enabled = false;
            self.role = DeviceRole::Disabled;
            self.commissioner = CommissionerState::Disabled;
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<(), MeshError> {
        self.set_thread_enabled(false)?;
        self.set_ip6_enabled(false)
    }

    fn erase_persistent_info(&mut self) -> Result<(), MeshError> {
        if self.role != DeviceRole::Disabled {
            return Err(MeshError::InvalidState);
        }
        self.active = None;
        self.pending = None;
        self.ext_address = self.factory_eui64;
        Ok(())
    }

    fn reset(&mut self) {
        self.joiners.clear();
        self.commissioner = CommissionerState::Disabled;
        self.srp_client_running = false;
        self.srp_auto_start = false;
        self.services.clear();
        self.host.state = SrpClientItemState::ToAdd;
        tracing::info!("simulated mesh reset");
    }

    fn dataset(&self, kind: DatasetKind) -> Result<OperationalDataset, MeshError> {
        match kind {
            DatasetKind::Active => self.active.clone(),
            DatasetKind::Pending => self.pending.clone(),
        }
        .ok_or(MeshError::NotFound)
    }

    fn set_dataset(
        &mut self,
        kind: DatasetKind,
        dataset: &OperationalDataset,
    ) -> Result<(), MeshError> {
        match kind {
            DatasetKind::Active => self.active = Some(dataset.clone()),
            DatasetKind::Pending => self.pending = Some(dataset.clone()),
        }
        Ok(())
    }

    fn create_new_network(&mut self) -> Result<OperationalDataset, MeshError> {
        let a = *uuid::Uuid::new_v4().as_bytes();
        let b = *uuid::Uuid::new_v4().as_bytes();
        let c = *uuid::Uuid::new_v4().as_bytes();

        let pan_id = u16::from_be_bytes([c[0], c[1]]);
        let mut ext_pan_id = [0; 8];
        ext_pan_id.copy_from_slice(&c[8..]);
        let mesh_local_prefix = [0xfd, c[2], c[3], c[4], c[5], c[6], 0, 0];

        Ok(OperationalDataset {
            active_timestamp: Some(Timestamp {
                seconds: 1,
                ..Timestamp::default()
            }),
            network_key: Some(a),
            network_name: Some(format!("OpenThread-{pan_id:04x}")),
            ext_pan_id: Some(ext_pan_id),
            mesh_local_prefix: Some(mesh_local_prefix),
            pan_id: Some(pan_id),
            channel: Some(11 + u16::from(c[7] % 16)),
            pskc: Some(b),
            security_policy: Some(SecurityPolicy::default()),
            channel_mask: Some(0x07ff_f800),
            ..OperationalDataset::default()
        })
    }

    fn commissioner_state(&self) -> CommissionerState {
        self.commissioner
    }

    fn commissioner_start(&mut self) -> Result<(), MeshError> {
        if !self.is_attached() {
            return Err(MeshError::InvalidState);
        }
        if self.commissioner != CommissionerState::Disabled {
            return Err(MeshError::Already);
        }
        self.commissioner = CommissionerState::Active;
        Ok(())
    }

    fn commissioner_stop(&mut self) -> Result<(), MeshError> {
        if self.commissioner == CommissionerState::Disabled {
            return Err(MeshError::Already);
        }
        self.commissioner = CommissionerState::Disabled;
        self.joiners.clear();
        Ok(())
    }

    fn joiners(&self) -> Vec<JoinerInfo> {
        self.joiners.clone()
    }

    fn add_joiner(&mut self, joiner: &JoinerInfo) -> Result<(), MeshError> {
        if self.commissioner != CommissionerState::Active {
            return Err(MeshError::InvalidState);
        }
        if !is_valid_pskd(&joiner.pskd) {
            return Err(MeshError::InvalidArgs);
        }
        if let Some(existing) = self.joiners.iter_mut().find(|j| j.id == joiner.id) {
            existing.clone_from(joiner);
            return Ok(());
        }
        if self.joiners.len() >= MAX_JOINERS {
            return Err(MeshError::NoBufs);
        }
        self.joiners.push(joiner.clone());
        Ok(())
    }

    fn remove_joiner(&mut self, id: &JoinerId) -> Result<(), MeshError> {
        let before = self.joiners.len();
        self.joiners.retain(|j| j.id != *id);
        if self.joiners.len() == before {
            return Err(MeshError::NotFound);
        }
        Ok(())
    }

    fn srp_server_state(&self) -> SrpServerState {
        match (self.srp_server_enabled, self.is_attached()) {
            (false, _) => SrpServerState::Disabled,
            (true, true) => SrpServerState::Running,
            (true, false) => SrpServerState::Stopped,
        }
    }

    fn set_srp_server_enabled(&mut self, enabled: bool) {
        self.srp_server_enabled = enabled;
    }

    fn is_srp_client_running(&self) -> bool {
        self.srp_client_running
    }

    fn srp_client_enable_auto_start(&mut self) {
        self.srp_auto_start = true;
        self.srp_client_running = self.is_attached();
    }

    fn srp_client_disable_auto_start(&mut self) {
        self.srp_auto_start = false;
    }

    fn srp_client_stop(&mut self) {
        self.srp_client_running = false;
    }

    fn srp_client_host(&self) -> SrpHostInfo {
        self.host.clone()
    }

    fn srp_client_host_name_capacity(&self) -> usize {
        SRP_HOST_NAME_CAPACITY
    }

    fn srp_client_set_host_address(&mut self, address: HostAddress) -> Result<(), MeshError> {
        if matches!(
            self.host.state,
            SrpClientItemState::ToRemove | SrpClientItemState::Removing
        ) {
            return Err(MeshError::InvalidState);
        }
        match address {
            HostAddress::Auto => {
                self.host.auto_address = true;
                self.host.addresses = vec![self.mesh_local_eid()];
            }
            HostAddress::Address(addr) => {
                self.host.auto_address = false;
                self.host.addresses = vec![addr];
            }
        }
        Ok(())
    }

    fn srp_client_set_host_name(&mut self, name: &str) -> Result<(), MeshError> {
        if !matches!(
            self.host.state,
            SrpClientItemState::ToAdd | SrpClientItemState::Removed
        ) {
            return Err(MeshError::InvalidState);
        }
        name.clone_into(&mut self.host.name);
        self.host.state = self.srp_item_state();
        Ok(())
    }

    fn srp_client_remove_host(&mut self) -> Result<(), MeshError> {
        if self.host.state == SrpClientItemState::Removed {
            return Err(MeshError::Already);
        }
        self.host.state = SrpClientItemState::Removed;
        self.host.name.clear();
        self.host.addresses.clear();
        self.services.clear();
        Ok(())
    }

    fn srp_client_services(&self) -> Vec<SrpService> {
        self.services.clone()
    }

    fn srp_client_add_service(&mut self, mut service: SrpService) -> Result<(), MeshError> {
        if self.services.iter().any(|s| {
            s.service_name == service.service_name && s.instance_name == service.instance_name
        }) {
            return Err(MeshError::Already);
        }
        if self.services.len() >= MAX_SRP_SERVICES {
            return Err(MeshError::NoBufs);
        }
        service.state = self.srp_item_state();
        self.services.push(service);
        Ok(())
    }

    fn srp_client_remove_service(
        &mut self,
        service_name: &str,
        instance_name: &str,
    ) -> Result<(), MeshError> {
        let index = self
            .services
            .iter()
            .position(|s| s.service_name == service_name && s.instance_name == instance_name)
            .ok_or(MeshError::NotFound)?;
        self.services.remove(index);
        Ok(())
    }

    fn send_diagnostic_query(
        &mut self,
        target: Ipv6Addr,
        tlv_types: &[u8],
    ) -> Result<(), MeshError> {
        if self.fail_queries {
            return Err(MeshError::NoBufs);
        }
        if !self.is_attached() {
            return Err(MeshError::InvalidState);
        }
        self.queries.push((target, tlv_types.to_vec()));

        if target == self.rloc_address() {
            let entries =
                self.diagnostic_entries(self.topology.rloc16, self.role, true, tlv_types);
            self.deliver(
                Duration::from_millis(self.topology.reply_delay_ms),
                DiagnosticEvent::Reply {
                    source: target,
                    entries,
                },
            );
            return Ok(());
        }

        let multicast = target == ALL_ROUTERS_MULTICAST;
        let peers: Vec<SimPeer> = self
            .topology
            .peers
            .iter()
            .filter(|p| {
                if multicast {
                    p.role.is_router()
                } else {
                    self.rloc_for(p.rloc16) == target
                }
            })
            .cloned()
            .collect();

        if !multicast && peers.is_empty() {
            self.deliver(
                Duration::from_millis(self.topology.reply_delay_ms),
                DiagnosticEvent::Failure(MeshError::ResponseTimeout),
            );
        }

        for peer in peers.into_iter().filter(|p| p.reachable) {
            let entries =
                self.diagnostic_entries(peer.rloc16, peer.role, peer.reports_rloc16, tlv_types);
            self.deliver(
                Duration::from_millis(peer.reply_delay_ms),
                DiagnosticEvent::Reply {
                    source: self.rloc_for(peer.rloc16),
                    entries,
                },
            );
        }
        Ok(())
    }
}

/// Router id encoded in the upper six bits of a short address
#[allow(clippy::cast_possible_truncation)]
const fn router_id(rloc16: u16) -> u8 {
    (rloc16 >> 10) as u8
}

fn ext_address_for(rloc16: u16) -> [u8; 8] {
    let [hi, lo] = rloc16.to_be_bytes();
    [0x16, 0x6e, 0x0a, 0x00, 0x00, 0x00, hi, lo]
}

/// PSKd: 6 to 32 uppercase alphanumerics, excluding I, O, Q and Z
fn is_valid_pskd(pskd: &str) -> bool {
    (6..=32).contains(&pskd.len())
        && pskd
            .chars()
            .all(|c| (c.is_ascii_uppercase() || c.is_ascii_digit()) && !"IOQZ".contains(c))
}
