//! Mesh control interface
//!
//! [`MeshControl`] is everything the gateway needs from the mesh protocol
//! stack. Calls are synchronous and cheap; the only asynchronous surface is
//! network diagnostics, whose replies come back through a [`DiagnosticSink`]
//! as [`DiagnosticEvent`]s, zero or more per query, in no particular order.

pub mod dataset;
pub mod sim;
pub mod types;

use std::net::Ipv6Addr;

use tokio::sync::mpsc;

pub use dataset::OperationalDataset;
pub use sim::{SimPeer, SimTopology, SimulatedMesh};
pub use types::{
    CommissionerState, DatasetKind, DeviceRole, HostAddress, JoinerDiscerner, JoinerId,
    JoinerInfo, LeaderData, SrpClientItemState, SrpHostInfo, SrpServerState, SrpService,
    TxtEntry,
};

use crate::diagnostics::DiagTlv;

/// Error codes reported by the mesh control library
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("operation failed")]
    Failed,

    #[error("insufficient buffers")]
    NoBufs,

    #[error("invalid arguments")]
    InvalidArgs,

    #[error("invalid state")]
    InvalidState,

    #[error("not found")]
    NotFound,

    #[error("busy")]
    Busy,

    #[error("already in progress")]
    Already,

    #[error("not implemented")]
    NotImplemented,

    #[error("response timeout")]
    ResponseTimeout,
}

/// Asynchronous outcome of a diagnostic query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// One device answered; entries are in arrival order
    Reply {
        source: Ipv6Addr,
        entries: Vec<DiagTlv>,
    },
    /// A query (or one of its answers) failed
    Failure(MeshError),
}

/// Channel the mesh backend delivers diagnostic events on
pub type DiagnosticSink = mpsc::UnboundedSender<DiagnosticEvent>;

/// Receiving half of a [`DiagnosticSink`]
pub type DiagnosticEvents = mpsc::UnboundedReceiver<DiagnosticEvent>;

/// Create a connected diagnostic event channel
#[must_use]
pub fn diagnostic_channel() -> (DiagnosticSink, DiagnosticEvents) {
    mpsc::unbounded_channel()
}

/// Operations the gateway performs against the mesh stack
pub trait MeshControl: Send {
    // Node

    /// Border agent identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the border agent is not running.
    fn border_agent_id(&self) -> Result<[u8; 16], MeshError>;
    fn device_role(&self) -> DeviceRole;
    /// # Errors
    ///
    /// Returns an error if the device is not attached to a partition.
    fn leader_data(&self) -> Result<LeaderData, MeshError>;
    fn max_router_id(&self) -> u8;
    /// Whether `router_id` is currently allocated in the partition
    fn is_router_allocated(&self, router_id: u8) -> bool;
    fn ext_address(&self) -> [u8; 8];
    fn factory_eui64(&self) -> [u8; 8];
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidState`] while the interface is up.
    fn set_ext_address(&mut self, address: [u8; 8]) -> Result<(), MeshError>;
    fn network_name(&self) -> String;
    fn rloc16(&self) -> u16;
    fn ext_panid(&self) -> [u8; 8];
    fn rloc_address(&self) -> Ipv6Addr;
    fn mesh_local_eid(&self) -> Ipv6Addr;
    fn is_ip6_enabled(&self) -> bool;
    /// # Errors
    ///
    /// Returns an error if the interface cannot change state.
    fn set_ip6_enabled(&mut self, enabled: bool) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns an error if the protocol cannot be started or stopped.
    fn set_thread_enabled(&mut self, enabled: bool) -> Result<(), MeshError>;
    /// Leave the partition gracefully
    ///
    /// # Errors
    ///
    /// Returns an error if a detach is already in progress.
    fn detach(&mut self) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidState`] unless the stack is disabled.
    fn erase_persistent_info(&mut self) -> Result<(), MeshError>;
    /// Reset the stack
    fn reset(&mut self);

    // Datasets

    /// # Errors
    ///
    /// Returns [`MeshError::NotFound`] when no dataset of this kind exists.
    fn dataset(&self, kind: DatasetKind) -> Result<OperationalDataset, MeshError>;
    /// # Errors
    ///
    /// Returns an error if the dataset is rejected.
    fn set_dataset(&mut self, kind: DatasetKind, dataset: &OperationalDataset)
    -> Result<(), MeshError>;
    /// Generate a fresh random network dataset (not committed)
    ///
    /// # Errors
    ///
    /// Returns an error if randomness or buffers are unavailable.
    fn create_new_network(&mut self) -> Result<OperationalDataset, MeshError>;

    // Commissioner

    fn commissioner_state(&self) -> CommissionerState;
    /// # Errors
    ///
    /// Returns an error if the petition cannot be sent.
    fn commissioner_start(&mut self) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns an error if the commissioner cannot resign.
    fn commissioner_stop(&mut self) -> Result<(), MeshError>;
    fn joiners(&self) -> Vec<JoinerInfo>;
    /// # Errors
    ///
    /// Returns [`MeshError::NoBufs`] when the joiner table is full.
    fn add_joiner(&mut self, joiner: &JoinerInfo) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns [`MeshError::NotFound`] when no matching entry exists.
    fn remove_joiner(&mut self, id: &JoinerId) -> Result<(), MeshError>;

    // SRP

    fn srp_server_state(&self) -> SrpServerState;
    fn set_srp_server_enabled(&mut self, enabled: bool);
    fn is_srp_client_running(&self) -> bool;
    fn srp_client_enable_auto_start(&mut self);
    fn srp_client_disable_auto_start(&mut self);
    fn srp_client_stop(&mut self);
    fn srp_client_host(&self) -> SrpHostInfo;
    /// Capacity of the host name buffer, including the terminator
    fn srp_client_host_name_capacity(&self) -> usize;
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidState`] if the host is being removed.
    fn srp_client_set_host_address(&mut self, address: HostAddress) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidState`] once the host is registered.
    fn srp_client_set_host_name(&mut self, name: &str) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns an error if removal cannot be started.
    fn srp_client_remove_host(&mut self) -> Result<(), MeshError>;
    fn srp_client_services(&self) -> Vec<SrpService>;
    /// # Errors
    ///
    /// Returns [`MeshError::NoBufs`] when no service entry can be allocated,
    /// [`MeshError::Already`] for a duplicate.
    fn srp_client_add_service(&mut self, service: SrpService) -> Result<(), MeshError>;
    /// # Errors
    ///
    /// Returns [`MeshError::NotFound`] when the service is not registered.
    fn srp_client_remove_service(
        &mut self,
        service_name: &str,
        instance_name: &str,
    ) -> Result<(), MeshError>;

    // Diagnostics

    /// Send a network diagnostic query for `tlv_types` to `target`
    ///
    /// Replies arrive later as [`DiagnosticEvent`]s.
    ///
    /// # Errors
    ///
    /// Returns an error if the query could not be sent.
    fn send_diagnostic_query(&mut self, target: Ipv6Addr, tlv_types: &[u8])
    -> Result<(), MeshError>;
}
