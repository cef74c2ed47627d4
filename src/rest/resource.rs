//! Dispatch table
//!
//! Paths resolve to a [`ResourceKind`]; each kind lists the methods it
//! accepts and [`Resources::handle`] matches on `(kind, method)` to reach the
//! handler. A second, smaller table maps paths whose responses complete
//! later to the resumption invoked by [`Resources::handle_callback`].

use std::collections::HashMap;
use std::time::Instant;

use super::{HttpMethod, HttpStatus, Request, Response, commissioner, dataset, node, srp};
use crate::diagnostics::{DiagnosticEngine, RoundState};
use crate::mesh::{DatasetKind, DiagnosticEvent, MeshControl};
use crate::Result;

/// A resource the gateway serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Diagnostics,
    Node,
    BaId,
    State,
    ExtAddress,
    NetworkName,
    LeaderData,
    NumOfRouter,
    Rloc16,
    ExtPanId,
    Rloc,
    DatasetActive,
    DatasetPending,
    IpaddrMleid,
    CommissionerState,
    CommissionerJoiner,
    SrpServerState,
    SrpClientState,
    SrpClientHost,
    SrpClientService,
}

impl ResourceKind {
    pub const ALL: [Self; 20] = [
        Self::Diagnostics,
        Self::Node,
        Self::BaId,
        Self::State,
        Self::ExtAddress,
        Self::NetworkName,
        Self::LeaderData,
        Self::NumOfRouter,
        Self::Rloc16,
        Self::ExtPanId,
        Self::Rloc,
        Self::DatasetActive,
        Self::DatasetPending,
        Self::IpaddrMleid,
        Self::CommissionerState,
        Self::CommissionerJoiner,
        Self::SrpServerState,
        Self::SrpClientState,
        Self::SrpClientHost,
        Self::SrpClientService,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Diagnostics => "/diagnostics",
            Self::Node => "/node",
            Self::BaId => "/node/ba-id",
            Self::State => "/node/state",
            Self::ExtAddress => "/node/ext-address",
            Self::NetworkName => "/node/network-name",
            Self::LeaderData => "/node/leader-data",
            Self::NumOfRouter => "/node/num-of-router",
            Self::Rloc16 => "/node/rloc16",
            Self::ExtPanId => "/node/ext-panid",
            Self::Rloc => "/node/rloc",
            Self::DatasetActive => "/node/dataset/active",
            Self::DatasetPending => "/node/dataset/pending",
            Self::IpaddrMleid => "/node/ipaddr/mleid",
            Self::CommissionerState => "/node/commissioner/state",
            Self::CommissionerJoiner => "/node/commissioner/joiner",
            Self::SrpServerState => "/node/srp/server/state",
            Self::SrpClientState => "/node/srp/client/state",
            Self::SrpClientHost => "/node/srp/client/host",
            Self::SrpClientService => "/node/srp/client/service",
        }
    }

    /// Methods with a handler, `OPTIONS` excluded
    #[must_use]
    pub const fn methods(self) -> &'static [HttpMethod] {
        use HttpMethod::{Delete, Get, Post, Put};

        match self {
            Self::Diagnostics
            | Self::BaId
            | Self::NetworkName
            | Self::LeaderData
            | Self::NumOfRouter
            | Self::Rloc16
            | Self::ExtPanId
            | Self::Rloc
            | Self::IpaddrMleid => &[Get],
            Self::Node => &[Get, Delete],
            Self::State
            | Self::ExtAddress
            | Self::DatasetActive
            | Self::DatasetPending
            | Self::CommissionerState
            | Self::SrpServerState
            | Self::SrpClientState => &[Get, Put],
            Self::SrpClientHost => &[Get, Put, Delete],
            Self::CommissionerJoiner | Self::SrpClientService => &[Get, Post, Delete],
        }
    }

    /// `OPTIONS` is served by every resource with a mutating method
    #[must_use]
    pub fn accepts_options(self) -> bool {
        self.methods().iter().any(|m| m.is_mutating())
    }
}

/// Resumptions for responses that complete after their handler returns
#[derive(Debug, Clone, Copy)]
enum Callback {
    Diagnostics,
}

/// The dispatch table together with the state its handlers act on
pub struct Resources {
    routes: HashMap<&'static str, ResourceKind>,
    callbacks: HashMap<&'static str, Callback>,
    mesh: Box<dyn MeshControl>,
    diagnostics: DiagnosticEngine,
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources")
            .field("routes", &self.routes.len())
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl Resources {
    #[must_use]
    pub fn new(mesh: Box<dyn MeshControl>, diagnostics: DiagnosticEngine) -> Self {
        let routes = ResourceKind::ALL
            .iter()
            .map(|&kind| (kind.path(), kind))
            .collect();
        let callbacks = HashMap::from([(ResourceKind::Diagnostics.path(), Callback::Diagnostics)]);

        Self {
            routes,
            callbacks,
            mesh,
            diagnostics,
        }
    }

    /// Look up the resource registered at exactly `path`
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ResourceKind> {
        self.routes.get(path).copied()
    }

    #[must_use]
    pub fn mesh(&self) -> &dyn MeshControl {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> &mut dyn MeshControl {
        self.mesh.as_mut()
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticEngine {
        &self.diagnostics
    }

    /// Dispatch `request`, leaving `response` complete unless its handler
    /// deferred completion
    pub fn handle(&mut self, request: &Request, response: &mut Response, now: Instant) {
        let path = request.path();
        let method = request.method();

        let Some(kind) = self.resolve(path) else {
            tracing::debug!(path, %method, "no such resource");
            response.set_error(HttpStatus::ResourceNotFound);
            return;
        };

        if method == HttpMethod::Options && kind.accepts_options() {
            response.set_status(HttpStatus::Ok);
            response.set_complete();
            return;
        }

        let Some(outcome) = self.invoke(kind, request, response, now) else {
            tracing::debug!(path, %method, "method not allowed");
            response.set_error(HttpStatus::MethodNotAllowed);
            return;
        };

        match outcome {
            Ok(()) => {
                if !response.needs_callback() {
                    response.set_complete();
                }
            }
            Err(err) => {
                tracing::debug!(path, %method, error = %err, "request failed");
                response.set_error(HttpStatus::from(&err));
            }
        }
    }

    /// Resume a pending response; paths without a callback are ignored
    pub fn handle_callback(&mut self, request: &Request, response: &mut Response, now: Instant) {
        let Some(callback) = self.callbacks.get(request.path()).copied() else {
            return;
        };
        match callback {
            Callback::Diagnostics => {
                let state = self.diagnostics.poll(response, now);
                if state == RoundState::Flushed {
                    tracing::trace!(path = request.path(), "pending response completed");
                }
            }
        }
    }

    /// Feed an asynchronous diagnostic outcome to the engine
    pub fn handle_diagnostic_event(&mut self, event: DiagnosticEvent, now: Instant) {
        self.diagnostics.on_event(event, now);
    }

    /// Run the handler for `(kind, method)`, or `None` if there is none
    fn invoke(
        &mut self,
        kind: ResourceKind,
        request: &Request,
        response: &mut Response,
        now: Instant,
    ) -> Option<Result<()>> {
        use HttpMethod::{Delete, Get, Post, Put};
        use ResourceKind as K;

        let mesh = self.mesh.as_mut();
        let body = request.body();

        let outcome = match (kind, request.method()) {
            (K::Diagnostics, Get) => self.diagnostics.begin(mesh, response, now).map(|_| ()),

            (K::Node, Get) => node::get_info(mesh, response),
            (K::Node, Delete) => node::delete(mesh),
            (K::BaId, Get) => node::get_ba_id(mesh, response),
            (K::State, Get) => node::get_state(mesh, response),
            (K::State, Put) => node::set_state(mesh, body),
            (K::ExtAddress, Get) => node::get_ext_address(mesh, response),
            (K::ExtAddress, Put) => node::set_ext_address(mesh, body),
            (K::NetworkName, Get) => node::get_network_name(mesh, response),
            (K::LeaderData, Get) => node::get_leader_data(mesh, response),
            (K::NumOfRouter, Get) => node::get_num_of_router(mesh, response),
            (K::Rloc16, Get) => node::get_rloc16(mesh, response),
            (K::ExtPanId, Get) => node::get_ext_panid(mesh, response),
            (K::Rloc, Get) => node::get_rloc(mesh, response),
            (K::IpaddrMleid, Get) => node::get_mleid(mesh, response),

            (K::DatasetActive, Get) => dataset::get(mesh, DatasetKind::Active, request, response),
            (K::DatasetActive, Put) => dataset::set(mesh, DatasetKind::Active, request, response),
            (K::DatasetPending, Get) => dataset::get(mesh, DatasetKind::Pending, request, response),
            (K::DatasetPending, Put) => dataset::set(mesh, DatasetKind::Pending, request, response),

            (K::CommissionerState, Get) => commissioner::get_state(mesh, response),
            (K::CommissionerState, Put) => commissioner::set_state(mesh, body),
            (K::CommissionerJoiner, Get) => commissioner::get_joiners(mesh, response),
            (K::CommissionerJoiner, Post) => commissioner::add_joiner(mesh, body),
            (K::CommissionerJoiner, Delete) => commissioner::remove_joiner(mesh, body),

            (K::SrpServerState, Get) => srp::get_server_state(mesh, response),
            (K::SrpServerState, Put) => srp::set_server_state(mesh, body),
            (K::SrpClientState, Get) => srp::get_client_state(mesh, response),
            (K::SrpClientState, Put) => srp::set_client_state(mesh, body),
            (K::SrpClientHost, Get) => srp::get_host(mesh, response),
            (K::SrpClientHost, Put) => srp::set_host(mesh, body),
            (K::SrpClientHost, Delete) => srp::remove_host(mesh),
            (K::SrpClientService, Get) => srp::get_services(mesh, response),
            (K::SrpClientService, Post) => srp::add_service(mesh, body),
            (K::SrpClientService, Delete) => srp::remove_service(mesh, body),

            _ => return None,
        };
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mesh::SimulatedMesh;

    fn resources() -> Resources {
        Resources::new(
            Box::new(SimulatedMesh::default()),
            DiagnosticEngine::default(),
        )
    }

    fn dispatch(resources: &mut Resources, method: HttpMethod, path: &str) -> Response {
        let now = Instant::now();
        let request = Request::new(method, path, now);
        let mut response = Response::new();
        resources.handle(&request, &mut response, now);
        response
    }

    #[test]
    fn unknown_path_is_not_found() {
        let mut res = resources();
        let resp = dispatch(&mut res, HttpMethod::Get, "/node/nope");
        assert!(resp.is_complete());
        assert_eq!(resp.status(), HttpStatus::ResourceNotFound);
    }

    #[test]
    fn paths_match_exactly() {
        let res = resources();
        assert_eq!(res.resolve("/node"), Some(ResourceKind::Node));
        assert_eq!(res.resolve("/node/"), None);
        assert_eq!(res.resolve("/NODE"), None);
    }

    #[test]
    fn unsupported_method_is_not_allowed() {
        let mut res = resources();
        let resp = dispatch(&mut res, HttpMethod::Post, "/node/rloc16");
        assert_eq!(resp.status(), HttpStatus::MethodNotAllowed);
        assert!(resp.is_complete());
    }

    #[test]
    fn options_on_mutating_resource_is_empty_ok() {
        let mut res = resources();
        let resp = dispatch(&mut res, HttpMethod::Options, "/node/dataset/active");
        assert!(resp.is_complete());
        assert_eq!(resp.status(), HttpStatus::Ok);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn options_on_read_only_resource_is_not_allowed() {
        let mut res = resources();
        let resp = dispatch(&mut res, HttpMethod::Options, "/node/rloc16");
        assert_eq!(resp.status(), HttpStatus::MethodNotAllowed);

        let resp = dispatch(&mut res, HttpMethod::Options, "/diagnostics");
        assert_eq!(resp.status(), HttpStatus::MethodNotAllowed);
    }

    #[test]
    fn every_listed_method_has_a_handler() {
        for kind in ResourceKind::ALL {
            for &method in kind.methods() {
                let mut res = resources();
                let resp = dispatch(&mut res, method, kind.path());
                assert_ne!(
                    resp.status(),
                    HttpStatus::MethodNotAllowed,
                    "{method} {}",
                    kind.path()
                );
            }
        }
    }

    #[test]
    fn diagnostics_get_is_deferred() {
        let mut res = resources();
        let resp = dispatch(&mut res, HttpMethod::Get, "/diagnostics");
        assert!(!resp.is_complete());
        assert!(resp.needs_callback());
    }

    #[test]
    fn diagnostics_query_failure_completes_with_500() {
        let mut mesh = SimulatedMesh::default();
        mesh.fail_diagnostic_queries(true);
        let mut res = Resources::new(Box::new(mesh), DiagnosticEngine::default());

        let resp = dispatch(&mut res, HttpMethod::Get, "/diagnostics");
        assert!(resp.is_complete());
        assert_eq!(resp.status(), HttpStatus::InternalServerError);
    }

    #[test]
    fn callback_for_other_paths_is_a_no_op() {
        let mut res = resources();
        let now = Instant::now();
        let request = Request::new(HttpMethod::Get, "/node", now);
        let mut response = Response::new();
        response.set_callback(now);

        res.handle_callback(&request, &mut response, now + Duration::from_secs(10));
        assert!(!response.is_complete());
    }
}
