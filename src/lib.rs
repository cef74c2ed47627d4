//! Mesh Gateway - REST management plane for low-power mesh border devices
//!
//! This library provides the core functionality for the gateway:
//! - A dispatch table mapping paths and methods to resource handlers
//! - Node, dataset, commissioner and SRP resources over a mesh control interface
//! - Network diagnostics aggregated from asynchronous, fan-out replies
//! - A single-owner event loop and an HTTP adaptor that feeds it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  HTTP (axum)                         │
//! │        forward ──► mailbox ◄── oneshot reply         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Event loop                          │
//! │   Dispatch table  │  Completion poller  │  Events    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Mesh control                           │
//! │   Node  │  Datasets  │  Commissioner  │  SRP  │ Diag │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod diagnostics;
pub mod error;
pub mod mainloop;
pub mod mesh;
pub mod rest;

pub use config::Config;
pub use daemon::Daemon;
pub use diagnostics::{DiagnosticCache, DiagnosticEngine};
pub use error::{Error, Result};
pub use mainloop::{Envelope, Mailbox, Mainloop};
pub use mesh::{MeshControl, MeshError, SimTopology, SimulatedMesh};
pub use rest::{HttpMethod, HttpStatus, Request, Resources, Response};
