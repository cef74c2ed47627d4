//! REST resources
//!
//! Transport-independent request handling: the [`Request`]/[`Response`]
//! values, the [`HttpStatus`] mapper, and the [`Resources`] dispatch table
//! with its handlers.

mod commissioner;
mod dataset;
pub mod json;
mod node;
pub mod resource;
mod srp;
pub mod status;
pub mod types;

pub use resource::{ResourceKind, Resources};
pub use status::HttpStatus;
pub use types::{
    ACCEPT_HEADER, CONTENT_TYPE_HEADER, CONTENT_TYPE_JSON, CONTENT_TYPE_PLAIN, HttpMethod,
    Request, Response,
};

use crate::Error;
use crate::mesh::MeshError;

/// Library failure the caller can fix by changing mesh state (409)
fn conflict(err: MeshError) -> Error {
    Error::invalid_state(err.to_string())
}

/// Library failure with no corrective action (500)
fn internal(err: MeshError) -> Error {
    Error::internal(err.to_string())
}
