//! Status mapper
//!
//! Every error that reaches the transport goes through [`HttpStatus`], both the
//! gateway's own [`Error`] kinds and the mesh library's
//! [`MeshError`](crate::mesh::MeshError) after the handler has remapped it.

use serde::Serialize;

use crate::Error;

/// Result kinds a handler can surface to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HttpStatus {
    Ok,
    Created,
    NoContent,
    BadRequest,
    ResourceNotFound,
    MethodNotAllowed,
    RequestTimeout,
    Conflict,
    InternalServerError,
    InsufficientStorage,
}

impl HttpStatus {
    /// Numeric status code
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::BadRequest => 400,
            Self::ResourceNotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::RequestTimeout => 408,
            Self::Conflict => 409,
            Self::InternalServerError => 500,
            Self::InsufficientStorage => 507,
        }
    }

    /// Full status line, e.g. `"404 Not Found"`
    #[must_use]
    pub const fn status_line(self) -> &'static str {
        match self {
            Self::Ok => "200 OK",
            Self::Created => "201 Created",
            Self::NoContent => "204 No Content",
            Self::BadRequest => "400 Bad Request",
            Self::ResourceNotFound => "404 Not Found",
            Self::MethodNotAllowed => "405 Method Not Allowed",
            Self::RequestTimeout => "408 Request Timeout",
            Self::Conflict => "409 Conflict",
            Self::InternalServerError => "500 Internal Server Error",
            Self::InsufficientStorage => "507 Insufficient Storage",
        }
    }

    /// Machine-readable kind name
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Created => "Created",
            Self::NoContent => "NoContent",
            Self::BadRequest => "BadRequest",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::RequestTimeout => "RequestTimeout",
            Self::Conflict => "Conflict",
            Self::InternalServerError => "InternalServerError",
            Self::InsufficientStorage => "InsufficientStorage",
        }
    }

    /// Serialized JSON error body for this status
    #[must_use]
    pub fn error_body(self) -> String {
        let body = ErrorBody {
            error_code: self.code(),
            error_kind: self.kind(),
            error_message: self.status_line(),
        };
        // A struct of integers and static strings always serializes
        serde_json::to_string(&body).unwrap_or_default()
    }
}

impl From<&Error> for HttpStatus {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidArgs(_) => Self::BadRequest,
            Error::InvalidState(_) => Self::Conflict,
            Error::NotFound(_) => Self::ResourceNotFound,
            Error::InsufficientStorage(_) => Self::InsufficientStorage,
            Error::Timeout => Self::RequestTimeout,
            Error::Internal(_) | Error::Config(_) | Error::Io(_) | Error::Serialization(_) => {
                Self::InternalServerError
            }
        }
    }
}

/// JSON body written for every error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    error_code: u16,
    error_kind: &'static str,
    error_message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_match_codes() {
        for status in [
            HttpStatus::Ok,
            HttpStatus::Created,
            HttpStatus::NoContent,
            HttpStatus::BadRequest,
            HttpStatus::ResourceNotFound,
            HttpStatus::MethodNotAllowed,
            HttpStatus::RequestTimeout,
            HttpStatus::Conflict,
            HttpStatus::InternalServerError,
            HttpStatus::InsufficientStorage,
        ] {
            assert!(status.status_line().starts_with(&status.code().to_string()));
        }
    }

    #[test]
    fn error_body_carries_kind() {
        let body: serde_json::Value =
            serde_json::from_str(&HttpStatus::InsufficientStorage.error_body()).unwrap();
        assert_eq!(body["ErrorCode"], 507);
        assert_eq!(body["ErrorKind"], "InsufficientStorage");
        assert_eq!(body["ErrorMessage"], "507 Insufficient Storage");
    }

    #[test]
    fn gateway_errors_map_to_statuses() {
        assert_eq!(
            HttpStatus::from(&Error::invalid_args("x")),
            HttpStatus::BadRequest
        );
        assert_eq!(
            HttpStatus::from(&Error::invalid_state("x")),
            HttpStatus::Conflict
        );
        assert_eq!(
            HttpStatus::from(&Error::NotFound("x".into())),
            HttpStatus::ResourceNotFound
        );
        assert_eq!(HttpStatus::from(&Error::Timeout), HttpStatus::RequestTimeout);
        assert_eq!(
            HttpStatus::from(&Error::Config("x".into())),
            HttpStatus::InternalServerError
        );
    }
}
