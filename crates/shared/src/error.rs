use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "status", rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// Transport-level failure: connect, timeout, reset while reading the body.
    Network,
    HttpStatus(u16),
    /// The body did not decode into the expected shape.
    Decode,
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailureKind::Network => f.write_str("network failure"),
            FetchFailureKind::HttpStatus(status) => write!(f, "http status {status}"),
            FetchFailureKind::Decode => f.write_str("undecodable body"),
        }
    }
}

/// A failed read against the launch API.
///
/// Presentation code treats every variant the same way; `kind` and `message` are kept for
/// diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("failed to fetch {}: {kind}: {message}", target(.resource, .id))]
pub struct FetchFailure {
    pub resource: Resource,
    pub id: Option<String>,
    pub kind: FetchFailureKind,
    pub message: String,
}

fn target(resource: &Resource, id: &Option<String>) -> String {
    match id {
        Some(id) => format!("{resource}/{id}"),
        None => resource.to_string(),
    }
}

impl FetchFailure {
    pub fn new(
        resource: Resource,
        id: Option<&str>,
        kind: FetchFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            id: id.map(str::to_string),
            kind,
            message: message.into(),
        }
    }

    pub fn network(resource: Resource, id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(resource, id, FetchFailureKind::Network, message)
    }

    pub fn http_status(resource: Resource, id: Option<&str>, status: u16) -> Self {
        Self::new(
            resource,
            id,
            FetchFailureKind::HttpStatus(status),
            "server returned a non-success status",
        )
    }

    pub fn decode(resource: Resource, id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(resource, id, FetchFailureKind::Decode, message)
    }
}
