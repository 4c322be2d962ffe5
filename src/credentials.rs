//! Partner API credentials and URL construction.

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::error::NodeError;
use crate::transport::{ApiRequest, Transport};

pub const DEFAULT_API_ROOT: &str = "https://cloud.defensx.com";
pub const API_BASE_PATH: &str = "/api/partner/v1";
/// Endpoint probed by [`Credentials::test_connection`].
pub const STATUS_ENDPOINT: &str = "/status";

/// API root and bearer key of a DefensX partner account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default = "default_api_root")]
    pub api_root: String,
    pub api_key: String,
}

fn default_api_root() -> String {
    DEFAULT_API_ROOT.to_string()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_root", &self.api_root)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_root: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            api_key: api_key.into(),
        }
    }

    /// Root without trailing slashes; fails when nothing is left.
    pub fn base_url(&self) -> Result<String, NodeError> {
        let root = self.api_root.trim().trim_end_matches('/');
        if root.is_empty() {
            return Err(NodeError::MissingApiRoot);
        }
        Ok(format!("{root}{API_BASE_PATH}"))
    }

    /// `{root}/api/partner/v1{endpoint}`, adding the leading slash when missing.
    pub fn api_url(&self, endpoint: &str) -> Result<String, NodeError> {
        let base = self.base_url()?;
        if endpoint.starts_with('/') {
            Ok(format!("{base}{endpoint}"))
        } else {
            Ok(format!("{base}/{endpoint}"))
        }
    }

    /// Probe `GET /status`; only HTTP 200 counts as reachable.
    pub fn test_connection<T: Transport>(&self, transport: &T) -> Result<(), NodeError> {
        let url = self.api_url(STATUS_ENDPOINT)?;
        let (status, _) = transport.exchange(&ApiRequest::get(url.clone()))?;
        if status != StatusCode::OK {
            return Err(NodeError::UnexpectedStatus { status });
        }
        info!(%url, "connection verified");
        Ok(())
    }
}
