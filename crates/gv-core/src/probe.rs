//! The probe seam: one network attempt against the gateway.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cause::TransportError;
use crate::endpoint::GatewayEndpoint;
use crate::outcome::ObservedResponse;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one probe needs. `address` is `host[:port]` of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub address: String,
    pub method: HttpMethod,
    pub path: String,
    pub host_header: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl ProbeRequest {
    pub fn new(address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            method: HttpMethod::Get,
            path: path.into(),
            host_header: None,
            headers: Vec::new(),
        }
    }

    /// Request against a resolved gateway.
    pub fn to_gateway(endpoint: &GatewayEndpoint, path: impl Into<String>) -> Self {
        Self::new(endpoint.address(), path)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_host_header(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `http://<address><path>`, with a leading slash enforced on the path.
    pub fn url(&self) -> String {
        if self.path.starts_with('/') {
            format!("http://{}{}", self.address, self.path)
        } else {
            format!("http://{}/{}", self.address, self.path)
        }
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url())?;
        if let Some(host) = &self.host_header {
            write!(f, " (host {host})")?;
        }
        Ok(())
    }
}

/// Executes one independent network attempt. Implementations must not keep
/// connections alive between calls.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn execute(&self, request: &ProbeRequest) -> Result<ObservedResponse, TransportError>;
}
