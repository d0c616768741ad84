//! HTTP probe executor.
//!
//! Every call opens a fresh connection: idle pooling is disabled so a probe
//! never rides on a connection an earlier probe (or rate-limit decision)
//! left behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gv_core::{HttpMethod, ObservedResponse, Probe, ProbeRequest, TransportError};
use reqwest::{Client, Method, header};
use std::time::Duration;
use tracing::trace;

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .context("Failed to build HTTP probe client")?;
        Ok(Self { client })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn execute(&self, request: &ProbeRequest) -> Result<ObservedResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_method(request.method), request.url());
        if let Some(host) = &request.host_header {
            builder = builder.header(header::HOST, host);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::capture(&err))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // `text()` consumes the response, releasing the connection.
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::capture(&err))?;
        trace!(%request, status, "probe completed");

        Ok(ObservedResponse {
            status,
            headers,
            body,
        })
    }
}
