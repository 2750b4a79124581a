//! Transparent HTTP interception
//!
//! [`InterceptedClient`] wraps a `reqwest::Client` so the host's outbound
//! calls are observed for telemetry without changing what the caller sees:
//!
//! - A non-2xx status synthesizes a network-error event, then the response
//!   is returned unchanged.
//! - A transport error (DNS, connect, timeout) synthesizes a network-error
//!   event, then the **original error is returned unchanged** so caller
//!   code observes the failure exactly as it would without the wrapper.

use reqwest::{Client, Method, Request, RequestBuilder, Response};
use tracing::debug;

use faultline_core::domain::event::ErrorEvent;

use crate::hub::EventSink;

/// HTTP client wrapper emitting telemetry for failed calls
pub struct InterceptedClient {
    client: Client,
    sink: EventSink,
}

impl InterceptedClient {
    /// Wraps `client`, forwarding failure events to `sink`
    pub fn new(client: Client, sink: EventSink) -> Self {
        Self { client, sink }
    }

    /// Creates a request builder on the wrapped client
    ///
    /// The builder must come back through [`send`](InterceptedClient::send)
    /// (or [`execute`](InterceptedClient::execute)) for its failures to be
    /// captured.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Convenience GET through the interception path
    pub async fn get(&self, url: &str) -> reqwest::Result<Response> {
        self.send(self.client.get(url)).await
    }

    /// Sends a built request, capturing failures transparently
    pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let method = request.method().as_str().to_owned();
        let url = request.url().as_str().to_owned();

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    debug!(%method, %url, status = status.as_u16(), "Intercepted failing response");
                    (self.sink)(ErrorEvent::http_status(&method, &url, status.as_u16()));
                }
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "Intercepted transport error");
                (self.sink)(ErrorEvent::http_transport(&method, &url, &err.to_string()));
                // Re-raise contract: the caller must observe the original
                // failure unchanged.
                Err(err)
            }
        }
    }

    /// Builds and sends a request from a builder
    ///
    /// A builder that fails to build (invalid URL, bad header) is returned
    /// as-is; only built requests flow through interception.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        match builder.build() {
            Ok(request) => self.execute(request).await,
            Err(err) => Err(err),
        }
    }

    /// Returns the wrapped client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
