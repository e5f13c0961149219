//! HTTP client construction shared by the prober and the reputation fetcher

use crate::proxy::models::{ProxyEndpoint, ProxyType};
use reqwest::{Client, ClientBuilder, Proxy as ReqwestProxy};
use std::time::Duration;

/// Default user agent for outgoing requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Network path a request takes
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Straight from this machine, ignoring any proxy environment variables
    Direct,
    /// Through a proxy endpoint using the given protocol
    Via(&'a ProxyEndpoint, ProxyType),
}

/// Options shared by every client built here
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl TransportOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Build the proxy configuration for an endpoint and protocol
pub fn proxy_for(endpoint: &ProxyEndpoint, protocol: ProxyType) -> reqwest::Result<ReqwestProxy> {
    ReqwestProxy::all(endpoint.transport_url(protocol))
}

/// Build a client that sends every request along `route`
pub fn build_client(route: Route<'_>, options: &TransportOptions) -> reqwest::Result<Client> {
    let builder = Client::builder()
        .timeout(options.timeout)
        .connect_timeout(options.timeout)
        .user_agent(&options.user_agent)
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .pool_max_idle_per_host(0);

    let builder: ClientBuilder = match route {
        Route::Direct => builder.no_proxy(),
        Route::Via(endpoint, protocol) => builder.proxy(proxy_for(endpoint, protocol)?),
    };

    builder.build()
}
