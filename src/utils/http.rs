use std::time::Duration;

use reqwest::Client;

/// Builds the client shared by every provider. Per-call timeouts are set on
/// each request; this one bounds connection setup.
pub fn build_http_client(connect_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
