//! Request plumbing for the ads confirmations server.
//!
//! ```rust,no_run
//! use confirmations_net::{Config, ConfirmationsHttpClient, Method, NetworkClient, UrlRequest};
//!
//! #[tokio::main]
//! async fn main() -> confirmations_net::Result<()> {
//!     // Route through a local Tor daemon
//!     let client = ConfirmationsHttpClient::new(Config::default().with_tor())?;
//!
//!     let request = UrlRequest::new(Method::Get, "/v3/issuers/");
//!     let response = client.send(request).await?;
//!     println!("status: {}", response.status_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod request;

pub use config::{
    Config, Environment, DEFAULT_TOR_SOCKS_ADDR, PRODUCTION_SERVER_URL, STAGING_SERVER_URL,
};
pub use error::{NetworkError, Result};
pub use http_client::ConfirmationsHttpClient;
pub use request::{Method, NetworkClient, UrlRequest, UrlResponse, HTTP_OK};

pub fn confirmations_client(environment: Environment) -> Result<ConfirmationsHttpClient> {
    ConfirmationsHttpClient::new(Config::default().with_environment(environment))
}

// direct connection to an arbitrary server, for local mock servers
#[cfg(any(test, feature = "test-utils"))]
pub fn local_client(server_url: &str) -> Result<ConfirmationsHttpClient> {
    ConfirmationsHttpClient::new(Config::default().with_server_url(server_url))
}
