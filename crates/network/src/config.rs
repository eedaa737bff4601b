use serde::{Deserialize, Serialize};

pub const DEFAULT_TOR_SOCKS_ADDR: &str = "127.0.0.1:9050";
pub const PRODUCTION_SERVER_URL: &str = "https://anonymous.ads.brave.com";
pub const STAGING_SERVER_URL: &str = "https://anonymous.ads.bravesoftware.com";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    pub fn server_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_SERVER_URL,
            Environment::Staging => STAGING_SERVER_URL,
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,
    /// Takes precedence over the environment's server when set
    pub server_url: Option<String>,
    /// SOCKS5 proxy (e.g. a local Tor daemon); direct connection when unset
    pub socks_addr: Option<String>,
    pub timeout_secs: u64,
    pub verify_tls: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            server_url: None,
            socks_addr: None,
            timeout_secs: 30,
            verify_tls: true,
        }
    }
}

impl Config {
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_socks_addr(mut self, addr: impl Into<String>) -> Self {
        self.socks_addr = Some(addr.into());
        self
    }

    pub fn with_tor(self) -> Self {
        self.with_socks_addr(DEFAULT_TOR_SOCKS_ADDR)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn without_tls_verification(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        let url = self
            .server_url
            .as_deref()
            .unwrap_or_else(|| self.environment.server_url());
        url.trim_end_matches('/').to_string()
    }
}
