use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::debug;

use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::request::{Method, NetworkClient, UrlRequest, UrlResponse};

pub struct ConfirmationsHttpClient {
    client: Client,
    config: Config,
}

impl ConfirmationsHttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(socks_addr) = &config.socks_addr {
            let proxy_url = format!("socks5h://{}", socks_addr);
            let proxy = Proxy::all(&proxy_url)
                .map_err(|e| NetworkError::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| NetworkError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl NetworkClient for ConfirmationsHttpClient {
    async fn send(&self, request: UrlRequest) -> Result<UrlResponse> {
        let url = self.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type.as_str());
        }

        if let Some(content) = request.content {
            builder = builder.body(content);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout(format!("{} {} timed out: {}", request.method, url, e))
            } else if e.is_connect() {
                NetworkError::Connection(format!("{} {} failed: {}", request.method, url, e))
            } else {
                NetworkError::Http(format!("{} request failed: {}", request.method, e))
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::InvalidResponse(format!("Failed to read body: {}", e)))?;

        debug!("{} {} responded with {}", request.method, url, status_code);

        Ok(UrlResponse {
            status_code,
            body,
            headers,
        })
    }
}
