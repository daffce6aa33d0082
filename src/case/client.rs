use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use tracing::{debug, info, warn};

use crate::config::Config;

use super::api_types::{classify_response, is_auth_failure};
use super::error::LookupError;
use super::receipt::ReceiptNumber;
use super::record::CaseRecord;

/// Result of probing the API with the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
  /// Not probed yet
  #[default]
  Unknown,
  Authenticated,
  NotAuthenticated,
}

/// Anything that can answer case lookups.
#[async_trait]
pub trait CaseSource: Send + Sync {
  /// Fetch the current record for a receipt number
  async fn fetch_case(&self, receipt: &ReceiptNumber) -> Result<CaseRecord, LookupError>;

  /// Find out whether the session is accepted by the API
  async fn probe_auth(&self) -> AuthStatus;
}

/// HTTP client for the case-status API
#[derive(Clone)]
pub struct CaseClient {
  http: reqwest::Client,
  base_url: String,
  probe_receipt: String,
  cookie: Option<String>,
}

impl CaseClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("casewatch/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.api.base_url.trim_end_matches('/').to_string(),
      probe_receipt: config.api.auth_probe_receipt.clone(),
      cookie: Config::session_cookie(),
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn case_url(&self, receipt: &str) -> String {
    format!("{}/{}", self.base_url, receipt)
  }

  /// GET a case URL with the session attached, returning status and body
  async fn get(&self, receipt: &str) -> Result<(u16, Vec<u8>), reqwest::Error> {
    let mut request = self
      .http
      .get(self.case_url(receipt))
      .header(ACCEPT, "application/json")
      .header(CONTENT_TYPE, "application/json");

    if let Some(cookie) = &self.cookie {
      request = request.header(COOKIE, cookie);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    Ok((status, body.to_vec()))
  }
}

/// Anything but 401/403 (404 and 5xx included) means the session was accepted
fn probe_status(status: u16) -> AuthStatus {
  if is_auth_failure(status) {
    AuthStatus::NotAuthenticated
  } else {
    AuthStatus::Authenticated
  }
}

#[async_trait]
impl CaseSource for CaseClient {
  async fn fetch_case(&self, receipt: &ReceiptNumber) -> Result<CaseRecord, LookupError> {
    let (status, body) = self.get(receipt.as_str()).await.map_err(|e| {
      warn!(receipt = %receipt, error = %e, "case request failed");
      LookupError::Transport(e.to_string())
    })?;

    debug!(receipt = %receipt, status, bytes = body.len(), "case response");
    classify_response(status, &body)
  }

  async fn probe_auth(&self) -> AuthStatus {
    match self.get(&self.probe_receipt).await {
      Ok((status, _)) => {
        info!(status, "auth probe");
        probe_status(status)
      }
      Err(e) => {
        warn!(error = %e, "auth probe failed");
        AuthStatus::NotAuthenticated
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  #[test]
  fn test_case_url_strips_trailing_slash() {
    let mut config = Config::default();
    config.api.base_url = "http://localhost:9000/cases/".to_string();
    let client = CaseClient::new(&config).unwrap();
    assert_eq!(client.base_url(), "http://localhost:9000/cases");
    assert_eq!(
      client.case_url("IOE0934989946"),
      "http://localhost:9000/cases/IOE0934989946"
    );
  }

  #[test]
  fn test_probe_status_mapping() {
    assert_eq!(probe_status(200), AuthStatus::Authenticated);
    assert_eq!(probe_status(404), AuthStatus::Authenticated);
    assert_eq!(probe_status(500), AuthStatus::Authenticated);
    assert_eq!(probe_status(401), AuthStatus::NotAuthenticated);
    assert_eq!(probe_status(403), AuthStatus::NotAuthenticated);
  }

  /// Answer every connection with a bodyless response of the given status
  async fn serve_status(status: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let response = format!(
          "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
          status
        );
        let _ = socket.write_all(response.as_bytes()).await;
      }
    });
    format!("http://{}/cases", addr)
  }

  async fn probe_against(status: &'static str) -> AuthStatus {
    let mut config = Config::default();
    config.api.base_url = serve_status(status).await;
    CaseClient::new(&config).unwrap().probe_auth().await
  }

  #[tokio::test]
  async fn test_probe_treats_not_found_as_logged_in() {
    assert_eq!(probe_against("404 Not Found").await, AuthStatus::Authenticated);
  }

  #[tokio::test]
  async fn test_probe_treats_forbidden_as_logged_out() {
    assert_eq!(probe_against("403 Forbidden").await, AuthStatus::NotAuthenticated);
  }

  #[tokio::test]
  async fn test_unreachable_api_is_transport_error() {
    let mut config = Config::default();
    // Port 9 (discard) on localhost is closed in test environments
    config.api.base_url = "http://127.0.0.1:9/cases".to_string();
    let client = CaseClient::new(&config).unwrap();
    let receipt = ReceiptNumber::parse("IOE0934989946").unwrap();

    assert!(matches!(
      client.fetch_case(&receipt).await,
      Err(LookupError::Transport(_))
    ));
    assert_eq!(client.probe_auth().await, AuthStatus::NotAuthenticated);
  }
}
