use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchError, OriginFetcher, RawItem};
use crate::config::settings::SpotifyConfig;
use crate::modules::podcast::model::ItemKind;

/// Tokens are refreshed this long before the origin says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Error)]
pub enum ClientSetupError {
    #[error("invalid Spotify endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Spotify Web API client. Owns its client-credentials token so every
/// caller shares one cached token instead of fetching a fresh one.
pub struct SpotifyClient {
    client: Client,
    api_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self, ClientSetupError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
            api_url: Url::parse(&config.api_url)?,
            token_url: Url::parse(&config.token_url)?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, FetchError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Spotify access token");
        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transient(format!("token request rejected: {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("token response unreadable: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!(expires_in = token.expires_in, "Spotify access token refreshed");

        let value = token.access_token;
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    fn item_url(&self, kind: ItemKind, origin_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            kind.origin_path(),
            origin_id
        )
    }
}

#[async_trait]
impl OriginFetcher for SpotifyClient {
    async fn fetch(
        &self,
        kind: ItemKind,
        origin_id: &str,
        market: &str,
    ) -> Result<RawItem, FetchError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(self.item_url(kind, origin_id))
            .bearer_auth(token)
            .query(&[("market", market)])
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            // Spotify answers 400 "invalid id" for ids that can never resolve.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                return Err(FetchError::NotFound {
                    kind,
                    origin_id: origin_id.to_string(),
                });
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Spotify rejected access token, dropping cached token");
                self.invalidate_token().await;
                return Err(FetchError::Transient("access token rejected".to_string()));
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Transient(format!("{status}: {body}")));
            }
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("response body unreadable: {e}")))?;

        Ok(RawItem {
            kind,
            origin_id: origin_id.to_string(),
            market: market.to_string(),
            payload,
        })
    }
}
