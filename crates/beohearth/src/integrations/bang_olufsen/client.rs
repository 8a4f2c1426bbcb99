use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::dto::Bass;
use super::dto::Treble;
use super::error::Error;
use super::error::Result;

/// Trait for Mozart API operations
///
/// This trait allows for mocking the device API for testing purposes
#[async_trait]
pub trait MozartClient: Send + Sync {
    async fn set_sound_settings_adjustments_bass(&self, bass: Bass) -> Result<()>;

    async fn set_sound_settings_adjustments_treble(&self, treble: Treble) -> Result<()>;
}

/// Mozart API client over HTTP using reqwest
pub struct HttpMozartClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMozartClient {
    /// Create a client for the speaker at `host`
    pub fn new(host: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(format!("http://{}", host), timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl MozartClient for HttpMozartClient {
    async fn set_sound_settings_adjustments_bass(&self, bass: Bass) -> Result<()> {
        self.post("/api/v1/settings/sound/adjustments/bass", &bass)
            .await
    }

    async fn set_sound_settings_adjustments_treble(&self, treble: Treble) -> Result<()> {
        self.post("/api/v1/settings/sound/adjustments/treble", &treble)
            .await
    }
}

/// Mock Mozart client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockMozartClient {
    calls: std::sync::Mutex<Vec<super::number::AdjustmentRequest>>,
    /// When set, every call fails with this status after being recorded
    pub fail_with: Option<reqwest::StatusCode>,
}

#[cfg(test)]
impl MockMozartClient {
    /// Create a new mock client that accepts every call
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: reqwest::StatusCode) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> Vec<super::number::AdjustmentRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, request: super::number::AdjustmentRequest) -> Result<()> {
        self.calls.lock().unwrap().push(request);
        match self.fail_with {
            Some(status) => Err(Error::Api {
                status,
                body: "mock failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl MozartClient for MockMozartClient {
    async fn set_sound_settings_adjustments_bass(&self, bass: Bass) -> Result<()> {
        self.record(super::number::AdjustmentRequest::Bass(bass))
    }

    async fn set_sound_settings_adjustments_treble(&self, treble: Treble) -> Result<()> {
        self.record(super::number::AdjustmentRequest::Treble(treble))
    }
}
