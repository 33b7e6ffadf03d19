// src/key_manager.rs

use crate::{
    clock::Clock,
    config::{preview_key, AppConfig, ExhaustedPolicy},
    error::{AppError, Result, UpstreamFailure},
    key_state::{CooldownPolicy, KeyHealth, LastError},
    metrics,
    upstream::{append_api_key, UpstreamClient, UpstreamRequest, UpstreamResponse},
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Knobs of the rotation state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSettings {
    pub cooldowns: CooldownPolicy,
    pub exhausted_policy: ExhaustedPolicy,
    pub api_key_param: String,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            cooldowns: CooldownPolicy::default(),
            exhausted_policy: ExhaustedPolicy::default(),
            api_key_param: "apiKey".to_string(),
        }
    }
}

impl RotationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cooldowns: config.rotation.cooldown_policy(),
            exhausted_policy: config.rotation.exhausted_policy,
            api_key_param: config.upstream.api_key_param.clone(),
        }
    }
}

/// Result of moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The cursor now points at an available key.
    Advanced(usize),
    /// Nothing was available, the cursor was forced to index 0.
    FellBack,
    /// Another request had already moved the cursor off the failed key.
    AlreadyMoved(usize),
}

impl Rotation {
    pub fn index(self) -> usize {
        match self {
            Self::Advanced(index) | Self::AlreadyMoved(index) => index,
            Self::FellBack => 0,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub index: usize,
    pub is_active: bool,
    pub error_count: u32,
    pub last_error: Option<LastError>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub is_available: bool,
}

/// Health report of the whole pool. Never contains key material.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub total_keys: usize,
    pub current_key_index: usize,
    pub key_statuses: Vec<KeyStatus>,
}

/// The pool, its cursor and one health record per key.
///
/// Purely synchronous: time is passed in, and callers are expected to hold
/// whatever lock guards the pool.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<Secret<String>>,
    health: Vec<KeyHealth>,
    current: usize,
}

impl KeyPool {
    pub fn new(keys: Vec<Secret<String>>) -> Result<Self> {
        if keys.is_empty() {
            return Err(AppError::Config("No API keys configured".to_string()));
        }
        let health = vec![KeyHealth::new(); keys.len()];
        Ok(Self {
            keys,
            health,
            current: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_key(&self) -> Result<(usize, &Secret<String>)> {
        self.keys
            .get(self.current)
            .map(|key| (self.current, key))
            .ok_or(AppError::NoAvailableKeys)
    }

    pub fn health(&self, index: usize) -> Option<&KeyHealth> {
        self.health.get(index)
    }

    /// Applies the lazy cooldown reset. Out-of-range indices are unavailable.
    pub fn is_available(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        self.health
            .get_mut(index)
            .is_some_and(|health| health.is_available(now))
    }

    pub fn available_count(&mut self, now: DateTime<Utc>) -> usize {
        self.health
            .iter_mut()
            .map(|health| health.is_available(now))
            .filter(|available| *available)
            .count()
    }

    /// Moves the cursor forward to the next available key, looking at most
    /// `len()` positions ahead (the current key is checked last).
    pub fn rotate(&mut self, now: DateTime<Utc>, policy: ExhaustedPolicy) -> Result<Rotation> {
        let len = self.keys.len();
        if len == 0 {
            return Err(AppError::NoAvailableKeys);
        }
        for _ in 0..len {
            self.current = (self.current + 1) % len;
            if self.health[self.current].is_available(now) {
                return Ok(Rotation::Advanced(self.current));
            }
        }
        // A full cycle leaves the cursor where it started.
        match policy {
            ExhaustedPolicy::FallbackToFirst => {
                self.current = 0;
                Ok(Rotation::FellBack)
            }
            ExhaustedPolicy::Fail => Err(AppError::NoAvailableKeys),
        }
    }

    /// Rotates only if the cursor still points at `failed`.
    pub fn rotate_from(
        &mut self,
        failed: usize,
        now: DateTime<Utc>,
        policy: ExhaustedPolicy,
    ) -> Result<Rotation> {
        if self.current != failed {
            return Ok(Rotation::AlreadyMoved(self.current));
        }
        self.rotate(now, policy)
    }

    pub fn record_failure(
        &mut self,
        index: usize,
        failure: &UpstreamFailure,
        now: DateTime<Utc>,
        cooldowns: &CooldownPolicy,
    ) -> Option<chrono::Duration> {
        self.health
            .get_mut(index)
            .and_then(|health| health.record_failure(failure, now, cooldowns))
    }

    pub fn record_success(&mut self, index: usize) {
        if let Some(health) = self.health.get_mut(index) {
            health.record_success();
        }
    }

    pub fn status(&mut self, now: DateTime<Utc>) -> PoolStatus {
        let key_statuses = self
            .health
            .iter_mut()
            .enumerate()
            .map(|(index, health)| {
                let is_available = health.is_available(now);
                KeyStatus {
                    index,
                    is_active: health.is_active,
                    error_count: health.error_count,
                    last_error: health.last_error.clone(),
                    cooldown_until: health.cooldown_until,
                    is_available,
                }
            })
            .collect();

        PoolStatus {
            total_keys: self.keys.len(),
            current_key_index: self.current,
            key_statuses,
        }
    }
}

/// Sends requests to the recipe API, attaching a key from the pool and
/// moving on to another key when an attempt fails.
///
/// One instance is built at startup and shared by every handler. The pool
/// lock is never held while a request is in flight.
pub struct KeyManager {
    pool: Mutex<KeyPool>,
    total_keys: usize,
    settings: RotationSettings,
    upstream: Arc<dyn UpstreamClient>,
    clock: Arc<dyn Clock>,
}

impl KeyManager {
    #[instrument(skip_all, name = "key_manager_init", fields(total_keys = credentials.len()))]
    pub fn new(
        credentials: Vec<Secret<String>>,
        settings: RotationSettings,
        upstream: Arc<dyn UpstreamClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let pool = KeyPool::new(credentials).map_err(|e| {
            error!("Cannot start without API keys");
            e
        })?;
        let total_keys = pool.len();
        info!(
            total_keys,
            exhausted_policy = ?settings.exhausted_policy,
            "Key manager initialized"
        );
        metrics::set_keys_available(total_keys);

        Ok(Self {
            pool: Mutex::new(pool),
            total_keys,
            settings,
            upstream,
            clock,
        })
    }

    pub fn from_config(
        config: &AppConfig,
        upstream: Arc<dyn UpstreamClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let credentials = config
            .api_keys
            .iter()
            .map(|key| Secret::new(key.clone()))
            .collect();
        Self::new(
            credentials,
            RotationSettings::from_config(config),
            upstream,
            clock,
        )
    }

    pub fn total_keys(&self) -> usize {
        self.total_keys
    }

    /// The key under the cursor, for callers that build their own URLs.
    pub async fn current_key(&self) -> Result<(usize, Secret<String>)> {
        let pool = self.pool.lock().await;
        let (index, key) = pool.current_key()?;
        Ok((index, Secret::new(key.expose_secret().clone())))
    }

    /// Moves the cursor to the next available key and returns its index.
    pub async fn rotate(&self) -> Result<usize> {
        let mut pool = self.pool.lock().await;
        let now = self.clock.now();
        let result = pool.rotate(now, self.settings.exhausted_policy);
        Self::log_rotation(&mut pool, None, &result, now);
        result.map(Rotation::index)
    }

    pub async fn record_failure(&self, index: usize, failure: &UpstreamFailure) {
        let mut pool = self.pool.lock().await;
        let now = self.clock.now();
        self.note_failure(&mut pool, index, failure, now);
    }

    pub async fn record_success(&self, index: usize) {
        self.pool.lock().await.record_success(index);
    }

    pub async fn is_available(&self, index: usize) -> bool {
        let now = self.clock.now();
        self.pool.lock().await.is_available(index, now)
    }

    /// Snapshot of every key's health. Elapsed cooldowns are cleared as a side effect.
    pub async fn status(&self) -> PoolStatus {
        let now = self.clock.now();
        let mut pool = self.pool.lock().await;
        let status = pool.status(now);
        metrics::set_keys_available(pool.available_count(now));
        status
    }

    /// GET `url` (which must not carry a key yet).
    pub async fn execute(&self, url: &str) -> Result<UpstreamResponse> {
        self.send(UpstreamRequest::get(url)).await
    }

    /// POST `body` as JSON to `url`, with the same rotation as [`execute`](Self::execute).
    pub async fn execute_post(&self, url: &str, body: Value) -> Result<UpstreamResponse> {
        self.send(UpstreamRequest::post_json(url, body)).await
    }

    /// Tries the request with up to one attempt per key.
    ///
    /// 402 and 429 always rotate. Any other failure rotates too, except on the
    /// final attempt, so a request may touch every key before giving up.
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let attempts = self.total_keys;
        let mut attempts_made = 0;
        let mut last_failure: Option<UpstreamFailure> = None;

        for attempt in 0..attempts {
            let (index, keyed_request) = {
                let pool = self.pool.lock().await;
                let (index, key) = pool.current_key()?;
                debug!(
                    attempt,
                    key.index = index,
                    key.preview = %preview_key(key.expose_secret()),
                    "Attempting upstream request"
                );
                let url = append_api_key(
                    &request.url,
                    key.expose_secret(),
                    &self.settings.api_key_param,
                );
                (index, request.with_url(url))
            };
            attempts_made = attempt + 1;

            let failure = match self.upstream.send(keyed_request).await {
                Ok(response) => {
                    self.pool.lock().await.record_success(index);
                    metrics::record_upstream_attempt("success");
                    debug!(attempt, key.index = index, http.status_code = %response.status, "Upstream request succeeded");
                    return Ok(response);
                }
                Err(failure) => failure,
            };
            metrics::record_upstream_attempt("failure");

            let is_last_attempt = attempt + 1 == attempts;
            let should_rotate = failure.class().is_rate_limit() || !is_last_attempt;

            let mut pool = self.pool.lock().await;
            let now = self.clock.now();
            self.note_failure(&mut pool, index, &failure, now);
            last_failure = Some(failure);

            if should_rotate {
                let result = pool.rotate_from(index, now, self.settings.exhausted_policy);
                Self::log_rotation(&mut pool, Some(index), &result, now);
                if result.is_err() {
                    break;
                }
            }
        }

        let Some(last) = last_failure else {
            return Err(AppError::NoAvailableKeys);
        };
        error!(
            attempts = attempts_made,
            http.status_code = ?last.status.map(|s| s.as_u16()),
            "All API keys failed: {}",
            last
        );
        metrics::record_credentials_exhausted();
        Err(AppError::CredentialsExhausted {
            attempts: attempts_made,
            last,
        })
    }

    fn note_failure(
        &self,
        pool: &mut KeyPool,
        index: usize,
        failure: &UpstreamFailure,
        now: DateTime<Utc>,
    ) {
        let status_code = failure.status.map(|s| s.as_u16());
        metrics::record_key_failure(status_code);

        match pool.record_failure(index, failure, now, &self.settings.cooldowns) {
            Some(cooldown) => warn!(
                key.index = index,
                http.status_code = ?status_code,
                cooldown_minutes = cooldown.num_minutes(),
                "API key deactivated: {}",
                failure
            ),
            None => info!(
                key.index = index,
                http.status_code = ?status_code,
                "API key request failed: {}",
                failure
            ),
        }
        metrics::set_keys_available(pool.available_count(now));
    }

    fn log_rotation(
        pool: &mut KeyPool,
        from: Option<usize>,
        result: &Result<Rotation>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(Rotation::Advanced(to)) => {
                info!(from = ?from, to, "Rotated to next API key");
                metrics::record_rotation("rotated");
            }
            Ok(Rotation::AlreadyMoved(to)) => {
                debug!(from = ?from, to, "Cursor already moved by a concurrent request");
            }
            Ok(Rotation::FellBack) => {
                warn!("All API keys unavailable, falling back to the first key");
                metrics::record_rotation("fallback");
            }
            Err(_) => {
                warn!("All API keys unavailable, refusing to rotate");
                metrics::record_rotation("exhausted");
            }
        }
        metrics::set_keys_available(pool.available_count(now));
    }
}
