//! Request governor: origin validation and per-client rate limiting.
//!
//! Sits in front of every route. Window state is an in-process map, which
//! is the single-instance deployment policy; multi-instance deployments
//! must externalize it to a shared TTL-capable store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::GovernorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    #[error("origin not allowed")]
    ForbiddenOrigin,

    #[error("rate limit exceeded")]
    RateLimited,
}

struct Window {
    count: u32,
    reset_at: Instant,
}

pub struct RequestGovernor {
    config: GovernorConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RequestGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny one request.
    pub fn admit(&self, client_key: &str, origin: Option<&str>) -> Result<(), AdmitError> {
        self.admit_at(client_key, origin, Instant::now())
    }

    /// Clock-injected variant for tests.
    pub fn admit_at(
        &self,
        client_key: &str,
        origin: Option<&str>,
        now: Instant,
    ) -> Result<(), AdmitError> {
        self.check_origin(origin)?;

        let window = Duration::from_secs(self.config.window_secs);
        let mut windows = self.windows.lock().expect("governor lock");

        match windows.get_mut(client_key) {
            Some(entry) if now <= entry.reset_at => {
                if entry.count >= self.config.max_requests {
                    debug!("Rate limit hit for {client_key}");
                    return Err(AdmitError::RateLimited);
                }
                entry.count += 1;
                Ok(())
            }
            _ => {
                // New-window creation doubles as the sweep point, so keys
                // that never return do not accumulate forever.
                windows.retain(|_, w| now <= w.reset_at);
                windows.insert(
                    client_key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                Ok(())
            }
        }
    }

    fn check_origin(&self, origin: Option<&str>) -> Result<(), AdmitError> {
        let Some(origin) = origin else {
            return if self.config.allow_missing_origin {
                Ok(())
            } else {
                Err(AdmitError::ForbiddenOrigin)
            };
        };

        let origin = origin.trim_end_matches('/');
        let exact = self
            .config
            .allowed_origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin);
        if exact {
            return Ok(());
        }

        let wildcard = self
            .config
            .origin_patterns
            .iter()
            .any(|pattern| wildcard_matches(pattern, origin));
        if wildcard {
            return Ok(());
        }

        Err(AdmitError::ForbiddenOrigin)
    }
}

/// Single-`*` glob used for preview-deployment origins.
fn wildcard_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
        None => pattern == origin,
    }
}
