// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Grid Engine Contributors.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Error classification for outbound exchange connectivity (C2/C5), surfaced to the grid
//! engine and the recovery supervisor as one of `{rate_limited, connection, timeout, other}`.

use std::time::Duration;

use grid_core::{ErrorCategory, GridError};
use thiserror::Error;

/// Errors raised by the rate-limit guard, REST client, and WebSocket client.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (DNS, connect refused, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Upstream rejected the request with a rate-limit signal.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The rate-limit guard refused to admit the request locally (still in a backoff window).
    #[error("rate-limit guard is in backoff, retry after {retry_after:?}")]
    LocallyThrottled { retry_after: Duration },

    /// Non-2xx HTTP response not otherwise classified.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body failed to decode into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Exchange rejected the request for auth reasons (expired/invalid credentials).
    #[error("auth error: {0}")]
    Auth(String),

    /// The WebSocket manager is at its global connection cap.
    #[error("websocket connection cap reached ({cap})")]
    ConnectionCapReached { cap: usize },

    /// Reconnect attempts exhausted; the connection is in the Failed state.
    #[error("websocket reconnect attempts exhausted ({attempts})")]
    ReconnectExhausted { attempts: u32 },
}

impl NetworkError {
    /// Classifies a reqwest error the way the exchange REST client surfaces failures.
    #[must_use]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = error.status() {
            if status.as_u16() == 429 {
                return Self::RateLimited { retry_after: None };
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Self::Auth(format!("HTTP {status}"));
            }
            return Self::Http {
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        Self::Transport(error.to_string())
    }

    /// Whether the message text looks like an upstream rate-limit rejection, per spec.md
    /// §4.1's string-match rule ("rate limit", "429", or equivalent).
    #[must_use]
    pub fn text_looks_rate_limited(text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests")
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout | Self::RateLimited { .. } | Self::LocallyThrottled { .. }
        ) || matches!(self, Self::Http { status, .. } if *status >= 500)
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::LocallyThrottled { .. })
    }

    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// The C2 classification tag consumed by C7/C11: `{rate_limited, connection, timeout, other}`.
    #[must_use]
    pub fn classification_tag(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } | Self::LocallyThrottled { .. } => "rate_limited",
            Self::Transport(_) | Self::ConnectionCapReached { .. } => "connection",
            Self::Timeout => "timeout",
            Self::Http { .. } | Self::Decode(_) | Self::Auth(_) | Self::ReconnectExhausted { .. } => {
                "other"
            }
        }
    }
}

impl GridError for NetworkError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "NETWORK_TRANSPORT",
            Self::Timeout => "NETWORK_TIMEOUT",
            Self::RateLimited { .. } => "NETWORK_RATE_LIMITED",
            Self::LocallyThrottled { .. } => "NETWORK_THROTTLED",
            Self::Http { .. } => "NETWORK_HTTP_ERROR",
            Self::Decode(_) => "NETWORK_DECODE_ERROR",
            Self::Auth(_) => "NETWORK_AUTH_ERROR",
            Self::ConnectionCapReached { .. } => "WEBSOCKET_CAP_REACHED",
            Self::ReconnectExhausted { .. } => "WEBSOCKET_RECONNECT_EXHAUSTED",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } | Self::LocallyThrottled { .. } => ErrorCategory::Upstream,
            Self::Transport(_)
            | Self::Timeout
            | Self::Http { .. }
            | Self::ConnectionCapReached { .. }
            | Self::ReconnectExhausted { .. } => ErrorCategory::Upstream,
            Self::Decode(_) => ErrorCategory::Internal,
            Self::Auth(_) => ErrorCategory::Auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Rate limit exceeded", true)]
    #[case("HTTP 429 Too Many Requests", true)]
    #[case("too many requests, slow down", true)]
    #[case("internal server error", false)]
    fn rate_limit_text_matching(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(NetworkError::text_looks_rate_limited(text), expected);
    }

    #[rstest]
    fn retryable_classification() {
        assert!(NetworkError::Transport("x".into()).is_retryable());
        assert!(NetworkError::Timeout.is_retryable());
        assert!(NetworkError::RateLimited { retry_after: None }.is_retryable());
        assert!(NetworkError::Http { status: 503, message: "x".into() }.is_retryable());
        assert!(!NetworkError::Http { status: 400, message: "x".into() }.is_retryable());
        assert!(!NetworkError::Auth("bad key".into()).is_retryable());
    }

    #[rstest]
    fn classification_tags_match_spec_vocabulary() {
        assert_eq!(
            NetworkError::RateLimited { retry_after: None }.classification_tag(),
            "rate_limited"
        );
        assert_eq!(NetworkError::Transport("x".into()).classification_tag(), "connection");
        assert_eq!(NetworkError::Timeout.classification_tag(), "timeout");
        assert_eq!(NetworkError::Auth("x".into()).classification_tag(), "other");
    }
}
