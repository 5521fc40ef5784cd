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

//! The `{success, data?, error_code?, message?, user_message?, details?}` envelope every
//! endpoint returns (spec.md §6 "HTTP control plane").

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grid_core::GridError;
use serde::Serialize;

use crate::error::HttpError;

/// The uniform response envelope wrapping every successful or failed handler outcome.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T: Serialize> Envelope<T> {
    /// Wraps a successful payload.
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error_code: None, message: None, user_message: None, details: None }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: Envelope<()> = Envelope {
            success: false,
            data: None,
            error_code: Some(self.error_code()),
            message: Some(self.to_string()),
            user_message: Some(self.user_message()),
            details: None,
        };
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_no_error_fields() {
        let envelope = Envelope::ok(serde_json::json!({"k": "v"}));
        assert!(envelope.success);
        assert!(envelope.error_code.is_none());
    }
}
