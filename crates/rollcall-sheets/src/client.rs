// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the spreadsheet values API.
//!
//! Provides [`SheetsClient`] which builds authenticated append requests and
//! classifies failures for the delivery pipeline.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use rollcall_config::model::SheetsConfig;
use rollcall_core::{RollcallError, StoreError};

use crate::types::{ApiErrorResponse, AppendResponse, ValueRange};

/// HTTP client for one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    timeout: Duration,
}

impl SheetsClient {
    /// Build a client from configuration.
    ///
    /// Fails when the spreadsheet id or access token is missing.
    pub fn new(config: &SheetsConfig) -> Result<Self, RollcallError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RollcallError::Config("sheets.spreadsheet_id is not set".into()))?;
        let token = config.access_token.as_deref().ok_or_else(|| {
            RollcallError::Config(
                "sheets.access_token is not set (use ROLLCALL_SHEETS_ACCESS_TOKEN)".into(),
            )
        })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| RollcallError::Config(format!("invalid access token header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RollcallError::Store {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            range: config.range.clone(),
            timeout,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.base_url,
            self.spreadsheet_id,
            self.range.replace(' ', "%20")
        )
    }

    /// Append rows below the last row of the configured range.
    ///
    /// Values are interpreted as if typed by a user (`USER_ENTERED`).
    pub async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<AppendResponse, StoreError> {
        let body = ValueRange::rows(self.range.clone(), rows);
        let response = self
            .client
            .post(self.append_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    StoreError::Transient {
                        message: format!("HTTP request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        debug!(status = %status, "append response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| StoreError::Transient {
                message: format!("failed to read response body: {e}"),
            })?;
            // An unparseable success body still means the row was written.
            return Ok(serde_json::from_str(&body).unwrap_or_default());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!(
                "spreadsheet API error {} ({}): {}",
                status,
                api_err.error.status.unwrap_or_default(),
                api_err.error.message
            ),
            Err(_) => format!("spreadsheet API returned {status}: {body}"),
        };
        warn!(status = %status, "append failed");
        Err(classify_status(status, message))
    }
}

/// Map an HTTP failure status onto the retry classification.
pub fn classify_status(status: StatusCode, message: String) -> StoreError {
    match status.as_u16() {
        408 | 429 | 500 | 502 | 503 | 504 => StoreError::Transient { message },
        404 => StoreError::Schema { message },
        400 if message.contains("Unable to parse range") => StoreError::Schema { message },
        _ => StoreError::Rejected { message },
    }
}
