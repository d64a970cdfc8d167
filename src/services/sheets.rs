// SPDX-License-Identifier: MIT

//! Google Sheets API pass-through.
//!
//! Argument-shaping wrappers over the Sheets REST API. Every call obtains
//! its access token through `CredentialService::with_credentials`; nothing
//! in this module touches stored tokens directly.

use crate::error::AppError;
use crate::services::credentials::CredentialService;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Low-level Sheets REST client. Methods take the bearer token explicitly.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
}

impl SheetsClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_base_url(SHEETS_BASE_URL, timeout_secs)
    }

    /// Create a client against an explicit base URL (used by tests).
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Self {
        // A default client would silently drop the timeout; fail at startup
        // instead.
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed building Sheets HTTP client");

        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Create a new spreadsheet with the given title.
    pub async fn create_spreadsheet(
        &self,
        access_token: &str,
        title: &str,
    ) -> Result<CreatedSpreadsheet, AppError> {
        let body = json!({ "properties": { "title": title } });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Get spreadsheet metadata (properties and sheet list).
    pub async fn get_spreadsheet(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/{}", self.base_url, spreadsheet_id);
        self.get_json(&url, access_token).await
    }

    /// Read a value range.
    pub async fn get_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueRange, AppError> {
        let url = format!(
            "{}/{}/values/{}",
            self.base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        self.get_json(&url, access_token).await
    }

    /// Overwrite a value range.
    pub async fn update_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        let body = json!({ "range": range, "values": values });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Append rows after the last row of a range.
    pub async fn append_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        let body = json!({ "range": range, "values": values });

        self.post_json(&url, access_token, &body).await
    }

    /// Clear a value range (values only, formatting stays).
    pub async fn clear_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}/{}/values/{}:clear",
            self.base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );

        self.post_json(&url, access_token, &json!({})).await
    }

    /// Add a sheet (tab) to an existing spreadsheet.
    pub async fn add_sheet(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        title: &str,
    ) -> Result<serde_json::Value, AppError> {
        let request = json!({ "addSheet": { "properties": { "title": title } } });
        self.batch_update(access_token, spreadsheet_id, vec![request])
            .await
    }

    /// Delete a sheet (tab) by its numeric id.
    pub async fn delete_sheet(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet_id: i64,
    ) -> Result<serde_json::Value, AppError> {
        let request = json!({ "deleteSheet": { "sheetId": sheet_id } });
        self.batch_update(access_token, spreadsheet_id, vec![request])
            .await
    }

    /// Sort a grid range on one column.
    pub async fn sort_range(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sort: &SortSpec,
    ) -> Result<serde_json::Value, AppError> {
        let request = json!({
            "sortRange": {
                "range": {
                    "sheetId": sort.sheet_id,
                    "startRowIndex": sort.start_row_index,
                    "endRowIndex": sort.end_row_index,
                    "startColumnIndex": sort.start_column_index,
                    "endColumnIndex": sort.end_column_index,
                },
                "sortSpecs": [{
                    "dimensionIndex": sort.sort_column_index,
                    "sortOrder": if sort.ascending { "ASCENDING" } else { "DESCENDING" },
                }],
            }
        });

        self.batch_update(access_token, spreadsheet_id, vec![request])
            .await
    }

    /// POST a `batchUpdate` with the given structural requests.
    async fn batch_update(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        requests: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/{}:batchUpdate", self.base_url, spreadsheet_id);
        let body = json!({ "requests": requests });
        self.post_json(&url, access_token, &body).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Generic POST request with JSON body and response.
    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body, passing the provider's
    /// status and message through on failure.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("JSON parse error: {}", e)))
    }
}

/// Response to spreadsheet creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub spreadsheet_url: Option<String>,
}

/// A rectangular block of cell values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Sort parameters for a grid range.
#[derive(Debug, Clone, Deserialize)]
pub struct SortSpec {
    pub sheet_id: i64,
    pub start_row_index: i64,
    pub end_row_index: i64,
    pub start_column_index: i64,
    pub end_column_index: i64,
    /// Column to sort on, relative to the grid (dimension index)
    pub sort_column_index: i64,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

/// Per-user Sheets operations, routed through the credential choke point.
#[derive(Clone)]
pub struct SheetsService {
    client: SheetsClient,
    credentials: CredentialService,
}

impl SheetsService {
    pub fn new(client: SheetsClient, credentials: CredentialService) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub async fn create_spreadsheet(
        &self,
        internal_id: &str,
        title: &str,
    ) -> Result<CreatedSpreadsheet, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .create_spreadsheet(&creds.access_token, title)
                    .await
            })
            .await
    }

    pub async fn get_spreadsheet(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .get_spreadsheet(&creds.access_token, spreadsheet_id)
                    .await
            })
            .await
    }

    pub async fn get_values(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueRange, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .get_values(&creds.access_token, spreadsheet_id, range)
                    .await
            })
            .await
    }

    pub async fn update_values(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .update_values(&creds.access_token, spreadsheet_id, range, values)
                    .await
            })
            .await
    }

    pub async fn append_values(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .append_values(&creds.access_token, spreadsheet_id, range, values)
                    .await
            })
            .await
    }

    pub async fn clear_values(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .clear_values(&creds.access_token, spreadsheet_id, range)
                    .await
            })
            .await
    }

    pub async fn add_sheet(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        title: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .add_sheet(&creds.access_token, spreadsheet_id, title)
                    .await
            })
            .await
    }

    pub async fn delete_sheet(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        sheet_id: i64,
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .delete_sheet(&creds.access_token, spreadsheet_id, sheet_id)
                    .await
            })
            .await
    }

    pub async fn sort_range(
        &self,
        internal_id: &str,
        spreadsheet_id: &str,
        sort: &SortSpec,
    ) -> Result<serde_json::Value, AppError> {
        self.credentials
            .with_credentials(internal_id, |creds| async move {
                self.client
                    .sort_range(&creds.access_token, spreadsheet_id, sort)
                    .await
            })
            .await
    }
}
