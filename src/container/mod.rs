//! Transport client for the Strand action protocol.
//!
//! Every remote operation is a named action (`record:fetch`, `schema:create`,
//! ...) posted as a single JSON object to `<endpoint>/<action>` with `:`
//! replaced by `/`. The request body merges the caller payload with the
//! `action` name and, when signed in, the `access_token`. The response is one
//! JSON object; it is an error iff it carries a top-level `error` key.
//!
//! Assets bypass the action envelope: they are PUT to
//! `<endpoint>/files/<name>` and fetched with a plain authenticated GET.

mod database;

pub use database::{Database, RecordStore};

use crate::{Error, Result, UNKNOWN_ERROR_MESSAGE};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Header carrying the application API key.
pub const API_KEY_HEADER: &str = "X-Strand-Api-Key";

/// Header carrying the user access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Strand-Access-Token";

/// How long a self-issued asset URL stays valid.
const ASSET_URL_TTL: Duration = Duration::from_secs(60);

/// Client-side view of a remote Strand deployment.
pub struct Container {
    endpoint: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::blocking::Client,
}

impl Container {
    /// Creates a container pointing at the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            access_token: None,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Sets the API key sent with every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the access token sent with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// ID of the public database.
    #[must_use]
    pub fn public_database_id(&self) -> &'static str {
        "_public"
    }

    /// ID of the current user's private database.
    #[must_use]
    pub fn private_database_id(&self) -> &'static str {
        "_private"
    }

    /// Builds the URL an action is posted to.
    fn action_url(&self, action: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            action.replace(':', "/")
        )
    }

    /// Builds a time-limited asset URL for the given filename.
    fn asset_url(&self, filename: &str) -> String {
        let expired_at = SystemTime::now()
            .checked_add(ASSET_URL_TTL)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
        format!(
            "{}/files/{filename}?expiredAt={expired_at}",
            self.endpoint.trim_end_matches('/')
        )
    }

    /// Attaches the authentication headers carried by every request.
    fn authenticated(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }
        request
    }

    /// Sends an action request and unpacks the response envelope.
    ///
    /// The payload is augmented with the `action` name and the access token
    /// before posting. Transport failures and non-JSON responses map to
    /// [`Error::Transport`]; server-reported errors are left in the returned
    /// [`ActionResponse`] for the caller to inspect.
    pub fn make_request(&self, action: &str, payload: Map<String, Value>) -> Result<ActionResponse> {
        let mut payload = payload;
        if let Some(token) = &self.access_token {
            payload.insert("access_token".to_string(), Value::String(token.clone()));
        }
        payload.insert("action".to_string(), Value::String(action.to_string()));

        let url = self.action_url(action);
        tracing::debug!(action, %url, "posting action request");

        let response = self
            .authenticated(self.client.post(url))
            .json(&payload)
            .send()
            .map_err(|e| Error::Transport {
                action: action.to_string(),
                cause: e.to_string(),
            })?;

        let payload: Map<String, Value> = response.json().map_err(|e| Error::Transport {
            action: action.to_string(),
            cause: format!("response is not a JSON object: {e}"),
        })?;

        Ok(ActionResponse { payload })
    }

    /// Uploads raw asset bytes with a PUT to the files endpoint.
    pub fn put_asset(
        &self,
        filename: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<ActionResponse> {
        let url = self.asset_url(filename);
        tracing::debug!(filename, content_type, bytes = body.len(), "uploading asset");

        let response = self
            .authenticated(self.client.put(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| Error::Transport {
                action: "asset:put".to_string(),
                cause: e.to_string(),
            })?;

        let payload: Map<String, Value> = response.json().map_err(|e| Error::Transport {
            action: "asset:put".to_string(),
            cause: format!("response is not a JSON object: {e}"),
        })?;

        Ok(ActionResponse { payload })
    }

    /// Fetches asset bytes from a time-limited asset URL.
    ///
    /// Any status other than 200 is an error; there is no retry.
    pub fn get_asset(&self, asset_url: &str) -> Result<Vec<u8>> {
        tracing::debug!(%asset_url, "downloading asset");

        let response = self
            .authenticated(self.client.get(asset_url))
            .send()
            .map_err(|e| Error::Transport {
                action: "asset:get".to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Transport {
                action: "asset:get".to_string(),
                cause: format!("unexpected status code {status}"),
            });
        }

        let bytes = response.bytes().map_err(|e| Error::Transport {
            action: "asset:get".to_string(),
            cause: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Builds the download URL for an asset ID.
    #[must_use]
    pub fn asset_download_url(&self, asset_id: &str) -> String {
        self.asset_url(asset_id)
    }
}

/// A decoded action response.
pub struct ActionResponse {
    /// The raw response object.
    pub payload: Map<String, Value>,
}

impl ActionResponse {
    /// Whether the response is an error envelope.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.payload.contains_key("error")
    }

    /// Unpacks the error envelope, if present.
    #[must_use]
    pub fn error(&self) -> Option<ServerError> {
        let data = self.payload.get("error")?.as_object()?;
        Some(ServerError::from_map(data))
    }

    /// Converts an error response into an [`Error::Server`].
    ///
    /// Falls back to the unknown-error message when the envelope is present
    /// but malformed.
    #[must_use]
    pub fn to_error(&self) -> Error {
        self.error().map_or_else(
            || Error::Server(UNKNOWN_ERROR_MESSAGE.to_string()),
            ServerError::into_error,
        )
    }

    /// The top-level `result` value, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.payload.get("result")
    }
}

/// Returns whether a result item is a per-record error object.
#[must_use]
pub fn is_error_value(data: &Map<String, Value>) -> bool {
    data.get("_type").and_then(Value::as_str) == Some("error")
}

/// Error data unpacked from an action response.
#[derive(Debug, Clone)]
pub struct ServerError {
    /// Record ID the error applies to, when reported per record.
    pub id: Option<String>,
    /// Human-readable message; defaults to [`UNKNOWN_ERROR_MESSAGE`].
    pub message: String,
    /// Numeric error code.
    pub code: i64,
    /// Server-side error type name.
    pub kind: String,
}

impl ServerError {
    /// Unpacks an error object, tolerating missing fields.
    #[must_use]
    pub fn from_map(data: &Map<String, Value>) -> Self {
        let id = data
            .get("_id")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
            .to_string();
        let code = data.get("code").and_then(Value::as_i64).unwrap_or_default();
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            id,
            message,
            code,
            kind,
        }
    }

    /// Converts into a crate error, attaching record context when known.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self.id {
            Some(id) => Error::ServerRecord {
                id,
                message: self.message,
            },
            None => Error::Server(self.message),
        }
    }
}
