//! HTTP client for the AgriSight backend.
//!
//! # Design
//! - Every request goes through [`ApiClient::call`] or [`ApiClient::upload`] so cookies,
//!   request ids and error normalization are applied uniformly.
//! - Failure bodies are `{message}` or `{detail}` (string or validation list); callers only see
//!   [`ApiError`].
//! - A 401 resets the session and drops credentials before the error is returned.

use std::sync::{Arc, Mutex, PoisonError};

use agrisight_core::ApiError;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::credentials::CookieJar;
use crate::session::SessionHandle;
use crate::storage::SharedStore;

/// Header carrying the per-request correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Which backend a request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    /// Application backend (auth, profile, predictions).
    App,
    /// Model service (model listing).
    Model,
}

/// Optional request extras.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Additional headers.
    pub headers: Vec<(String, String)>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Target backend.
    pub service: Option<Service>,
}

impl RequestOptions {
    /// Options with query parameters.
    #[must_use]
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            query: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Route the request to `service`.
    #[must_use]
    pub fn on(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }
}

/// File sent as a multipart `file` field.
#[derive(Clone, Debug)]
pub struct Upload {
    /// File name reported to the backend.
    pub file_name: String,
    /// MIME type, when known.
    pub mime: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Cookie-authenticated client shared by every service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    api_base: Url,
    model_base: Url,
    cookies: Arc<Mutex<CookieJar>>,
    session: SessionHandle,
    store: SharedStore,
}

impl ApiClient {
    /// Build a client for `config`, restoring persisted cookies from `store`.
    ///
    /// # Errors
    /// Returns a network-kind [`ApiError`] when the transport cannot be built.
    pub fn new(
        config: &ClientConfig,
        session: SessionHandle,
        store: SharedStore,
    ) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ApiError::network(format!("failed to build HTTP client: {err}")))?;
        let jar = store.with(|store| CookieJar::load(store));
        Ok(Self {
            http,
            api_base: config.api_url.clone(),
            model_base: config.model_base().clone(),
            cookies: Arc::new(Mutex::new(jar)),
            session,
            store,
        })
    }

    /// Session this client resets on 401.
    #[must_use]
    pub const fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Durable store shared with this client.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Whether credentials are currently held.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.jar().is_empty()
    }

    /// Issue a JSON request and return the decoded body.
    ///
    /// An empty body decodes as `null`; a non-JSON body is returned as a string.
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for transport failures and non-2xx responses.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let mut request = self.request(method.clone(), path, &options)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(&method, path, request).await
    }

    /// Issue a JSON request and decode the body as `T`.
    ///
    /// An empty body decodes as an empty object.
    ///
    /// # Errors
    /// Returns [`ApiError`] on failure or when the body does not match `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = match self.call(method, path, body, options).await? {
            Value::Null => Value::Object(serde_json::Map::new()),
            value => value,
        };
        serde_json::from_value(value)
            .map_err(|err| ApiError::decode(format!("unexpected response from {path}: {err}")))
    }

    /// Send `upload` as multipart field `file`.
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for transport failures and non-2xx responses.
    pub async fn upload(
        &self,
        method: Method,
        path: &str,
        upload: Upload,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let mut part = Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(mime) = upload.mime.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|err| ApiError::network(format!("invalid MIME type '{mime}': {err}")))?;
        }
        let request = self
            .request(method.clone(), path, &options)?
            .multipart(Form::new().part("file", part));
        self.send(&method, path, request).await
    }

    /// Drop every credential, in memory and on disk.
    pub fn clear_credentials(&self) {
        let mut jar = self.jar();
        jar.clear();
        self.persist(&jar);
    }

    fn jar(&self) -> std::sync::MutexGuard<'_, CookieJar> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, jar: &CookieJar) {
        if let Err(err) = self.store.with(|store| jar.save(store)) {
            tracing::warn!(error = %err, "failed to persist session cookies");
        }
    }

    fn url(&self, service: Service, path: &str) -> Result<Url, ApiError> {
        let base = match service {
            Service::App => &self.api_base,
            Service::Model => &self.model_base,
        };
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|err| ApiError::network(format!("invalid URL '{joined}': {err}")))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.url(options.service.unwrap_or(Service::App), path)?;
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(HEADER_REQUEST_ID, value);
        }
        if let Some(cookie) = self.jar().header_value() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|_| ApiError::network("stored cookie contains invalid characters"))?;
            headers.insert(COOKIE, value);
        }
        let mut request = self.http.request(method, url).headers(headers);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        Ok(request)
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(|err| {
            tracing::warn!(%method, path, error = %err, "request failed before a response");
            ApiError::network(format!("request to {path} failed: {err}"))
        })?;
        let status = response.status();
        {
            let mut jar = self.jar();
            if jar.capture(response.headers()) {
                self.persist(&jar);
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| {
                ApiError::network(format!("failed to read response from {path}: {err}"))
            })?;
        tracing::debug!(%method, path, status = status.as_u16(), "response received");

        if status.is_success() {
            return Ok(decode_body(&bytes));
        }
        let error = normalize_error(status, &bytes);
        if status == StatusCode::UNAUTHORIZED {
            self.session.force_logout();
            self.clear_credentials();
        }
        Err(error)
    }
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).trim().to_string()))
}

/// Convert a failed response into an [`ApiError`].
#[must_use]
pub fn normalize_error(status: StatusCode, bytes: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|body| extract_message(&body))
        .or_else(|| {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            (!text.is_empty() && !text.starts_with('{')).then_some(text)
        })
        .unwrap_or_else(|| format!("request failed with status {status}"));
    ApiError::from_response(status.as_u16(), message)
}

fn extract_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    match body.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg").and_then(Value::as_str)?;
                    let field = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str);
                    Some(field.map_or_else(|| msg.to_string(), |field| format!("{field}: {msg}")))
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
