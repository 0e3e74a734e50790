//! CommonSense HTTP client implementation

use std::borrow::Cow;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::{form_urlencoded, Url};

use crate::config::{ClientConfig, DatePrecision};
use crate::error::{Result, SenseClientError};
use crate::query::{DataQuery, SensorListQuery};
use crate::types::*;

/// Header carrying the session token in both directions
pub const SESSION_HEADER: &str = "X-SESSION_ID";

const LOGIN_PATH: &str = "/login.json";
const LOGOUT_PATH: &str = "/logout.json";

/// Target of the verbose request/response dumps
const WIRE_TARGET: &str = "commonsense_client::wire";

/// URL-encode a resource ID for use in path segments.
fn encode_path_segment(id: &str) -> String {
    // byte_serialize writes spaces as '+', which is literal in a path
    form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Headers and body of an accepted (200/201) response
struct ApiResponse {
    headers: HeaderMap,
    body: Bytes,
}

/// CommonSense REST API client
///
/// Holds the session token issued by [`login`](Self::login); every other
/// call sends it back in the `X-SESSION_ID` header. Calls run one at a time
/// and are never retried.
#[derive(Debug, Clone)]
pub struct SenseClient {
    client: Client,
    base_url: Url,
    config: ClientConfig,
    session: Option<SessionToken>,
}

impl SenseClient {
    /// Create a client for the production service with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client for another host with default settings
    ///
    /// # Arguments
    /// * `base_url` - Scheme and host of the service (e.g., "http://localhost:3000")
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig::builder(base_url).build())
    }

    /// Create a client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()?;

        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            base_url,
            config,
            session: None,
        })
    }

    /// Resume a session obtained earlier
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(SessionToken::new(token));
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current session token, if logged in
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(SessionToken::as_str)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Log in and keep the issued session token
    ///
    /// A failed login leaves any previously stored token in place.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let body = serde_json::to_vec(&Credentials { username, password })?;
        let response = self.api_call(Method::POST, LOGIN_PATH, Some(body)).await?;

        let token = response
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SenseClientError::MissingSessionHeader(SESSION_HEADER))?;

        self.session = Some(SessionToken::new(token));
        info!("Logged in as {}", username);
        Ok(())
    }

    /// End the session
    ///
    /// The token is only dropped once the server accepted the logout, so a
    /// failed logout can be retried.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        self.api_call(Method::POST, LOGOUT_PATH, None).await?;
        self.session = None;
        info!("Logged out");
        Ok(())
    }

    // =========================================================================
    // Sensor Operations
    // =========================================================================

    /// List owned physical sensors (first 1000 only)
    #[instrument(skip(self))]
    pub async fn get_sensors(&self) -> Result<Vec<Sensor>> {
        self.list_sensors(&SensorListQuery::owned_physical()).await
    }

    /// List every owned sensor, 100 per request
    ///
    /// Best effort: if a page fails, the sensors gathered so far are returned
    /// and the failure is only logged. Use
    /// [`try_get_all_sensors`](Self::try_get_all_sensors) to see the error.
    /// A client without a session still fails with `NotAuthenticated`.
    #[instrument(skip(self))]
    pub async fn get_all_sensors(&self) -> Result<Vec<Sensor>> {
        let mut sensors = Vec::new();
        match self.walk_sensor_pages(&mut sensors).await {
            Ok(()) => {}
            Err(SenseClientError::NotAuthenticated) => {
                return Err(SenseClientError::NotAuthenticated)
            }
            Err(e) => {
                warn!(
                    gathered = sensors.len(),
                    "Sensor listing stopped early: {}", e
                );
            }
        }
        Ok(sensors)
    }

    /// List every owned sensor, failing on the first page that fails
    #[instrument(skip(self))]
    pub async fn try_get_all_sensors(&self) -> Result<Vec<Sensor>> {
        let mut sensors = Vec::new();
        self.walk_sensor_pages(&mut sensors).await?;
        Ok(sensors)
    }

    /// Fetch pages until one comes back short
    async fn walk_sensor_pages(&self, sensors: &mut Vec<Sensor>) -> Result<()> {
        let mut page = 0;
        loop {
            let batch = self.list_sensors(&SensorListQuery::owned_page(page)).await?;
            let count = batch.len();
            sensors.extend(batch);

            if count < SensorListQuery::WALK_PAGE_SIZE as usize {
                return Ok(());
            }
            page += 1;
        }
    }

    /// Run a sensor listing query
    #[instrument(skip(self))]
    pub async fn list_sensors(&self, query: &SensorListQuery) -> Result<Vec<Sensor>> {
        let path = format!("/sensors.json?{}", query.encode());
        let response = self.api_call(Method::GET, &path, None).await?;
        decode::<SensorListResponse>(&response.body).map(|r| r.sensors)
    }

    /// List sensors with their metatags in `namespace`
    #[instrument(skip(self))]
    pub async fn get_sensors_metatags(&self, namespace: &str) -> Result<Vec<SensorMetatags>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("namespace", namespace)
            .append_pair("details", "full")
            .finish();
        let path = format!("/sensors/metatags.json?{}", query);

        let response = self.api_call(Method::GET, &path, None).await?;
        decode::<MetatagsListResponse>(&response.body).map(|r| r.sensors)
    }

    /// Create a sensor and return the id assigned by the server
    #[instrument(skip(self, sensor), fields(name = %sensor.name))]
    pub async fn post_sensor(&self, sensor: &Sensor) -> Result<String> {
        let body = serde_json::to_vec(&SensorEnvelope { sensor })?;
        let response = self.api_call(Method::POST, "/sensors.json", Some(body)).await?;

        let location = response
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok());
        let id = parse_sensor_location(location, &self.config.location_prefix())?;

        debug!("Created sensor {}", id);
        Ok(id)
    }

    /// Replace a sensor definition
    #[instrument(skip(self, sensor))]
    pub async fn put_sensor(&self, sensor_id: &str, sensor: &Sensor) -> Result<()> {
        let body = serde_json::to_vec(&SensorEnvelope { sensor })?;
        let path = format!("/sensors/{}.json", encode_path_segment(sensor_id));

        self.api_call(Method::PUT, &path, Some(body)).await?;
        Ok(())
    }

    /// Delete a sensor
    #[instrument(skip(self))]
    pub async fn delete_sensor(&self, sensor_id: &str) -> Result<()> {
        let path = format!("/sensors/{}.json", encode_path_segment(sensor_id));

        self.api_call(Method::DELETE, &path, None).await?;
        Ok(())
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Upload data for several sensors in one request
    #[instrument(skip(self, batches), fields(sensors = batches.len()))]
    pub async fn post_sensors_data(&self, batches: &[SensorData]) -> Result<()> {
        let sensors = self.apply_precision(batches);
        let body = serde_json::to_vec(&SensorsDataUpload { sensors: &sensors })?;

        self.api_call(Method::POST, "/sensors/data.json", Some(body)).await?;
        Ok(())
    }

    /// Upload data for one sensor through its own data resource
    #[instrument(skip(self, batch), fields(points = batch.data.len()))]
    pub async fn post_sensor_data(&self, sensor_id: &str, batch: &SensorData) -> Result<()> {
        let normalized = self.apply_precision(std::slice::from_ref(batch));
        let body = serde_json::to_vec(&normalized[0])?;
        let path = format!("/sensors/{}/data", encode_path_segment(sensor_id));

        self.api_call(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// Read data points of one sensor
    #[instrument(skip(self))]
    pub async fn get_sensor_data(
        &self,
        sensor_id: &str,
        query: &DataQuery,
    ) -> Result<Vec<DataPoint>> {
        let path = with_query(
            format!("/sensors/{}/data.json", encode_path_segment(sensor_id)),
            query.encode(),
        );

        let response = self.api_call(Method::GET, &path, None).await?;
        decode::<DataListResponse>(&response.body).map(|r| r.data)
    }

    /// Read data points of several sensors in one request
    #[instrument(skip(self))]
    pub async fn get_sensors_data(
        &self,
        sensor_ids: &[&str],
        query: &DataQuery,
    ) -> Result<Vec<DataPoint>> {
        let path = with_query(
            "/sensors/data.json".to_string(),
            query.encode_with_sensors(sensor_ids),
        );

        let response = self.api_call(Method::GET, &path, None).await?;
        decode::<DataListResponse>(&response.body).map(|r| r.data)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Truncate upload dates when the service only takes whole seconds
    fn apply_precision<'a>(&self, batches: &'a [SensorData]) -> Cow<'a, [SensorData]> {
        match self.config.profile.date_precision {
            DatePrecision::Fractional => Cow::Borrowed(batches),
            DatePrecision::Integer => {
                let mut owned = batches.to_vec();
                owned
                    .iter_mut()
                    .flat_map(|b| b.data.iter_mut())
                    .for_each(DataPoint::truncate_date);
                Cow::Owned(owned)
            }
        }
    }

    /// Full URL for a path (and query) on the configured host
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    fn request_headers(&self, path: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if !path.eq_ignore_ascii_case(LOGIN_PATH) {
            let token = self
                .session
                .as_ref()
                .ok_or(SenseClientError::NotAuthenticated)?;
            let value = HeaderValue::from_str(token.as_str())
                .map_err(|e| SenseClientError::InvalidHeader(e.to_string()))?;
            headers.insert(HeaderName::from_static("x-session_id"), value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Perform one request; only 200 and 201 count as success
    async fn api_call(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(path)?;
        let headers = self.request_headers(path)?;
        let body = body.unwrap_or_default();

        debug!("{} {}", method, url);
        if self.config.verbose {
            info!(
                target: WIRE_TARGET,
                method = %method,
                url = %url,
                headers = %describe_headers(&headers),
                body = %String::from_utf8_lossy(&body),
                "request"
            );
        }

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if self.config.verbose {
            info!(
                target: WIRE_TARGET,
                status = %status,
                headers = %describe_headers(&headers),
                body = %String::from_utf8_lossy(&body),
                "response"
            );
        }

        if status != StatusCode::OK && status != StatusCode::CREATED {
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                self.write_diagnostics(&body).await;
            }
            return Err(SenseClientError::status_error(
                status,
                String::from_utf8_lossy(&body),
            ));
        }

        Ok(ApiResponse { headers, body })
    }

    /// Dump a 500 body for later inspection, overwriting the previous dump
    async fn write_diagnostics(&self, body: &[u8]) {
        let Some(path) = &self.config.diagnostics_file else {
            return;
        };

        match tokio::fs::write(path, body).await {
            Ok(()) => debug!("Wrote server error body to {}", path.display()),
            Err(e) => warn!("Cannot write diagnostics file {}: {}", path.display(), e),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

fn with_query(path: String, query: String) -> String {
    if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    }
}

/// Render headers for logging with the session value masked
fn describe_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if name.as_str().eq_ignore_ascii_case(SESSION_HEADER) {
                "***"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{}: {}", name, shown)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extract the sensor id from a `Location` header
///
/// The header must start with `prefix`; the id is the run of
/// non-whitespace characters that follows it.
pub(crate) fn parse_sensor_location(location: Option<&str>, prefix: &str) -> Result<String> {
    let location = location
        .ok_or_else(|| SenseClientError::InvalidLocation("missing Location header".into()))?;

    let rest = location.strip_prefix(prefix).ok_or_else(|| {
        SenseClientError::InvalidLocation(format!("{} does not start with {}", location, prefix))
    })?;

    rest.split_whitespace()
        .next()
        .map(String::from)
        .ok_or_else(|| SenseClientError::InvalidLocation(format!("no sensor id in {}", location)))
}
