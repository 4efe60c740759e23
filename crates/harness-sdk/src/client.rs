use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::evaluation::evaluate_variable;
use crate::events::{batch_by_user, QueuedEvent};
use crate::{
    BucketedConfig, ClientOptions, Event, Feature, ReadOnlyVariable, SdkError, User, Variable,
};

const SERVER_KEY_PREFIXES: [&str; 2] = ["server", "dvc_server"];

/// Where variable bucketing happens for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketingMode {
    /// Evaluate against a config fetched once from the config CDN.
    Local,
    /// Ask the bucketing API on every call.
    Cloud,
}

/// Feature-flag client bound to one SDK key.
pub struct SdkClient {
    sdk_key: String,
    mode: BucketingMode,
    options: ClientOptions,
    http: reqwest::Client,
    config: RwLock<Option<BucketedConfig>>,
    custom_data: RwLock<Map<String, Value>>,
    queue: Mutex<Vec<(User, QueuedEvent)>>,
    closed: AtomicBool,
}

impl fmt::Debug for SdkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkClient")
            .field("mode", &self.mode)
            .field("options", &self.options)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SdkClient {
    pub fn new(
        sdk_key: &str,
        mode: BucketingMode,
        options: ClientOptions,
        request_timeout: Duration,
    ) -> Result<Self, SdkError> {
        let sdk_key = sdk_key.trim();
        if !SERVER_KEY_PREFIXES
            .iter()
            .any(|prefix| sdk_key.starts_with(prefix))
        {
            return Err(SdkError::InvalidSdkKey(sdk_key.to_string()));
        }

        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            sdk_key: sdk_key.to_string(),
            mode,
            options,
            http,
            config: RwLock::new(None),
            custom_data: RwLock::new(Map::new()),
            queue: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> BucketingMode {
        self.mode
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Loads the bucketed config from the config CDN. No-op in cloud mode.
    pub async fn initialize(&self) -> Result<(), SdkError> {
        if self.mode == BucketingMode::Cloud {
            return Ok(());
        }
        let url = format!(
            "{}/config/v1/server/{}.json",
            self.options.config_cdn_base(),
            self.sdk_key
        );
        let response = self.http.get(url.as_str()).send().await?;
        let response = ensure_success(response, &url).await?;
        let config = response.json::<BucketedConfig>().await?;
        tracing::debug!(
            variables = config.variables.len(),
            features = config.features.len(),
            "sdk config loaded"
        );
        *self.config.write().await = Some(config);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        match self.mode {
            BucketingMode::Cloud => true,
            BucketingMode::Local => self.config.read().await.is_some(),
        }
    }

    pub async fn variable(
        &self,
        user: User,
        key: &str,
        default_value: Value,
    ) -> Result<Variable, SdkError> {
        self.ensure_open()?;
        let user = self.prepare_user(user).await?;
        match self.mode {
            BucketingMode::Local => {
                let config = self.config.read().await;
                evaluate_variable(config.as_ref(), key, default_value)
            }
            BucketingMode::Cloud => {
                let mut config = BucketedConfig::default();
                if !key.trim().is_empty() && !default_value.is_null() {
                    if let Some(variable) = self.cloud_variable(key, &user).await {
                        config.variables.insert(key.to_string(), variable);
                    }
                }
                evaluate_variable(Some(&config), key, default_value)
            }
        }
    }

    pub async fn variable_value(
        &self,
        user: User,
        key: &str,
        default_value: Value,
    ) -> Result<Value, SdkError> {
        self.variable(user, key, default_value)
            .await
            .map(|variable| variable.value)
    }

    pub async fn all_variables(
        &self,
        user: User,
    ) -> Result<BTreeMap<String, ReadOnlyVariable>, SdkError> {
        self.ensure_open()?;
        let user = self.prepare_user(user).await?;
        match self.mode {
            BucketingMode::Local => Ok(self
                .config
                .read()
                .await
                .as_ref()
                .map(|config| config.variables.clone())
                .unwrap_or_default()),
            BucketingMode::Cloud => self.cloud_post("/v1/variables", &user).await,
        }
    }

    pub async fn all_features(&self, user: User) -> Result<BTreeMap<String, Feature>, SdkError> {
        self.ensure_open()?;
        let user = self.prepare_user(user).await?;
        match self.mode {
            BucketingMode::Local => Ok(self
                .config
                .read()
                .await
                .as_ref()
                .map(|config| config.features.clone())
                .unwrap_or_default()),
            BucketingMode::Cloud => self.cloud_post("/v1/features", &user).await,
        }
    }

    /// Records a custom event. Local clients queue it until the next flush.
    pub async fn track(&self, user: User, event: Event) -> Result<bool, SdkError> {
        self.ensure_open()?;
        let user = self.prepare_user(user).await?;
        if event.event_type.trim().is_empty() {
            return Err(SdkError::MissingEventType);
        }
        let queued = QueuedEvent::from_event(&user, event);
        match self.mode {
            BucketingMode::Local => {
                self.queue.lock().await.push((user, queued));
                Ok(true)
            }
            BucketingMode::Cloud => {
                let body = json!({ "user": user, "events": [queued] });
                self.cloud_post::<Value, _>("/v1/track", &body).await?;
                Ok(true)
            }
        }
    }

    pub async fn queued_event_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Sends every queued event to the events API as one batch.
    ///
    /// On failure the drained events are put back at the front of the queue.
    pub async fn flush_events(&self) -> Result<(), SdkError> {
        let drained = std::mem::take(&mut *self.queue.lock().await);
        if drained.is_empty() {
            return Ok(());
        }

        let url = format!("{}/v1/events/batch", self.options.events_api_base());
        let body = json!({ "batch": batch_by_user(drained.clone()) });
        let sent = match self
            .http
            .post(url.as_str())
            .header(AUTHORIZATION, self.sdk_key.as_str())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => ensure_success(response, &url).await.map(|_| ()),
            Err(error) => Err(SdkError::from(error)),
        };

        if let Err(error) = sent {
            tracing::warn!(events = drained.len(), %error, "event flush failed");
            let mut queue = self.queue.lock().await;
            let newer = std::mem::replace(&mut *queue, drained);
            queue.extend(newer);
            return Err(error);
        }
        Ok(())
    }

    /// Replaces client-wide custom data merged into every evaluated user.
    pub async fn set_client_custom_data(&self, data: Value) -> Result<(), SdkError> {
        self.ensure_open()?;
        let Value::Object(data) = data else {
            return Err(SdkError::InvalidCustomData);
        };
        *self.custom_data.write().await = data;
        Ok(())
    }

    /// Flushes pending events and rejects further calls. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), SdkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let flushed = self.flush_events().await;
        self.closed.store(true, Ordering::SeqCst);
        flushed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SdkError> {
        if self.is_closed() {
            return Err(SdkError::Closed);
        }
        Ok(())
    }

    async fn prepare_user(&self, mut user: User) -> Result<User, SdkError> {
        if user.user_id.trim().is_empty() {
            return Err(SdkError::MissingUserId);
        }
        for (key, value) in self.custom_data.read().await.iter() {
            user.private_custom_data
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(user)
    }

    /// Asks the bucketing API for one variable. Any failure or empty reply
    /// means the variable is unavailable and the caller falls back to its
    /// default.
    async fn cloud_variable(&self, key: &str, user: &User) -> Option<ReadOnlyVariable> {
        let url = format!("{}/v1/variables/{key}", self.options.bucketing_api_base());
        let response = match self.cloud_request(&url, user).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(key, %error, "cloud variable request failed");
                return None;
            }
        };
        let response = match ensure_success(response, &url).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(key, %error, "cloud variable request rejected");
                return None;
            }
        };
        let body = response.bytes().await.ok()?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice::<ReadOnlyVariable>(&body) {
            Ok(variable) => Some(variable),
            Err(error) => {
                tracing::warn!(key, %error, "cloud variable response is not a variable");
                None
            }
        }
    }

    async fn cloud_post<T, B>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.options.bucketing_api_base(), path);
        let request = self.cloud_request(&url, body);
        let response = ensure_success(request.send().await?, &url).await?;
        Ok(response.json::<T>().await?)
    }

    fn cloud_request<B>(&self, url: &str, body: &B) -> reqwest::RequestBuilder
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.sdk_key.as_str())
            .json(body);
        if self.options.enable_edge_db {
            request.query(&[("enableEdgeDB", "true")])
        } else {
            request
        }
    }
}

async fn ensure_success(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, SdkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SdkError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    const SDK_KEY: &str = "dvc_server_test_key";

    fn user(id: &str) -> User {
        User {
            user_id: id.to_string(),
            ..User::default()
        }
    }

    fn local_client(server: &MockServer) -> SdkClient {
        SdkClient::new(
            SDK_KEY,
            BucketingMode::Local,
            ClientOptions {
                config_cdn_uri: Some(server.base_url()),
                events_api_uri: Some(server.base_url()),
                ..ClientOptions::default()
            },
            Duration::from_secs(5),
        )
        .expect("client")
    }

    fn config_body() -> Value {
        json!({
            "features": {
                "test-harness": {
                    "_id": "638680d6fcb67b96878d90e6",
                    "key": "test-harness",
                    "type": "release",
                    "_variation": "638680d6fcb67b96878d90ec",
                    "variationName": "Variation On",
                    "variationKey": "variation-on"
                }
            },
            "variables": {
                "bool-var": {
                    "_id": "638681f059f1b81cc9e6c7fa",
                    "key": "bool-var",
                    "type": "Boolean",
                    "value": true
                }
            }
        })
    }

    #[test]
    fn regression_new_rejects_client_side_sdk_keys() {
        let error = SdkClient::new(
            "dvc_client_abc",
            BucketingMode::Local,
            ClientOptions::default(),
            Duration::from_secs(1),
        )
        .expect_err("client key must be rejected");
        assert!(matches!(error, SdkError::InvalidSdkKey(_)));

        let error = SdkClient::new(
            "",
            BucketingMode::Cloud,
            ClientOptions::default(),
            Duration::from_secs(1),
        )
        .expect_err("empty key must be rejected");
        assert!(matches!(error, SdkError::InvalidSdkKey(_)));
    }

    #[tokio::test]
    async fn integration_local_client_fetches_config_and_evaluates() {
        let server = MockServer::start_async().await;
        let cdn = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/config/v1/server/{SDK_KEY}.json"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(config_body());
        });

        let client = local_client(&server);
        assert!(!client.is_initialized().await);
        client.initialize().await.expect("initialize");
        cdn.assert();
        assert!(client.is_initialized().await);

        let variable = client
            .variable(user("u1"), "bool-var", json!(false))
            .await
            .expect("variable");
        assert_eq!(variable.value, json!(true));
        assert!(!variable.is_defaulted);

        let features = client.all_features(user("u1")).await.expect("features");
        assert_eq!(features["test-harness"].variation_name, "Variation On");
    }

    #[tokio::test]
    async fn regression_initialize_surfaces_cdn_failures() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET);
            then.status(403).body("forbidden");
        });

        let client = local_client(&server);
        let error = client.initialize().await.expect_err("cdn failure");
        assert!(matches!(error, SdkError::Status { status: 403, .. }));
        assert!(!client.is_initialized().await);
    }

    #[tokio::test]
    async fn integration_track_queues_and_flush_posts_batch() {
        let server = MockServer::start_async().await;
        let batch = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/events/batch")
                .header("authorization", SDK_KEY)
                .body_includes("\"customType\":\"purchase\"");
            then.status(201).json_body(json!({"message": "ok"}));
        });

        let client = local_client(&server);
        let event = Event {
            event_type: "purchase".to_string(),
            value: Some(2.0),
            ..Event::default()
        };
        assert!(client.track(user("u1"), event).await.expect("track"));
        assert_eq!(client.queued_event_count().await, 1);

        client.flush_events().await.expect("flush");
        batch.assert();
        assert_eq!(client.queued_event_count().await, 0);
    }

    #[tokio::test]
    async fn regression_failed_flush_requeues_events() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/events/batch");
            then.status(500).body("down");
        });

        let client = local_client(&server);
        let event = Event {
            event_type: "purchase".to_string(),
            ..Event::default()
        };
        client.track(user("u1"), event).await.expect("track");
        client.flush_events().await.expect_err("flush must fail");
        assert_eq!(client.queued_event_count().await, 1);
    }

    fn cloud_client(server: &MockServer, enable_edge_db: bool) -> SdkClient {
        SdkClient::new(
            SDK_KEY,
            BucketingMode::Cloud,
            ClientOptions {
                bucketing_api_uri: Some(server.base_url()),
                enable_edge_db,
                ..ClientOptions::default()
            },
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn integration_cloud_client_posts_user_to_bucketing_api() {
        let server = MockServer::start_async().await;
        let variable = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/variables/string-var")
                .query_param("enableEdgeDB", "true")
                .header("authorization", SDK_KEY)
                .header("content-type", "application/json")
                .body_includes("\"user_id\":\"u1\"")
                .body_includes("\"plan\":\"pro\"");
            then.status(200).json_body(json!({
                "key": "string-var",
                "type": "String",
                "value": "string",
                "defaultValue": "default",
                "isDefaulted": false
            }));
        });

        let client = cloud_client(&server, true);
        client
            .set_client_custom_data(json!({"plan": "pro"}))
            .await
            .expect("custom data");

        let value = client
            .variable_value(user("u1"), "string-var", json!("default"))
            .await
            .expect("variable value");
        variable.assert();
        assert_eq!(value, json!("string"));
    }

    #[tokio::test]
    async fn regression_cloud_variable_defaults_on_mismatch_empty_body_and_server_error() {
        let server = MockServer::start_async().await;
        let mismatched = server.mock(|when, then| {
            when.method(POST).path("/v1/variables/number-var");
            then.status(200).json_body(json!({
                "key": "number-var",
                "type": "Number",
                "value": 12
            }));
        });
        let empty = server.mock(|when, then| {
            when.method(POST).path("/v1/variables/missing-var");
            then.status(200).body("");
        });
        let failing = server.mock(|when, then| {
            when.method(POST).path("/v1/variables/broken-var");
            then.status(500).body("bucketing down");
        });
        let client = cloud_client(&server, false);

        let variable = client
            .variable(user("u1"), "number-var", json!("default"))
            .await
            .expect("mismatched variable");
        assert!(variable.is_defaulted);
        assert_eq!(variable.value, json!("default"));
        assert_eq!(variable.variable_type, VariableType::String);
        mismatched.assert();

        for key in ["missing-var", "broken-var"] {
            let variable = client
                .variable(user("u1"), key, json!(true))
                .await
                .expect("defaulted variable");
            assert!(variable.is_defaulted, "{key} should default");
            assert_eq!(variable.value, json!(true));
        }
        empty.assert();
        failing.assert();
    }

    #[tokio::test]
    async fn functional_user_validation_and_close_are_enforced() {
        let server = MockServer::start_async().await;
        let client = local_client(&server);

        let error = client
            .variable(user(""), "bool-var", json!(false))
            .await
            .expect_err("missing user id");
        assert!(matches!(error, SdkError::MissingUserId));

        let error = client
            .set_client_custom_data(json!([1, 2]))
            .await
            .expect_err("custom data must be an object");
        assert!(matches!(error, SdkError::InvalidCustomData));

        client.close().await.expect("close");
        client.close().await.expect("close is idempotent");
        let error = client
            .all_variables(user("u1"))
            .await
            .expect_err("closed client");
        assert!(matches!(error, SdkError::Closed));
    }
}
