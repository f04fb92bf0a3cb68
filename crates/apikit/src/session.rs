//! Authenticated blocking session against a Foreman/Katello server.
//!
//! One [`Session`] lives for one invocation: a single `ureq` agent with a
//! precomputed basic-auth header, a global timeout and (optionally)
//! disabled TLS verification. It implements [`Client`] with the wire rules
//! the server expects: versioned JSON accept header, everything-at-once
//! page size on lists, payloads wrapped under the singular resource key,
//! and server error messages extracted from the error body.

use crate::client::{Client, Method, Scope};
use crate::error::{Error, Result};
use crate::{inflect, routes};
use base64::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use ureq::Agent;
use ureq::tls::TlsConfig;

/// Default global per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const ACCEPT: &str = "application/json;version=2";
const USER_AGENT: &str = concat!("apikit/", env!("CARGO_PKG_VERSION"));

/// Page size sent on every list call, large enough to fetch everything at
/// once. Matches the server's maximum accepted value.
const PER_PAGE: u64 = 2 << 31;

/// Response bodies larger than this are refused.
const BODY_LIMIT: u64 = 64 * 1024 * 1024;

/// Connection parameters for a [`Session`].
#[derive(Clone)]
pub struct SessionConfig {
    /// Base URL of the server, e.g. `https://foreman.example.com`.
    pub base_url: String,
    /// User to authenticate as.
    pub username: String,
    /// Password for basic auth.
    pub password: String,
    /// Verify the server's TLS certificate.
    pub verify_ssl: bool,
    /// Global per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Server identification returned by `/api/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    /// Foreman version string, e.g. `3.11.2`.
    pub version: String,
    /// API version; 2 on every supported server.
    #[serde(default)]
    pub api_version: u64,
}

/// One authenticated HTTP session.
#[derive(Debug)]
pub struct Session {
    agent: Agent,
    base_url: String,
    auth: String,
}

impl Session {
    /// Open a session. No request is made yet; use [`Session::status`] to
    /// verify connectivity.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(Error::connection(
                &base_url,
                "server URL must start with http:// or https://",
            ));
        }

        let mut agent_config = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .user_agent(USER_AGENT);
        if !config.verify_ssl {
            agent_config =
                agent_config.tls_config(TlsConfig::builder().disable_verification(true).build());
        }

        let credentials = format!("{}:{}", config.username, config.password);
        Ok(Self {
            agent: Agent::new_with_config(agent_config.build()),
            base_url,
            auth: format!("Basic {}", BASE64_STANDARD.encode(credentials)),
        })
    }

    /// The normalized base URL this session talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `/api/status` to verify connectivity and authentication.
    pub fn status(&self) -> Result<ServerStatus> {
        let body = self.get_json("/api/status", &[])?;
        serde_json::from_value(body).map_err(Into::into)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(path);
        log::debug!("GET {url}");
        let mut request = self
            .agent
            .get(&url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| Error::transport(&url, &e))?;
        let (status, body) = read_body(&url, response)?;
        expect_success(status, body)
    }

    fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        let request = match method {
            Method::Get => {
                return self.get_json(path, &[]);
            }
            Method::Post => {
                log::debug!("POST {url}");
                self.agent.post(&url)
            }
            Method::Put => {
                log::debug!("PUT {url}");
                self.agent.put(&url)
            }
        };
        let response = request
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT)
            .send_json(body)
            .map_err(|e| Error::transport(&url, &e))?;
        let (status, body) = read_body(&url, response)?;
        expect_success(status, body)
    }

    fn delete_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(path);
        log::debug!("DELETE {url}");
        let mut request = self
            .agent
            .delete(&url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| Error::transport(&url, &e))?;
        let (status, body) = read_body(&url, response)?;
        // Some resources answer a delete with 200 and an error object when
        // the record cannot be removed.
        if let Some(message) = body["error"]["message"].as_str() {
            return Err(Error::api(status, message.to_string()));
        }
        expect_success(status, body)
    }
}

impl Client for Session {
    fn list(&self, resource: &str, search: Option<&str>, scope: &Scope) -> Result<Vec<Value>> {
        let path = routes::collection_path(resource, scope);
        let mut query = vec![("per_page".to_string(), PER_PAGE.to_string())];
        if let Some(search) = search {
            if !search.is_empty() {
                query.push(("search".to_string(), search.to_string()));
            }
        }
        query.extend(scope_query(scope));
        let body = self.get_json(&path, &query)?;
        match body.get("results").and_then(Value::as_array) {
            Some(results) => Ok(results.clone()),
            None => Err(Error::InvalidResponse(format!(
                "list of {resource} did not return a results array"
            ))),
        }
    }

    fn show(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value> {
        let path = routes::member_path(resource, id, scope);
        self.get_json(&path, &scope_query(scope))
    }

    fn create(&self, resource: &str, payload: Map<String, Value>, scope: &Scope) -> Result<Value> {
        let path = routes::collection_path(resource, scope);
        self.send_json(Method::Post, &path, &wrap_payload(resource, payload, scope))
    }

    fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Map<String, Value>,
        scope: &Scope,
    ) -> Result<Value> {
        let path = routes::member_path(resource, id, scope);
        self.send_json(Method::Put, &path, &wrap_payload(resource, payload, scope))
    }

    fn delete(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value> {
        let path = routes::member_path(resource, id, scope);
        self.delete_json(&path, &scope_query(scope))
    }

    fn action(
        &self,
        resource: &str,
        id: &str,
        name: &str,
        method: Method,
        payload: Map<String, Value>,
    ) -> Result<Value> {
        let path = routes::action_path(resource, id, name);
        self.send_json(method, &path, &Value::Object(payload))
    }
}

// ============================================================================
// Wire helpers
// ============================================================================

fn scope_query(scope: &Scope) -> Vec<(String, String)> {
    scope
        .params()
        .map(|(key, value)| (key.clone(), query_value(value)))
        .collect()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Create/update bodies carry scope ids at the top level and the entity
/// attributes under the singular resource key.
fn wrap_payload(resource: &str, payload: Map<String, Value>, scope: &Scope) -> Value {
    let key = inflect::singularize(routes::route_for(resource).segment);
    let mut body = Map::new();
    for (scope_key, value) in scope.params() {
        body.insert(scope_key.clone(), value.clone());
    }
    body.insert(key, Value::Object(payload));
    Value::Object(body)
}

fn read_body(url: &str, mut response: ureq::http::Response<ureq::Body>) -> Result<(u16, Value)> {
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .with_config()
        .limit(BODY_LIMIT)
        .read_to_string()
        .map_err(|e| Error::transport(url, &e))?;
    if text.trim().is_empty() {
        return Ok((status, Value::Null));
    }
    match serde_json::from_str(&text) {
        Ok(body) => Ok((status, body)),
        // A non-JSON error page (proxy, crashed server) still carries the
        // real status; keep a snippet of the body as the message.
        Err(_) if !(200..300).contains(&status) => Ok((status, Value::String(snippet(&text)))),
        Err(err) => Err(Error::InvalidResponse(err.to_string())),
    }
}

fn expect_success(status: u16, body: Value) -> Result<Value> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(Error::api(status, error_message(&body)))
    }
}

/// Pull a human-readable message out of the server's error body. The shape
/// varies: `error.message`, `error.full_messages`, `error.errors` keyed by
/// field, a bare `error` string, or `displayMessage` on some endpoints.
fn error_message(body: &Value) -> String {
    let error = &body["error"];
    if let Some(message) = error["message"].as_str() {
        return message.to_string();
    }
    if let Some(messages) = error["full_messages"].as_array() {
        let joined = messages
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if !joined.is_empty() {
            return joined;
        }
    }
    if let Some(errors) = error["errors"].as_object() {
        let joined = errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", join_messages(messages)))
            .collect::<Vec<_>>()
            .join("; ");
        if !joined.is_empty() {
            return joined;
        }
    }
    if let Some(message) = error.as_str() {
        return message.to_string();
    }
    if let Some(message) = body["displayMessage"].as_str() {
        return message.to_string();
    }
    if let Some(message) = body.as_str() {
        return message.to_string();
    }
    if body.is_null() {
        "empty response body".to_string()
    } else {
        snippet(&body.to_string())
    }
}

fn join_messages(messages: &Value) -> String {
    match messages {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 200 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(200).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(base_url: &str) -> SessionConfig {
        SessionConfig {
            base_url: base_url.to_string(),
            username: "admin".to_string(),
            password: "changeme".to_string(),
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let session = Session::new(&config("https://foreman.example.com/")).unwrap();
        assert_eq!(session.base_url(), "https://foreman.example.com");
    }

    #[test]
    fn test_new_rejects_bad_scheme() {
        let err = Session::new(&config("foreman.example.com")).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_auth_header_is_basic() {
        let session = Session::new(&config("https://foreman.example.com")).unwrap();
        // "admin:changeme" base64-encoded
        assert_eq!(session.auth, "Basic YWRtaW46Y2hhbmdlbWU=");
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let debug = format!("{:?}", config("https://foreman.example.com"));
        assert!(!debug.contains("changeme"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_wrap_payload_uses_singular_key() {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("example.com"));
        let body = wrap_payload("domains", payload, &Scope::new());
        assert_eq!(body, json!({"domain": {"name": "example.com"}}));
    }

    #[test]
    fn test_wrap_payload_keeps_scope_at_top_level() {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("Dev"));
        let scope = Scope::new().param("organization_id", 3);
        let body = wrap_payload("lifecycle_environments", payload, &scope);
        assert_eq!(
            body,
            json!({"organization_id": 3, "environment": {"name": "Dev"}})
        );
    }

    #[test]
    fn test_query_value_formats() {
        assert_eq!(query_value(&json!("x")), "x");
        assert_eq!(query_value(&json!(3)), "3");
        assert_eq!(query_value(&json!(true)), "true");
    }

    #[test]
    fn test_error_message_from_message() {
        let body = json!({"error": {"message": "Resource domain not found by id '9'"}});
        assert_eq!(error_message(&body), "Resource domain not found by id '9'");
    }

    #[test]
    fn test_error_message_from_full_messages() {
        let body = json!({"error": {"full_messages": ["Name can't be blank", "Name is invalid"]}});
        assert_eq!(error_message(&body), "Name can't be blank, Name is invalid");
    }

    #[test]
    fn test_error_message_from_field_errors() {
        let body = json!({"error": {"errors": {"name": ["has already been taken"]}}});
        assert_eq!(error_message(&body), "name: has already been taken");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(&json!({"displayMessage": "boom"})), "boom");
        assert_eq!(error_message(&Value::Null), "empty response body");
        assert_eq!(error_message(&json!("plain text")), "plain text");
    }

    #[test]
    fn test_expect_success_maps_status() {
        assert!(expect_success(200, Value::Null).is_ok());
        let err = expect_success(422, json!({"error": {"message": "nope"}})).unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert!(format!("{err}").contains("nope"));
    }

    #[test]
    fn test_snippet_truncates_long_text() {
        let long = "x".repeat(500);
        let cut = snippet(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
