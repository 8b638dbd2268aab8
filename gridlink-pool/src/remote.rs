//! Live handle over the service's JSON RPC endpoint.
//!
//! Every call is a `POST {endpoint}/api3/json` carrying
//! `{"method_name": .., "params": [auth, params]}`. Successful responses wrap
//! the payload in `results`; failures come back as
//! `{"exception": true, "message": .., "error_code": ..}`.

use crate::config::{Credentials, PoolConfig, ReliabilityConfig};
use crate::error::{PoolError, PoolResult};
use crate::pool::{Connector, SessionHandle};
use gridlink_model::{
    BatchOutcome, BatchRequest, BatchRequestType, Entity, EntityHandle, Filter, FindQuery,
    GridError, GridResult, LogicalOperator, SortKey, check_reserved,
};
use serde_json::{Map, Value, json};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const API_PATH: &str = "/api3/json";

/// Largest page the service hands out per `read`.
pub const ENTITIES_PER_PAGE: usize = 500;

/// `error_code` the service uses for bad credentials or expired sessions.
const ERR_AUTH: i64 = 102;

/// An authenticated connection to the remote service.
pub struct RemoteClient {
    http: reqwest::blocking::Client,
    base_url: String,
    rpc_url: String,
    credentials: Credentials,
    session_token: Mutex<Option<String>>,
    reliability: ReliabilityConfig,
    connection_id: Uuid,
}

impl RemoteClient {
    /// Logs in with the script credentials and caches the session token.
    pub fn connect(config: &PoolConfig) -> PoolResult<Self> {
        let client = Self::unauthenticated(config)?;
        let token = client.request_session_token()?;
        *client.session_token.lock().unwrap() = Some(token);
        info!(endpoint = %client.base_url, connection = %client.connection_id, "connected");
        Ok(client)
    }

    /// A client on an existing session. Performs no network I/O.
    pub fn with_session(config: &PoolConfig, session_token: impl Into<String>) -> PoolResult<Self> {
        let client = Self::unauthenticated(config)?;
        *client.session_token.lock().unwrap() = Some(session_token.into());
        debug!(connection = %client.connection_id, "resumed session");
        Ok(client)
    }

    fn unauthenticated(config: &PoolConfig) -> PoolResult<Self> {
        let base_url = config.endpoint.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PoolError::Config("endpoint is empty".into()));
        }
        Ok(Self {
            http: build_http_client(config)?,
            rpc_url: format!("{base_url}{API_PATH}"),
            base_url,
            credentials: config.credentials.clone(),
            session_token: Mutex::new(None),
            reliability: config.reliability.clone(),
            connection_id: Uuid::now_v7(),
        })
    }

    /// Time-ordered id for log correlation.
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn reliability(&self) -> &ReliabilityConfig {
        &self.reliability
    }

    fn auth_params(&self) -> Value {
        match self.session_token.lock().unwrap().as_deref() {
            Some(token) => json!({ "session_token": token }),
            None => script_auth(&self.credentials),
        }
    }

    fn request_session_token(&self) -> PoolResult<String> {
        let body = rpc_body("get_session_token", Some(script_auth(&self.credentials)), None);
        let results = self.call_with_retry(&body).map_err(|e| match e {
            PoolError::Remote(message) => PoolError::Authentication(message),
            other => other,
        })?;
        results
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PoolError::Authentication("response carried no session_id".into()))
    }

    /// Calls `method` on the current session and returns its `results`.
    pub fn call(&self, method: &str, params: Value) -> PoolResult<Value> {
        debug!(method, connection = %self.connection_id, "rpc");
        let body = rpc_body(method, Some(self.auth_params()), Some(params));
        self.call_with_retry(&body)
    }

    // Only transport failures are retried; service exceptions return at once.
    fn call_with_retry(&self, body: &Value) -> PoolResult<Value> {
        let attempts = self.reliability.max_rpc_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.send(body) {
                Ok(response) => return decode_response(response),
                Err(e) if attempt < attempts && is_transient(&e) => {
                    warn!(attempt, attempts, error = %e, "remote call failed, retrying");
                    std::thread::sleep(self.reliability.rpc_attempt_interval);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&self, body: &Value) -> Result<Value, reqwest::Error> {
        self.http
            .post(&self.rpc_url)
            .timeout(self.reliability.timeout)
            .json(body)
            .send()?
            .error_for_status()?
            .json()
    }

    fn fetch_field(&self, entity_type: &str, id: i64, field: &str) -> GridResult<Value> {
        let query = FindQuery::new(vec![Filter::is("id", id)]).fields([field]);
        let entity = self
            .find_one(entity_type, &query)?
            .ok_or_else(|| GridError::not_found(entity_type, id))?;
        Ok(entity.get(field).into_owned())
    }
}

impl EntityHandle for RemoteClient {
    fn find(&self, entity_type: &str, query: &FindQuery) -> GridResult<Vec<Entity>> {
        let limit = query.effective_limit();
        let per_page = limit.map_or(ENTITIES_PER_PAGE, |l| l.min(ENTITIES_PER_PAGE));

        let mut found = Vec::new();
        let mut page = 1;
        loop {
            let results = self.call("read", read_params(entity_type, query, page, per_page))?;
            let entities: Vec<Entity> = match results.get("entities") {
                Some(entities) => serde_json::from_value(entities.clone())?,
                None => Vec::new(),
            };
            let fetched = entities.len();
            found.extend(entities);

            if let Some(limit) = limit.filter(|l| found.len() >= *l) {
                found.truncate(limit);
                break;
            }
            if fetched < per_page {
                break;
            }
            page += 1;
        }
        Ok(found)
    }

    fn create(&self, entity_type: &str, data: &Map<String, Value>) -> GridResult<Entity> {
        check_reserved(data)?;
        let params = json!({
            "type": entity_type,
            "fields": encode_fields(data),
            "return_fields": data.keys().collect::<Vec<_>>(),
        });
        Ok(serde_json::from_value(self.call("create", params)?)?)
    }

    fn update(&self, entity_type: &str, id: i64, data: &Map<String, Value>) -> GridResult<Entity> {
        check_reserved(data)?;
        let params = json!({ "type": entity_type, "id": id, "fields": encode_fields(data) });
        Ok(serde_json::from_value(self.call("update", params)?)?)
    }

    fn delete(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        let results = self.call("delete", json!({ "type": entity_type, "id": id }))?;
        Ok(results.as_bool().unwrap_or(false))
    }

    fn revive(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        let results = self.call("revive", json!({ "type": entity_type, "id": id }))?;
        Ok(results.as_bool().unwrap_or(false))
    }

    /// Sent as one `batch` call, which the service applies atomically.
    fn batch(&self, requests: &[BatchRequest]) -> GridResult<Vec<BatchOutcome>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = requests
            .iter()
            .enumerate()
            .map(|(index, request)| encode_batch_request(index, request))
            .collect::<GridResult<Vec<_>>>()?;

        match self.call("batch", Value::Array(encoded))? {
            Value::Array(results) => results
                .into_iter()
                .map(|result| -> GridResult<BatchOutcome> {
                    match result {
                        Value::Bool(deleted) => Ok(BatchOutcome::Deleted(deleted)),
                        record => Ok(BatchOutcome::Record(serde_json::from_value(record)?)),
                    }
                })
                .collect(),
            other => Err(GridError::Remote(format!("batch returned {other}"))),
        }
    }

    fn schema_read(&self) -> GridResult<Value> {
        Ok(self.call("schema_read", json!({}))?)
    }

    fn schema_entity_read(&self) -> GridResult<Value> {
        Ok(self.call("schema_entity_read", json!({}))?)
    }

    fn schema_field_read(&self, entity_type: &str, field: Option<&str>) -> GridResult<Value> {
        let mut params = json!({ "type": entity_type });
        if let Some(field) = field {
            params["field_name"] = json!(field);
        }
        Ok(self.call("schema_field_read", params)?)
    }

    fn get_thumbnail_url(&self, entity_type: &str, id: i64, field: &str) -> GridResult<String> {
        match self.fetch_field(entity_type, id, field)? {
            Value::String(url) => Ok(url),
            Value::Null => Err(GridError::MissingAttachment {
                entity_type: entity_type.to_string(),
                id,
                field: field.to_string(),
            }),
            other => Err(GridError::Remote(format!("unexpected thumbnail value {other}"))),
        }
    }

    fn get_attachment_download_url(
        &self,
        entity_type: &str,
        id: i64,
        field: &str,
    ) -> GridResult<Option<String>> {
        let value = self.fetch_field(entity_type, id, field)?;
        Ok(attachment_url(&self.base_url, &value))
    }

    fn download_attachment(&self, attachment: &Value) -> GridResult<Vec<u8>> {
        let url = attachment_url(&self.base_url, attachment)
            .ok_or_else(|| {
                GridError::Remote(format!("attachment {attachment} has no download URL"))
            })?;
        debug!(%url, "downloading attachment");
        let bytes = self
            .http
            .get(&url)
            .timeout(self.reliability.timeout)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|response| response.bytes())
            .map_err(PoolError::from)?;
        Ok(bytes.to_vec())
    }
}

impl SessionHandle for RemoteClient {
    fn session_token(&self) -> Option<String> {
        self.session_token.lock().unwrap().clone()
    }

    fn configure(&mut self, reliability: &ReliabilityConfig) {
        self.reliability = reliability.clone();
    }
}

/// Builds [`RemoteClient`]s from one [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: PoolConfig,
}

impl HttpConnector {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Connector for HttpConnector {
    type Handle = RemoteClient;

    fn authenticate(&self) -> PoolResult<RemoteClient> {
        RemoteClient::connect(&self.config)
    }

    fn resume(&self, session_token: &str) -> PoolResult<RemoteClient> {
        RemoteClient::with_session(&self.config, session_token)
    }
}

fn build_http_client(config: &PoolConfig) -> PoolResult<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder()
        .timeout(config.reliability.timeout)
        .user_agent(concat!("gridlink/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy) = &config.http_proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url(proxy))?);
    }
    if let Some(path) = &config.ca_certs {
        let pem = std::fs::read(path)
            .map_err(|e| PoolError::Config(format!("{}: {e}", path.display())))?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }
    Ok(builder.build()?)
}

/// Proxies are configured as `[user:pass@]host[:port]`; a scheme is optional.
fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

fn script_auth(credentials: &Credentials) -> Value {
    json!({
        "script_name": credentials.script_name,
        "script_key": credentials.script_key,
    })
}

fn rpc_body(method: &str, auth: Option<Value>, params: Option<Value>) -> Value {
    let params: Vec<Value> = auth.into_iter().chain(params).collect();
    json!({ "method_name": method, "params": params })
}

fn decode_response(response: Value) -> PoolResult<Value> {
    let mut body = match response {
        Value::Object(body) => body,
        other => return Err(PoolError::Remote(format!("malformed response: {other}"))),
    };
    if body.get("exception").and_then(Value::as_bool) == Some(true) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return match body.get("error_code").and_then(Value::as_i64) {
            Some(ERR_AUTH) => Err(PoolError::Authentication(message)),
            Some(code) => Err(PoolError::Remote(format!("[{code}] {message}"))),
            None => Err(PoolError::Remote(message)),
        };
    }
    Ok(body.remove("results").unwrap_or(Value::Null))
}

fn encode_filters(filters: &[Filter], op: LogicalOperator) -> Value {
    let conditions: Vec<Value> = filters
        .iter()
        .map(|filter| {
            let values = match &filter.value {
                Value::Array(items) => items.clone(),
                single => vec![single.clone()],
            };
            json!({
                "path": filter.field,
                "relation": filter.operator.as_str(),
                "values": values,
            })
        })
        .collect();
    json!({ "logical_operator": op.as_str(), "conditions": conditions })
}

fn encode_sorts(order: &[SortKey]) -> Value {
    order
        .iter()
        .map(|key| {
            json!({
                "field_name": key.field,
                "direction": if key.descending { "desc" } else { "asc" },
            })
        })
        .collect()
}

fn encode_fields(data: &Map<String, Value>) -> Value {
    data.iter()
        .map(|(name, value)| json!({ "field_name": name, "value": value }))
        .collect()
}

fn read_params(entity_type: &str, query: &FindQuery, page: usize, per_page: usize) -> Value {
    let return_fields = query.fields.clone().unwrap_or_else(|| vec!["id".to_string()]);
    let mut params = json!({
        "type": entity_type,
        "return_fields": return_fields,
        "filters": encode_filters(&query.filters, query.filter_operator),
        "return_only": if query.retired_only { "retired" } else { "active" },
        "paging": { "entities_per_page": per_page, "current_page": page },
        "api_return_image_urls": true,
    });
    if !query.order.is_empty() {
        params["sorts"] = encode_sorts(&query.order);
    }
    params
}

fn encode_batch_request(index: usize, request: &BatchRequest) -> GridResult<Value> {
    let invalid = |what: &str| {
        GridError::InvalidBatchRequest(format!(
            "request {} ({} {}) {what}",
            index + 1,
            request.request_type,
            request.entity_type
        ))
    };
    let data = || request.data.as_ref().ok_or_else(|| invalid("is missing data"));
    let id = || request.entity_id.ok_or_else(|| invalid("is missing entity_id"));

    let encoded = match &request.request_type {
        BatchRequestType::Create => {
            let data = data()?;
            check_reserved(data)?;
            json!({
                "request_type": "create",
                "type": request.entity_type,
                "fields": encode_fields(data),
                "return_fields": data.keys().collect::<Vec<_>>(),
            })
        }
        BatchRequestType::Update => {
            let id = id()?;
            let data = data()?;
            check_reserved(data)?;
            json!({
                "request_type": "update",
                "type": request.entity_type,
                "id": id,
                "fields": encode_fields(data),
            })
        }
        BatchRequestType::Delete => json!({
            "request_type": "delete",
            "type": request.entity_type,
            "id": id()?,
        }),
        BatchRequestType::Other(kind) => {
            return Err(invalid(&format!("has unknown request_type '{kind}'")));
        }
    };
    Ok(encoded)
}

/// Resolves an attachment value to a download URL: a bare string, the `url`
/// key, or the service's file-serve path for an attachment id.
fn attachment_url(base_url: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Object(attachment) => attachment
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                let id = attachment.get("id")?.as_i64()?;
                Some(format!("{base_url}/file_serve/attachment/{id}"))
            }),
        _ => None,
    }
}
