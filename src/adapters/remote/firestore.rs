//! Firestore REST Adapter - Remote Document Store over HTTPS
//!
//! Implements the `DocumentStore` port against the Firestore v1 REST
//! API with reqwest. Writes go through `:commit` so server timestamps
//! can be applied as field transforms; ordered reads use `:runQuery`.
//! The REST surface has no push channel, so live listeners poll the
//! ordered query and deliver a snapshot whenever the result changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::firestore_value::{decode_fields, encode_fields};
use crate::domain::ids::new_auto_id;
use crate::domain::records::{Direction, SortOrder};
use crate::ports::document_store::{
    CollectionPath, DocumentStore, DocumentWrite, RemoteError, SnapshotListener,
    StoredDocument,
};

/// Configuration for the Firestore REST client.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// API root, e.g. `https://firestore.googleapis.com/v1`.
    pub base_url: String,
    /// Google Cloud project id.
    pub project_id: String,
    /// Web API key, sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// Auth provider ID token, sent as a bearer token. Without it the
    /// access rules see an unauthenticated caller.
    pub id_token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Interval between listener polls.
    pub poll_interval: Duration,
    /// Maximum retries on transient errors.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            api_key: None,
            id_token: None,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

/// Firestore document store client. Cheap to clone.
#[derive(Clone)]
pub struct FirestoreRestStore {
    http: Client,
    config: Arc<FirestoreConfig>,
}

impl FirestoreRestStore {
    pub fn new(config: FirestoreConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.project_id.is_empty(), "Firestore project_id must not be empty");
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Resource name prefix: `projects/{p}/databases/(default)/documents`.
    fn database_name(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.config.project_id
        )
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{}/{}/{resource}",
            self.config.base_url.trim_end_matches('/'),
            self.database_name()
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/{}:commit",
            self.config.base_url.trim_end_matches('/'),
            self.database_name()
        )
    }

    fn document_name(&self, path: &CollectionPath, id: &str) -> String {
        format!("{}/{}", self.database_name(), path.document(id))
    }

    fn commit_body(
        &self,
        name: String,
        write: &DocumentWrite,
        exists: bool,
        mask: bool,
    ) -> Value {
        let transforms: Vec<Value> = write
            .server_timestamps
            .iter()
            .map(|f| json!({ "fieldPath": f, "setToServerValue": "REQUEST_TIME" }))
            .collect();
        let mut op = json!({
            "update": { "name": name, "fields": encode_fields(&write.fields) },
            "updateTransforms": transforms,
            "currentDocument": { "exists": exists },
        });
        if mask {
            let paths: Vec<&String> = write.fields.keys().collect();
            op["updateMask"] = json!({ "fieldPaths": paths });
        }
        json!({ "writes": [op] })
    }

    fn structured_query(path: &CollectionPath, order: Option<SortOrder>) -> Value {
        let mut query = json!({ "from": [{ "collectionId": path.collection_id() }] });
        if let Some(order) = order {
            let direction = match order.direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            query["orderBy"] = json!([{ "field": { "fieldPath": order.field }, "direction": direction }]);
        }
        json!({ "structuredQuery": query })
    }

    /// Execute a request with auth and retries, mapping failures onto
    /// `RemoteError`. `resource` names the path for error messages.
    async fn execute(&self, request: RequestBuilder, resource: &str) -> Result<Value, RemoteError> {
        self.exchange(request, resource).await.0
    }

    /// Like `execute`, also reporting whether the answer came from a
    /// retry, i.e. an earlier attempt may already have been applied.
    async fn exchange(&self, request: RequestBuilder, resource: &str) -> (Result<Value, RemoteError>, bool) {
        let mut request = request;
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.config.id_token {
            request = request.bearer_auth(token);
        }

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let retried = attempt > 0;
            if retried {
                let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis(), "Retrying request");
                sleep(delay).await;
            }

            let Some(req) = request.try_clone() else {
                return (
                    Err(RemoteError::Transport("request body is not cloneable".to_string())),
                    retried,
                );
            };

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let result = match response.text().await {
                            Ok(text) if text.trim().is_empty() => Ok(Value::Null),
                            Ok(text) => serde_json::from_str(&text)
                                .map_err(|e| RemoteError::Malformed(e.to_string())),
                            Err(e) => Err(RemoteError::Transport(e.to_string())),
                        };
                        return (result, retried);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        warn!(status = %status, attempt, "Transient Firestore error, retrying");
                        last_error = Some(RemoteError::Transport(format!("server returned {status}")));
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return (Err(classify(status, &body, resource)), retried);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Firestore request failed");
                    last_error = Some(RemoteError::Transport(e.to_string()));
                }
            }
        }

        let err = last_error.unwrap_or_else(|| RemoteError::Transport("max retries exceeded".to_string()));
        (Err(err), self.config.max_retries > 0)
    }

    fn parse_query_response(response: &Value) -> Result<Vec<StoredDocument>, RemoteError> {
        let rows = response
            .as_array()
            .ok_or_else(|| RemoteError::Malformed("runQuery response is not an array".to_string()))?;
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(|doc| {
                let name = doc
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RemoteError::Malformed("document without name".to_string()))?;
                let id = name.rsplit('/').next().unwrap_or(name).to_string();
                Ok(StoredDocument {
                    id,
                    fields: decode_fields(doc.get("fields"))?,
                })
            })
            .collect()
    }
}

/// A create precondition failure: the document id is already taken.
fn is_already_exists(err: &RemoteError) -> bool {
    matches!(err, RemoteError::Rejected { status: 409, message }
        if message.to_ascii_lowercase().contains("already exists"))
}

/// Map a non-success HTTP answer onto the port's error taxonomy.
fn classify(status: StatusCode, body: &str, resource: &str) -> RemoteError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let code = error
        .and_then(|e| e.get("status"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string);

    if status == StatusCode::FORBIDDEN || code == "PERMISSION_DENIED" {
        return RemoteError::PermissionDenied {
            path: resource.to_string(),
        };
    }
    if status == StatusCode::NOT_FOUND || code == "NOT_FOUND" {
        return RemoteError::NotFound {
            path: resource.to_string(),
        };
    }
    RemoteError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DocumentStore for FirestoreRestStore {
    #[instrument(skip_all, fields(path = %path))]
    async fn add_document(
        &self,
        path: &CollectionPath,
        write: DocumentWrite,
    ) -> Result<String, RemoteError> {
        let id = new_auto_id();
        let body = self.commit_body(self.document_name(path, &id), &write, false, false);
        let (result, retried) = self
            .exchange(self.http.post(self.commit_url()).json(&body), path.as_str())
            .await;
        match result {
            Ok(_) => debug!(id = %id, "Document committed"),
            // The id is fresh, so on a retry it can only exist because an
            // earlier attempt of this same commit was applied.
            Err(e) if retried && is_already_exists(&e) => {
                warn!(id = %id, "Commit was applied by an earlier attempt");
            }
            Err(e) => return Err(e),
        }
        Ok(id)
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn query(
        &self,
        path: &CollectionPath,
        order: Option<SortOrder>,
    ) -> Result<Vec<StoredDocument>, RemoteError> {
        let url = format!("{}:runQuery", self.url(path.parent()));
        let body = Self::structured_query(path, order);
        let response = self
            .execute(self.http.post(url).json(&body), path.as_str())
            .await?;
        Self::parse_query_response(&response)
    }

    async fn listen(
        &self,
        path: &CollectionPath,
        order: Option<SortOrder>,
    ) -> Result<SnapshotListener, RemoteError> {
        // Setup errors (permission, transport) surface to the caller.
        let initial = self.query(path, order).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(initial.clone()));
        info!(path = %path, "Polling listener started");

        let store = self.clone();
        let path = path.clone();
        tokio::spawn(async move {
            let mut last = initial;
            let mut ticker = tokio::time::interval(store.config.poll_interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = tx.closed() => {
                        debug!(path = %path, "Listener dropped, stopping poll");
                        break;
                    }
                    _ = ticker.tick() => {
                        match store.query(&path, order).await {
                            Ok(docs) => {
                                if docs != last {
                                    if tx.send(Ok(docs.clone())).is_err() {
                                        break;
                                    }
                                    last = docs;
                                }
                            }
                            Err(e) => {
                                let _ = tx.send(Err(e));
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(SnapshotListener::new(rx))
    }

    #[instrument(skip_all, fields(path = %path, id = %id))]
    async fn update_document(
        &self,
        path: &CollectionPath,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), RemoteError> {
        let body = self.commit_body(self.document_name(path, id), &write, true, true);
        self.execute(self.http.post(self.commit_url()).json(&body), &path.document(id))
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path, id = %id))]
    async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), RemoteError> {
        let resource = path.document(id);
        match self.execute(self.http.delete(self.url(&resource)), &resource).await {
            Ok(_) | Err(RemoteError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
