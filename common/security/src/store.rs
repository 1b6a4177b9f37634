//! Read-only access to the document database.
//!
//! Only two collections matter for access decisions: `admins` (existence
//! marks an admin) and `accounts` (the role list).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::roles::AccountRole;

pub const ADMINS_COLLECTION: &str = "admins";
pub const ACCOUNTS_COLLECTION: &str = "accounts";

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub exists: bool,
    pub data: Option<Value>,
}

impl DocumentSnapshot {
    pub fn missing(id: impl Into<String>) -> Self {
        Self { id: id.into(), exists: false, data: None }
    }

    pub fn found(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), exists: true, data: Some(data) }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<DocumentSnapshot>;
}

/// `accounts/{uid}` as stored. Balances are display-only and kept opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub roles: Vec<AccountRole>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub balances: Map<String, Value>,
}

impl AccountRecord {
    /// `Ok(None)` when the document does not exist.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> StoreResult<Option<Self>> {
        let Some(data) = snapshot.data.as_ref().filter(|_| snapshot.exists) else {
            return Ok(None);
        };
        let mut record: AccountRecord = serde_json::from_value(data.clone()).map_err(|err| StoreError::Decode {
            path: format!("{ACCOUNTS_COLLECTION}/{}", snapshot.id),
            reason: err.to_string(),
        })?;
        if record.uid.is_empty() {
            record.uid = snapshot.id.clone();
        }
        Ok(Some(record))
    }

    pub fn has_role(&self, role: &AccountRole) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }
}

// ---------------- In-Memory Implementation ----------------

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<(String, String), Value>>>,
    unavailable: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        let mut guard = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert((collection.to_string(), id.to_string()), data);
    }

    pub fn remove(&self, collection: &str, id: &str) {
        let mut guard = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&(collection.to_string(), id.to_string()));
    }

    /// Simulate an outage: every read fails with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<DocumentSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("in-memory store marked unavailable".into()));
        }
        let guard = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match guard.get(&(collection.to_string(), id.to_string())) {
            Some(data) => DocumentSnapshot::found(id, data.clone()),
            None => DocumentSnapshot::missing(id),
        })
    }
}

// ---------------- Firestore REST Implementation ----------------

/// Reads documents through the Firestore REST API
/// (`{base}/{collection}/{id}`), decoding typed `fields` into plain JSON.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl FirestoreDocumentStore {
    pub fn new(base_url: &str, access_token: Option<String>) -> StoreResult<Self> {
        Self::with_client(Client::new(), base_url, access_token)
    }

    pub fn with_client(client: Client, base_url: &str, access_token: Option<String>) -> StoreResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|err| StoreError::Decode {
            path: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Decode {
                path: base_url.to_string(),
                reason: "base URL cannot carry a path".into(),
            });
        }
        Ok(Self { client, base_url, access_token })
    }

    /// Default documents root for a project's `(default)` database.
    pub fn project_base_url(project_id: &str) -> String {
        format!("https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents")
    }

    fn document_url(&self, collection: &str, id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(collection).push(id);
        }
        url
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<DocumentSnapshot> {
        let path = format!("{collection}/{id}");
        let mut request = self.client.get(self.document_url(collection, id));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| StoreError::Transport(err.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(DocumentSnapshot::missing(id)),
            status if !status.is_success() => {
                return Err(StoreError::Status { path, status: status.as_u16() });
            }
            _ => {}
        }

        let body: FirestoreDocument = response.json().await.map_err(|err| StoreError::Decode {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let data = body
            .fields
            .into_iter()
            .map(|(key, value)| (key, decode_value(value)))
            .collect::<Map<_, _>>();
        Ok(DocumentSnapshot::found(id, Value::Object(data)))
    }
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Flatten one Firestore typed value (`{"stringValue": "x"}`) into JSON.
fn decode_value(value: Value) -> Value {
    let Value::Object(mut typed) = value else {
        return value;
    };
    let Some((kind, inner)) = typed.iter_mut().next().map(|(k, v)| (k.clone(), v.take())) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "integerValue" => inner
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(inner),
        "arrayValue" => {
            let values = match inner {
                Value::Object(mut array) => match array.remove("values") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            Value::Array(values.into_iter().map(decode_value).collect())
        }
        "mapValue" => {
            let fields = match inner {
                Value::Object(mut map) => match map.remove("fields") {
                    Some(Value::Object(fields)) => fields,
                    _ => Map::new(),
                },
                _ => Map::new(),
            };
            Value::Object(fields.into_iter().map(|(key, value)| (key, decode_value(value))).collect())
        }
        // stringValue, booleanValue, doubleValue, timestampValue, referenceValue, ...
        _ => inner,
    }
}
