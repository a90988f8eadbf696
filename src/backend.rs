use reqwest::Method;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::model::{Item, ItemNoDesc};

pub const DEFAULT_HOST: &str = "http://127.0.0.1:9200";
pub const DEFAULT_INDEX: &str = "items";
pub const NO_DESC_INDEX: &str = "items_no_desc";
const SANITY_INDEX: &str = "test";
const SANITY_QUERY: &str = r#"name:"daisy malone"^5 AND age:>=10^2"#;
const SANITY_EXPECTED_NAME: &str = "Mrs Daisy Malone";

const LARGE_BULK_BYTES: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TotalRelation {
    Exact,
    GreaterThanOrEqual,
}

impl TotalRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "eq",
            Self::GreaterThanOrEqual => "gte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub score: f64,
    pub source: Option<Item>,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub hits: Vec<Hit>,
    pub total: u64,
    pub relation: TotalRelation,
}

pub trait SearchBackend {
    fn search(&self, body: &Value) -> Result<SearchPage, BackendError>;
}

pub trait IndexDocument: Serialize {
    fn document_id(&self) -> &str;
}

impl IndexDocument for Item {
    fn document_id(&self) -> &str {
        &self.id
    }
}

impl IndexDocument for ItemNoDesc {
    fn document_id(&self) -> &str {
        &self.id
    }
}

pub trait BulkBackend {
    fn bulk_index<D: IndexDocument>(&self, documents: &[D]) -> Result<(), BackendError>;
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    total: RawTotal,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawTotal {
    value: u64,
    relation: String,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Option<Item>,
}

pub fn parse_search_response(url: &str, body: &[u8]) -> Result<SearchPage, BackendError> {
    let raw: RawSearchResponse =
        serde_json::from_slice(body).map_err(|source| BackendError::MalformedBody {
            url: url.to_string(),
            source,
        })?;

    let relation = match raw.hits.total.relation.as_str() {
        "gte" => TotalRelation::GreaterThanOrEqual,
        _ => TotalRelation::Exact,
    };

    Ok(SearchPage {
        hits: raw
            .hits
            .hits
            .into_iter()
            .map(|hit| Hit {
                id: hit.id,
                score: hit.score.unwrap_or(0.0),
                source: hit.source,
            })
            .collect(),
        total: raw.hits.total.value,
        relation,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    #[serde(rename = "_all", default)]
    pub all: StatsScope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsScope {
    #[serde(default)]
    pub primaries: PrimaryStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimaryStats {
    #[serde(default)]
    pub docs: DocStats,
    #[serde(default)]
    pub store: StoreStats,
    #[serde(default)]
    pub query_cache: QueryCacheStats,
    #[serde(default)]
    pub request_cache: RequestCacheStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocStats {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub deleted: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub total_data_set_size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryCacheStats {
    #[serde(default)]
    pub cache_count: u64,
    #[serde(default)]
    pub cache_size: u64,
    #[serde(default)]
    pub evictions: u64,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub memory_size_in_bytes: u64,
    #[serde(default)]
    pub miss_count: u64,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestCacheStats {
    #[serde(default)]
    pub evictions: u64,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub memory_size_in_bytes: u64,
    #[serde(default)]
    pub miss_count: u64,
}

impl IndexStats {
    pub fn doc_count(&self) -> u64 {
        self.all.primaries.docs.count
    }
}

pub fn items_index_definition() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": {"type": "keyword"},
                "name": {"type": "text"},
                "desc": {"type": "text"},
                "status": {"type": "integer"},
                "created": {"type": "date", "format": "epoch_millis"},
                "category_id": {"type": "integer"},
            }
        },
        "settings": benchmark_index_settings(),
    })
}

pub fn items_no_desc_index_definition() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": {"type": "keyword"},
                "name": {"type": "text"},
                "status": {"type": "integer"},
                "created": {"type": "date", "format": "epoch_millis"},
                "updated": {"type": "date", "format": "epoch_millis"},
                "category_id": {"type": "integer"},
                "item_condition": {"type": "integer"},
            }
        },
        "settings": benchmark_index_settings(),
    })
}

// One shard, no query cache, BM25 pinned to its defaults.
fn benchmark_index_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "index": {
            "queries.cache.enabled": "false",
            "similarity": {
                "default": {"type": "BM25", "b": 0.75, "k1": 1.2}
            }
        }
    })
}

pub fn build_bulk_body<D: IndexDocument>(
    index: &str,
    documents: &[D],
) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for document in documents {
        let action = json!({"index": {"_index": index, "_id": document.document_id()}});
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(document)?);
        body.push('\n');
    }
    body.push('\n');
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
}

pub fn check_bulk_response(url: &str, status: u16, body: &[u8]) -> Result<(), BackendError> {
    if status != 200 {
        return Err(BackendError::Status {
            url: url.to_string(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    let parsed: BulkResponse =
        serde_json::from_slice(body).map_err(|source| BackendError::MalformedBody {
            url: url.to_string(),
            source,
        })?;
    if parsed.errors {
        return Err(BackendError::BulkRejected {
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SanityDocument {
    #[serde(skip)]
    id: &'static str,
    age: u32,
    name: &'static str,
    email: &'static str,
}

impl IndexDocument for SanityDocument {
    fn document_id(&self) -> &str {
        self.id
    }
}

fn sanity_documents() -> [SanityDocument; 3] {
    [
        SanityDocument {
            id: "101",
            age: 30,
            name: "Mr Magoo",
            email: "mr@magoo.se",
        },
        SanityDocument {
            id: "102",
            age: 25,
            name: "Ms Molly",
            email: "ms@molly.se",
        },
        SanityDocument {
            id: "103",
            age: 21,
            name: SANITY_EXPECTED_NAME,
            email: "dmalone@molly.se",
        },
    ]
}

fn sanity_index_definition() -> Value {
    json!({
        "mappings": {
            "properties": {
                "age": {"type": "integer"},
                "email": {"type": "keyword"},
                "name": {"type": "text"},
            }
        }
    })
}

pub fn check_sanity_response(url: &str, body: &[u8]) -> Result<(), BackendError> {
    let parsed: Value = serde_json::from_slice(body).map_err(|source| BackendError::MalformedBody {
        url: url.to_string(),
        source,
    })?;
    let found = parsed["hits"]["hits"]
        .as_array()
        .into_iter()
        .flatten()
        .any(|hit| hit["_source"]["name"] == SANITY_EXPECTED_NAME);
    if !found {
        return Err(BackendError::SanityCheckFailed {
            url: url.to_string(),
            expected: SANITY_EXPECTED_NAME.to_string(),
        });
    }
    Ok(())
}

pub struct ElasticClient {
    client: Client,
    host: String,
    index: String,
}

struct RawResponse {
    url: String,
    status: u16,
    body: Vec<u8>,
}

impl RawResponse {
    fn ensure_success(self) -> Result<Self, BackendError> {
        if self.status >= 300 {
            return Err(BackendError::Status {
                url: self.url,
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            });
        }
        Ok(self)
    }
}

impl ElasticClient {
    pub fn new(host: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn call(
        &self,
        method: Method,
        path: &str,
        content_type: &str,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, BackendError> {
        let url = format!("{}{}", self.host, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("content-type", content_type);
        if let Some(body) = body {
            request = request.body(body);
        }

        let transport = |source| BackendError::Transport {
            method: method.to_string(),
            url: url.clone(),
            source,
        };
        let response = request.send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport)?.to_vec();

        debug!(%method, url = %url, status, bytes = body.len(), "backend call");
        Ok(RawResponse { url, status, body })
    }

    fn call_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, BackendError> {
        let body = body.map(|value| value.to_string().into_bytes());
        self.call(method, path, "application/json", body)
    }

    pub fn recreate_index(&self, definition: &Value) -> Result<(), BackendError> {
        let path = format!("/{}", self.index);
        let deleted = self.call_json(Method::DELETE, &path, None)?;
        if deleted.status == 404 {
            info!(index = %self.index, "index did not exist yet");
        } else {
            deleted.ensure_success()?;
        }

        self.call_json(Method::PUT, &path, Some(definition))?
            .ensure_success()?;
        info!(index = %self.index, "created index");
        Ok(())
    }

    pub fn sanity_check(&self) -> Result<(), BackendError> {
        let scratch = Self {
            client: self.client.clone(),
            host: self.host.clone(),
            index: SANITY_INDEX.to_string(),
        };
        scratch.recreate_index(&sanity_index_definition())?;
        scratch.bulk_index(&sanity_documents())?;
        scratch.refresh()?;

        let path = format!("/{SANITY_INDEX}/_search");
        let query = json!({"query": {"query_string": {"query": SANITY_QUERY}}});
        let response = scratch
            .call_json(Method::POST, &path, Some(&query))?
            .ensure_success()?;
        check_sanity_response(&response.url, &response.body)?;

        info!(host = %self.host, "sanity check passed");
        Ok(())
    }

    pub fn refresh(&self) -> Result<(), BackendError> {
        let path = format!("/{}/_refresh", self.index);
        self.call_json(Method::POST, &path, None)?.ensure_success()?;
        Ok(())
    }

    pub fn index_stats(&self) -> Result<IndexStats, BackendError> {
        let path = format!("/{}/_stats", self.index);
        let response = self.call_json(Method::GET, &path, None)?.ensure_success()?;
        serde_json::from_slice(&response.body).map_err(|source| BackendError::MalformedBody {
            url: response.url,
            source,
        })
    }
}

impl BulkBackend for ElasticClient {
    fn bulk_index<D: IndexDocument>(&self, documents: &[D]) -> Result<(), BackendError> {
        let url = format!("{}/_bulk", self.host);
        let body = build_bulk_body(&self.index, documents).map_err(|source| {
            BackendError::MalformedBody {
                url: url.clone(),
                source,
            }
        })?;
        if body.len() > LARGE_BULK_BYTES {
            warn!(bytes = body.len(), "bulk index body is unusually large");
        }

        info!(documents = documents.len(), bytes = body.len(), "bulk indexing");
        let response = self.call(
            Method::POST,
            "/_bulk",
            "application/x-ndjson",
            Some(body.into_bytes()),
        )?;
        check_bulk_response(&response.url, response.status, &response.body)
    }
}

impl SearchBackend for ElasticClient {
    fn search(&self, body: &Value) -> Result<SearchPage, BackendError> {
        let path = format!("/{}/_search?request_cache=false", self.index);
        let response = self
            .call_json(Method::POST, &path, Some(body))?
            .ensure_success()?;
        parse_search_response(&response.url, &response.body)
    }
}
