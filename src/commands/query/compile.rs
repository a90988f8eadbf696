use serde_json::{Map, Value, json};

use super::decode::StructuredQuery;

pub const KEYWORD_FIELDS: [&str; 2] = ["name", "desc"];

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match { field: &'static str, query: String },
    Terms { field: &'static str, values: Vec<i64> },
}

impl Clause {
    fn to_json(&self) -> Value {
        match self {
            Self::Match { field, query } => json!({"match": {*field: {"query": query}}}),
            Self::Terms { field, values } => json!({"terms": {*field: values}}),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Relevance,
    // Keeps filter-only pagination stable.
    CreatedDesc,
}

impl SortKey {
    fn to_json(self) -> Value {
        match self {
            Self::Relevance => json!({"_score": "desc"}),
            Self::CreatedDesc => json!({"created": "desc"}),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub should: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
    pub filter: Vec<Clause>,
    pub sort: Option<SortKey>,
}

pub fn compile_query(query: &StructuredQuery) -> CompiledQuery {
    let mut filter = Vec::new();
    let mut sort = None;

    if !query.category_ids.is_empty() {
        filter.push(Clause::Terms {
            field: "category_id",
            values: query.category_ids.clone(),
        });
    }
    if !query.statuses.is_empty() {
        filter.push(Clause::Terms {
            field: "status",
            values: query
                .statuses
                .iter()
                .map(|status| i64::from(status.code()))
                .collect(),
        });
    }
    if !filter.is_empty() {
        sort = Some(SortKey::CreatedDesc);
    }

    let mut should = Vec::new();
    let mut minimum_should_match = None;
    if let Some(keyword) = &query.keyword {
        should = KEYWORD_FIELDS
            .iter()
            .map(|&field| Clause::Match {
                field,
                query: keyword.clone(),
            })
            .collect();
        minimum_should_match = Some(1);
        // Keyword presence wins over the filter sort.
        sort = Some(SortKey::Relevance);
    }

    CompiledQuery {
        should,
        minimum_should_match,
        filter,
        sort,
    }
}

impl CompiledQuery {
    pub fn bool_query(&self) -> Value {
        let mut bool_query = Map::new();
        if !self.should.is_empty() {
            bool_query.insert(
                "should".to_string(),
                Value::Array(self.should.iter().map(Clause::to_json).collect()),
            );
        }
        if let Some(minimum) = self.minimum_should_match {
            bool_query.insert("minimum_should_match".to_string(), json!(minimum));
        }
        if !self.filter.is_empty() {
            bool_query.insert(
                "filter".to_string(),
                Value::Array(self.filter.iter().map(Clause::to_json).collect()),
            );
        }
        Value::Object(bool_query)
    }

    pub fn request_body(&self, from: u64, size: u64, fetch_source: bool) -> Value {
        let mut body = json!({
            "query": {"bool": self.bool_query()},
            "size": size,
            "_source": fetch_source,
            "from": from,
        });
        if let Some(sort) = self.sort {
            body["sort"] = sort.to_json();
        }
        body
    }
}
