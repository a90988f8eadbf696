use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::InputError;
use crate::model::Status;
use crate::tokenizer::Tokenizer;

pub const SEGMENT_DELIMITER: &str = "<|>";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredQuery {
    pub keyword: Option<String>,
    pub category_ids: Vec<i64>,
    pub statuses: Vec<Status>,
}

impl StructuredQuery {
    pub fn has_filters(&self) -> bool {
        !self.category_ids.is_empty() || !self.statuses.is_empty()
    }

    pub fn encode(&self) -> String {
        let categories = self
            .category_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let statuses = self
            .statuses
            .iter()
            .filter_map(|status| status.query_token())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}{SEGMENT_DELIMITER}[{categories}]{SEGMENT_DELIMITER}[{statuses}]",
            self.keyword.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchQuery {
    query: String,
    #[serde(rename = "c", default)]
    frequency: Option<String>,
}

pub fn decode_query(raw: &str, tokenizer: &dyn Tokenizer) -> Result<StructuredQuery> {
    let parts: Vec<&str> = raw.split(SEGMENT_DELIMITER).collect();
    let [keyword, categories, statuses] = parts.as_slice() else {
        return Err(InputError::MalformedQuery {
            raw: raw.to_string(),
            parts: parts.len(),
        }
        .into());
    };

    let mut query = StructuredQuery::default();

    if !keyword.is_empty() {
        let tokens = tokenizer
            .segment(keyword)
            .with_context(|| format!("failed to tokenize keyword of raw query: '{raw}'"))?;
        if !tokens.is_empty() {
            query.keyword = Some(tokens.join(" "));
        }
    }

    if categories.len() > 2 {
        for token in array_tokens(categories) {
            let id = token
                .parse::<i64>()
                .map_err(|_| InputError::InvalidCategoryId {
                    raw: raw.to_string(),
                    token: token.to_string(),
                })?;
            query.category_ids.push(id);
        }
    }

    if statuses.len() > 2 {
        for token in array_tokens(statuses) {
            let Some(status) = Status::from_query_token(token.trim_matches('"')) else {
                continue;
            };
            if !query.statuses.contains(&status) {
                query.statuses.push(status);
            }
        }
    }

    Ok(query)
}

fn array_tokens(segment: &str) -> impl Iterator<Item = &str> {
    let inner = segment.strip_prefix('[').unwrap_or(segment);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    inner.split(',').map(str::trim)
}

pub fn load_queries(path: &Path, tokenizer: &dyn Tokenizer) -> Result<Vec<StructuredQuery>> {
    info!(path = %path.display(), "loading queries");

    let raw = fs::read(path).map_err(|source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<RawSearchQuery> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse queries file {}", path.display()))?;

    let mut queries = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let query = decode_query(&record.query, tokenizer)
            .with_context(|| format!("query #{} in {}", index + 1, path.display()))?;
        debug!(
            ordinal = index + 1,
            query = %query.encode(),
            frequency = record.frequency.as_deref().unwrap_or("-"),
            "decoded query"
        );
        queries.push(query);
    }

    info!(count = queries.len(), "loaded and prepared queries");
    Ok(queries)
}
