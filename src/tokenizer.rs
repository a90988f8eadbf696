use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BackendError;

pub trait Tokenizer {
    fn segment(&self, text: &str) -> Result<Vec<String>>;

    fn segment_joined(&self, text: &str) -> Result<String> {
        Ok(self.segment(text)?.join(" "))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(ToOwned::to_owned).collect())
    }
}

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    tokens: Vec<String>,
}

pub struct SegmenterService {
    client: Client,
    url: String,
}

impl SegmenterService {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

impl Tokenizer for SegmenterService {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .post(&self.url)
            .json(&SegmentRequest { text })
            .send()
            .map_err(|source| BackendError::Transport {
                method: "POST".to_string(),
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .with_context(|| format!("failed to read segmenter response from {}", self.url))?;
        if !status.is_success() {
            return Err(BackendError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }

        let parsed: SegmentResponse =
            serde_json::from_slice(&body).map_err(|source| BackendError::MalformedBody {
                url: self.url.clone(),
                source,
            })?;
        Ok(parsed.tokens)
    }
}

pub fn build_tokenizer(segmenter_url: Option<&str>) -> Box<dyn Tokenizer> {
    match segmenter_url {
        Some(url) => {
            info!(url, "using segmentation service");
            Box::new(SegmenterService::new(url))
        }
        None => Box::new(WhitespaceTokenizer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_tokenizer_collapses_runs_of_spaces() {
        let tokens = WhitespaceTokenizer
            .segment("  red\tshoes  size 42 ")
            .expect("segment");
        assert_eq!(tokens, vec!["red", "shoes", "size", "42"]);
        assert_eq!(
            WhitespaceTokenizer.segment_joined("red   shoes").expect("join"),
            "red shoes"
        );
    }
}
