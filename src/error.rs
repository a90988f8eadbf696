use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("expected 3 parts separated by `<|>` in raw query, found {parts}: '{raw}'")]
    MalformedQuery { raw: String, parts: usize },

    #[error("invalid category id '{token}' in raw query: '{raw}'")]
    InvalidCategoryId { raw: String, token: String },

    #[error("record {record} in {file} does not look like an item: {reason}")]
    InvalidItemRecord {
        file: String,
        record: u64,
        reason: String,
    },

    #[error("invalid timestamp '{value}' (expected `YYYY-MM-DD HH:MM:SS ZONE`)")]
    InvalidTimestamp { value: String },

    #[error("malformed result line {line} in {file}: '{text}'")]
    MalformedResultLine {
        file: String,
        line: usize,
        text: String,
    },

    #[error("failed to read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{method} {url} failed")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("got unexpected status code {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response body from {url}")]
    MalformedBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bulk write reported item errors: {body}")]
    BulkRejected { body: String },

    #[error("sanity search against {url} did not return '{expected}'")]
    SanityCheckFailed { url: String, expected: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error(
        "line {line}: at query #{main_ordinal} in file {main_file} but query #{other_ordinal} in file {other_file}"
    )]
    OrdinalMismatch {
        line: usize,
        main_file: String,
        main_ordinal: u64,
        other_file: String,
        other_ordinal: u64,
    },

    #[error(
        "line {line}: query #{ordinal} is bm={main_flag} in file {main_file} but bm={other_flag} in file {other_file}"
    )]
    BestMatchMismatch {
        line: usize,
        ordinal: u64,
        main_file: String,
        main_flag: u8,
        other_file: String,
        other_flag: u8,
    },
}
