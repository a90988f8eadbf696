use serde::{Deserialize, Serialize};

use crate::backend::IndexStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    OnSale,
    Trading,
    SoldOut,
    Stopped,
    Cancelled,
    Other,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Self::OnSale => 1,
            Self::Trading => 2,
            Self::SoldOut => 3,
            Self::Stopped => 4,
            Self::Cancelled => 5,
            Self::Other => 6,
        }
    }

    pub fn from_record(value: &str) -> Self {
        match value {
            "on_sale" => Self::OnSale,
            "trading" => Self::Trading,
            "sold_out" => Self::SoldOut,
            "stop" => Self::Stopped,
            "cancel" => Self::Cancelled,
            _ => Self::Other,
        }
    }

    pub fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "ITEM_STATUS_ON_SALE" => Some(Self::OnSale),
            "ITEM_STATUS_TRADING" => Some(Self::Trading),
            "ITEM_STATUS_SOLD_OUT" => Some(Self::SoldOut),
            _ => None,
        }
    }

    pub fn query_token(self) -> Option<&'static str> {
        match self {
            Self::OnSale => Some("ITEM_STATUS_ON_SALE"),
            Self::Trading => Some("ITEM_STATUS_TRADING"),
            Self::SoldOut => Some("ITEM_STATUS_SOLD_OUT"),
            _ => None,
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::OnSale),
            2 => Ok(Self::Trading),
            3 => Ok(Self::SoldOut),
            4 => Ok(Self::Stopped),
            5 => Ok(Self::Cancelled),
            6 => Ok(Self::Other),
            other => Err(format!("unknown status code {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub status: Status,
    pub created: i64,
    pub category_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ItemCondition {
    LikeNew,
    Good,
    Poor,
    Other,
}

impl ItemCondition {
    pub fn code(self) -> u8 {
        match self {
            Self::LikeNew => 1,
            Self::Good => 2,
            Self::Poor => 3,
            Self::Other => 4,
        }
    }

    pub fn from_record(value: &str) -> Self {
        match value {
            "1" => Self::LikeNew,
            "2" => Self::Good,
            "3" => Self::Poor,
            _ => Self::Other,
        }
    }
}

impl From<ItemCondition> for u8 {
    fn from(condition: ItemCondition) -> Self {
        condition.code()
    }
}

impl TryFrom<u8> for ItemCondition {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::LikeNew),
            2 => Ok(Self::Good),
            3 => Ok(Self::Poor),
            4 => Ok(Self::Other),
            other => Err(format!("unknown item condition code {other}")),
        }
    }
}

// Listing without its description, as exported for the `items_no_desc` index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemNoDesc {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub created: i64,
    pub updated: i64,
    pub category_id: i64,
    pub price: i64,
    pub item_condition: ItemCondition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.created.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Update(ItemUpdate),
    Insert(Item),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub item_id: String,
    #[serde(flatten)]
    pub change: ChangeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchRunReport {
    pub report_version: u32,
    pub generated_at: String,
    pub index: String,
    pub queries_file: String,
    pub queries_sha256: String,
    pub query_count: usize,
    pub runs: usize,
    pub page_size: u64,
    pub fetch_cap: u64,
    pub fetch_source: bool,
    pub results_file: Option<String>,
    pub first_run_hits_fetched: u64,
    pub run_durations_ms: Vec<u128>,
    pub average_duration_ms: u128,
    pub index_stats_before: IndexStats,
    pub index_stats_after: IndexStats,
}
