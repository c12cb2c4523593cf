use serde::Serialize;

use crate::store::SourceCount;

use super::config::FeedConfig;

#[derive(Serialize)]
pub struct FeedList {
    pub feeds: Vec<FeedConfig>,
}

#[derive(Serialize)]
pub struct FeedCounts {
    pub message: String,
    pub counts: Vec<SourceCount>,
}

#[derive(Serialize)]
pub struct FeedClearPlan {
    pub action: &'static str,
    pub source: String,
    pub articles: i64,
}

#[derive(Serialize)]
pub struct FeedClearResult {
    pub message: String,
    pub source: String,
    pub deleted: u64,
}
