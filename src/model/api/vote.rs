use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{OptionId, PollId},
    db::ballot::Ballot,
};

/// A vote as submitted by a voter; the voter is identified by their token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: OptionId,
}

/// Confirmation that a vote was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub ballot_id: ApiId,
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub voted_at: DateTime<Utc>,
    pub message: String,
}

impl From<Ballot> for Receipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            ballot_id: ballot.id.into(),
            poll_id: ballot.poll_id,
            option_id: ballot.option_id,
            voted_at: ballot.voted_at,
            message: "Vote submitted successfully".to_string(),
        }
    }
}

/// Whether a voter has voted on a poll, and for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    pub voted_option_id: Option<OptionId>,
}

impl From<Option<Ballot>> for VoteStatus {
    fn from(ballot: Option<Ballot>) -> Self {
        Self {
            has_voted: ballot.is_some(),
            voted_option_id: ballot.map(|b| b.option_id),
        }
    }
}

/// Result for a single option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    pub option_id: OptionId,
    pub option_text: String,
    pub vote_count: u32,
    /// Share of the poll's votes, rounded to 2 decimal places.
    pub percentage: f64,
}

/// Aggregated results of a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: PollId,
    pub title: String,
    pub total_votes: u64,
    pub options: Vec<OptionResult>,
}
