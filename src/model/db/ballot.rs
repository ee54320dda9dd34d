//! The ballot ledger: one immutable document per recorded vote, and the source
//! of truth for whether a voter has voted on a poll.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    error::Error as DbError,
    options::FindOneOptions,
    ClientSession,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{OptionId, PollId, UserId},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Core ballot data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub voter_id: UserId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Ballot {
    /// Create a new ballot cast now.
    pub fn new(voter_id: UserId, poll_id: PollId, option_id: OptionId) -> Self {
        Self {
            id: Id::new(),
            ballot: BallotCore {
                poll_id,
                option_id,
                voter_id,
                voted_at: Utc::now(),
            },
        }
    }

    /// Append this ballot to the ledger within a session. Returns `false`
    /// without writing if the voter already has a ballot for the poll: the
    /// unique index on `(voter_id, poll_id)` rejects the insert.
    pub async fn insert_with_session(
        &self,
        ballots: &Coll<Ballot>,
        session: &mut ClientSession,
    ) -> Result<bool, DbError> {
        match ballots.insert_one_with_session(self, None, session).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn voter_filter(voter_id: UserId, poll_id: PollId) -> mongodb::bson::Document {
        doc! {
            "voter_id": voter_id,
            "poll_id": poll_id,
        }
    }

    /// The voter's ballot on the given poll, if any.
    pub async fn find_for_voter(
        ballots: &Coll<Ballot>,
        voter_id: UserId,
        poll_id: PollId,
    ) -> Result<Option<Self>, DbError> {
        ballots
            .find_one(Self::voter_filter(voter_id, poll_id), None)
            .await
    }

    /// The voter's ballot on the given poll, if any, read within a session.
    pub async fn find_for_voter_with_session(
        ballots: &Coll<Ballot>,
        voter_id: UserId,
        poll_id: PollId,
        session: &mut ClientSession,
    ) -> Result<Option<Self>, DbError> {
        ballots
            .find_one_with_session(
                Self::voter_filter(voter_id, poll_id),
                FindOneOptions::default(),
                session,
            )
            .await
    }

    /// The ballots on a poll cast by any of the given voters, in one query.
    pub async fn find_for_voters(
        ballots: &Coll<Ballot>,
        poll_id: PollId,
        voter_ids: &[UserId],
    ) -> Result<Vec<Self>, DbError> {
        let filter = doc! {
            "poll_id": poll_id,
            "voter_id": { "$in": voter_ids.to_vec() },
        };
        ballots.find(filter, None).await?.try_collect().await
    }
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
