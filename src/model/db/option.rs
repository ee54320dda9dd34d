//! The option aggregate store: each option document carries the running vote
//! count for that option, which only ever changes through [`PollOption::increment_with_session`].

use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneOptions, FindOptions},
    ClientSession,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{OptionId, OptionOrder, PollId},
    mongodb::{u32_id_filter, Coll},
};

/// A poll option from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "_id")]
    pub id: OptionId,
    pub poll_id: PollId,
    pub text: String,
    pub order: OptionOrder,
    /// Derived from the ballot ledger; never set directly after creation.
    pub vote_count: u32,
}

impl PollOption {
    /// A new option with no votes.
    pub fn new(id: OptionId, poll_id: PollId, text: String, order: OptionOrder) -> Self {
        Self {
            id,
            poll_id,
            text,
            order,
            vote_count: 0,
        }
    }

    fn display_order() -> FindOptions {
        FindOptions::builder().sort(doc! { "order": 1 }).build()
    }

    /// All options of a poll, in display order.
    pub async fn for_poll(
        options: &Coll<PollOption>,
        poll_id: PollId,
    ) -> Result<Vec<Self>, DbError> {
        options
            .find(doc! { "poll_id": poll_id }, Self::display_order())
            .await?
            .try_collect()
            .await
    }

    /// All options of a poll, in display order, read within a session.
    pub async fn for_poll_with_session(
        options: &Coll<PollOption>,
        poll_id: PollId,
        session: &mut ClientSession,
    ) -> Result<Vec<Self>, DbError> {
        let mut cursor = options
            .find_with_session(doc! { "poll_id": poll_id }, Self::display_order(), session)
            .await?;
        let mut found = Vec::new();
        while let Some(option) = cursor.next(session).await {
            found.push(option?);
        }
        Ok(found)
    }

    /// Look up a single option within a session.
    pub async fn find_with_session(
        options: &Coll<PollOption>,
        id: OptionId,
        session: &mut ClientSession,
    ) -> Result<Option<Self>, DbError> {
        options
            .find_one_with_session(u32_id_filter(id), FindOneOptions::default(), session)
            .await
    }

    /// Add one vote to the option's counter as a single server-side `$inc`,
    /// so concurrent increments never lose an update. The option must belong
    /// to `poll_id`. Returns whether the option was found.
    pub async fn increment_with_session(
        options: &Coll<PollOption>,
        id: OptionId,
        poll_id: PollId,
        session: &mut ClientSession,
    ) -> Result<bool, DbError> {
        let filter = doc! {
            "_id": id,
            "poll_id": poll_id,
        };
        let update = doc! {
            "$inc": { "vote_count": 1 }
        };
        let result = options
            .update_one_with_session(filter, update, None, session)
            .await?;
        Ok(result.matched_count == 1)
    }
}

/// Total votes across a poll's options, summed from the counters.
pub fn total_votes(options: &[PollOption]) -> u64 {
    options.iter().map(|o| u64::from(o.vote_count)).sum()
}
