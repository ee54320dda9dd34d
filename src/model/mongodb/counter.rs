use std::ops::RangeInclusive;

use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter issuing user IDs.
pub const USER_ID_COUNTER: &str = "user_id";
/// Counter issuing poll IDs.
pub const POLL_ID_COUNTER: &str = "poll_id";
/// Counter issuing option IDs.
pub const OPTION_ID_COUNTER: &str = "option_id";
/// Counter issuing comment IDs.
pub const COMMENT_ID_COUNTER: &str = "comment_id";

/// A counter object used to implement auto-increment fields.
/// `last` is the most recently issued value; the first value issued is 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub last: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the named counter.
    pub async fn next(counters: &Coll<Counter>, name: &str) -> Result<u32> {
        Ok(*Self::reserve(counters, name, 1).await?.start())
    }

    /// Atomically reserve `count` consecutive values of the named counter.
    /// The counter is created on first use. Values are never handed out
    /// twice, though a reservation whose user later fails leaves a gap.
    pub async fn reserve(
        counters: &Coll<Counter>,
        name: &str,
        count: u32,
    ) -> Result<RangeInclusive<u32>> {
        if count == 0 {
            return Err(Error::Status(
                rocket::http::Status::InternalServerError,
                format!("Cannot reserve zero values from counter {name}"),
            ));
        }
        let update = doc! {
            "$inc": { "last": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": name }, update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Counter {name}")))?;
        Ok(counter.last - count + 1..=counter.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[backend_test]
    async fn counter_increment(counters: Coll<Counter>) {
        // The first value of a fresh counter is 1.
        let first = Counter::next(&counters, POLL_ID_COUNTER).await.unwrap();
        assert_eq!(first, 1);
        let second = Counter::next(&counters, POLL_ID_COUNTER).await.unwrap();
        assert_eq!(second, 2);

        // Counters are independent.
        let other = Counter::next(&counters, USER_ID_COUNTER).await.unwrap();
        assert_eq!(other, 1);

        // Check the counter was persisted.
        let counter = counters
            .find_one(doc! { "_id": POLL_ID_COUNTER }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.last, 2);
    }

    #[backend_test]
    async fn counter_reserve_range(counters: Coll<Counter>) {
        let first = Counter::reserve(&counters, OPTION_ID_COUNTER, 3).await.unwrap();
        assert_eq!(first, 1..=3);
        let second = Counter::reserve(&counters, OPTION_ID_COUNTER, 2).await.unwrap();
        assert_eq!(second, 4..=5);
    }
}
