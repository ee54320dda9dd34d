use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    error::Error as DbError,
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CommentId, CommentOrder, PollId, UserId},
    mongodb::Coll,
};

/// Core comment data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCore {
    pub poll_id: PollId,
    pub author_id: UserId,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A comment from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    #[serde(flatten)]
    pub comment: CommentCore,
}

impl Comment {
    /// A comment written now.
    pub fn new(id: CommentId, poll_id: PollId, author_id: UserId, content: String) -> Self {
        Self {
            id,
            comment: CommentCore {
                poll_id,
                author_id,
                content,
                created_at: Utc::now(),
            },
        }
    }

    /// Every comment on a poll. Comments written in the same millisecond are
    /// ordered by ID.
    pub async fn for_poll(
        comments: &Coll<Comment>,
        poll_id: PollId,
        order: CommentOrder,
    ) -> Result<Vec<Self>, DbError> {
        let direction = match order {
            CommentOrder::NewestFirst => -1,
            CommentOrder::OldestFirst => 1,
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": direction, "_id": direction })
            .build();
        comments
            .find(doc! { "poll_id": poll_id }, options)
            .await?
            .try_collect()
            .await
    }
}

impl Deref for Comment {
    type Target = CommentCore;

    fn deref(&self) -> &Self::Target {
        &self.comment
    }
}
