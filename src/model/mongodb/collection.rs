use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    ballot::Ballot, comment::Comment, option::PollOption, poll::Poll, user::User,
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}

// Poll collections
const POLLS: &str = "polls";
impl MongoCollection for Poll {
    const NAME: &'static str = POLLS;
}

// Option collections: the aggregate store
const OPTIONS: &str = "options";
impl MongoCollection for PollOption {
    const NAME: &'static str = OPTIONS;
}

// Ballot collections: the ledger
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}

// Comment collections
const COMMENTS: &str = "comments";
impl MongoCollection for Comment {
    const NAME: &'static str = COMMENTS;
}

// Counter collection
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Poll collection: public listing, newest first.
    let poll_index = IndexModel::builder()
        .keys(doc! {"is_public": 1, "created_at": -1})
        .build();
    Coll::<Poll>::from_db(db)
        .create_index(poll_index, None)
        .await?;

    // Option collection: display order is unique within a poll.
    let option_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "order": 1})
        .options(unique.clone())
        .build();
    Coll::<PollOption>::from_db(db)
        .create_index(option_index, None)
        .await?;

    // Ballot collection: at most one ballot per voter per poll. This index is
    // the duplicate-vote guard; nothing else enforces it.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "poll_id": 1})
        .options(unique)
        .build();
    let ballot_option_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "option_id": 1})
        .build();
    Coll::<Ballot>::from_db(db)
        .create_indexes([ballot_index, ballot_option_index], None)
        .await?;

    // Comment collection: listed per poll by age.
    let comment_index = IndexModel::builder()
        .keys(doc! {"poll_id": 1, "created_at": -1})
        .build();
    Coll::<Comment>::from_db(db)
        .create_index(comment_index, None)
        .await?;

    Ok(())
}
