//! Cross-checks of the option counters against the ballot ledger.
//!
//! Every committed vote adds one ballot and one counter increment together,
//! so for every option the two must agree. A disagreement means data was
//! changed outside [`submit_vote`](super::submit_vote).

use std::collections::HashMap;

use mongodb::{
    bson::{doc, from_document},
    options::SessionOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{OptionId, PollId},
    db::{ballot::Ballot, option::PollOption, poll::Poll},
    mongodb::{u32_id_filter, Coll},
};

use super::VoteError;

/// Counter and ledger totals for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionAudit {
    pub option_id: OptionId,
    pub option_text: String,
    /// The option's running vote count.
    pub counter: u32,
    /// Ballots in the ledger for the option.
    pub ballots: u64,
}

impl OptionAudit {
    pub fn is_consistent(&self) -> bool {
        u64::from(self.counter) == self.ballots
    }
}

/// Audit of a whole poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollAudit {
    pub poll_id: PollId,
    pub title: String,
    pub options: Vec<OptionAudit>,
    /// Ballots for this poll naming an option that is not part of it.
    pub stray_ballots: u64,
}

impl PollAudit {
    pub fn is_consistent(&self) -> bool {
        self.stray_ballots == 0 && self.options.iter().all(OptionAudit::is_consistent)
    }

    /// Options whose counter disagrees with the ledger.
    pub fn mismatches(&self) -> impl Iterator<Item = &OptionAudit> {
        self.options.iter().filter(|o| !o.is_consistent())
    }

    fn new(poll: Poll, options: Vec<PollOption>, mut ledger: HashMap<OptionId, u64>) -> Self {
        let options = options
            .into_iter()
            .map(|option| OptionAudit {
                ballots: ledger.remove(&option.id).unwrap_or(0),
                option_id: option.id,
                option_text: option.text,
                counter: option.vote_count,
            })
            .collect();
        Self {
            poll_id: poll.id,
            title: poll.poll.title,
            options,
            stray_ballots: ledger.into_values().sum(),
        }
    }
}

/// One row of the ledger grouped by option.
#[derive(Deserialize)]
struct LedgerCount {
    #[serde(rename = "_id")]
    option_id: OptionId,
    count: u64,
}

/// Audit a single poll from one consistent snapshot.
pub async fn audit_poll(db_client: &Client, db: &Database, poll_id: PollId) -> Result<PollAudit> {
    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let poll = Coll::<Poll>::from_db(db)
        .find_one_with_session(u32_id_filter(poll_id), None, &mut session)
        .await?
        .ok_or(VoteError::PollNotFound)?;
    audit_in_session(db, poll, &mut session).await
}

/// Audit every poll, in ID order.
pub async fn audit_all(db_client: &Client, db: &Database) -> Result<Vec<PollAudit>> {
    let polls: Vec<Poll> = Coll::<Poll>::from_db(db)
        .find(None, None)
        .await?
        .try_collect()
        .await?;

    let mut audits = Vec::with_capacity(polls.len());
    for poll in polls {
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = db_client.start_session(Some(session_options)).await?;
        audits.push(audit_in_session(db, poll, &mut session).await?);
    }
    audits.sort_unstable_by_key(|audit| audit.poll_id);
    Ok(audits)
}

async fn audit_in_session(
    db: &Database,
    poll: Poll,
    session: &mut ClientSession,
) -> Result<PollAudit> {
    let options = PollOption::for_poll_with_session(&Coll::from_db(db), poll.id, session).await?;

    let pipeline = [
        doc! { "$match": { "poll_id": poll.id } },
        doc! { "$group": { "_id": "$option_id", "count": { "$sum": 1 } } },
    ];
    let mut cursor = Coll::<Ballot>::from_db(db)
        .aggregate_with_session(pipeline, None, session)
        .await?;
    let mut ledger = HashMap::new();
    while let Some(row) = cursor.next(session).await {
        let row: LedgerCount = from_document(row?).map_err(mongodb::error::Error::from)?;
        ledger.insert(row.option_id, row.count);
    }

    let audit = PollAudit::new(poll, options, ledger);
    if !audit.is_consistent() {
        warn!("Poll {} counters disagree with the ballot ledger", audit.poll_id);
    }
    Ok(audit)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::Error;
    use crate::model::db::user::User;
    use crate::voting::{submit_vote, VoteSubmission};

    fn option(id: OptionId, order: i32, votes: u32) -> PollOption {
        let mut option = PollOption::new(id, 1, format!("Option {id}"), order);
        option.vote_count = votes;
        option
    }

    #[test]
    fn matching_counts_are_consistent() {
        let ledger = HashMap::from([(1, 2), (2, 1)]);
        let audit = PollAudit::new(
            Poll::example(1, 1),
            vec![option(1, 1, 2), option(2, 2, 1), option(3, 3, 0)],
            ledger,
        );
        assert!(audit.is_consistent());
        assert_eq!(audit.options[2].ballots, 0);
        assert_eq!(audit.mismatches().count(), 0);
    }

    #[test]
    fn drifted_counter_is_reported() {
        let ledger = HashMap::from([(1, 2)]);
        let audit = PollAudit::new(Poll::example(1, 1), vec![option(1, 1, 3)], ledger);
        assert!(!audit.is_consistent());
        let mismatched: Vec<_> = audit.mismatches().map(|o| o.option_id).collect();
        assert_eq!(mismatched, vec![1]);
    }

    #[test]
    fn stray_ballots_are_reported() {
        let ledger = HashMap::from([(1, 1), (9, 2)]);
        let audit = PollAudit::new(Poll::example(1, 1), vec![option(1, 1, 1)], ledger);
        assert_eq!(audit.stray_ballots, 2);
        assert!(!audit.is_consistent());
    }

    #[backend_test]
    async fn audit_after_voting(db: Database) {
        let db_client = crate::db_client().await;
        Coll::<Poll>::from_db(&db)
            .insert_many([Poll::example(1, 1), Poll::example(2, 1)], None)
            .await
            .unwrap();
        Coll::<PollOption>::from_db(&db)
            .insert_many(
                [
                    PollOption::new(1, 1, "A".into(), 1),
                    PollOption::new(2, 1, "B".into(), 2),
                    PollOption::new(3, 2, "C".into(), 1),
                ],
                None,
            )
            .await
            .unwrap();
        Coll::<User>::from_db(&db)
            .insert_many((1..=3).map(User::example), None)
            .await
            .unwrap();
        for (voter_id, poll_id, option_id) in [(1, 1, 1), (2, 1, 1), (3, 1, 2), (1, 2, 3)] {
            let submission = VoteSubmission {
                voter_id,
                poll_id,
                option_id,
            };
            submit_vote(&db_client, &db, submission, Duration::from_secs(5))
                .await
                .unwrap();
        }

        let audits = audit_all(&db_client, &db).await.unwrap();
        assert_eq!(audits.len(), 2);
        assert!(audits.iter().all(PollAudit::is_consistent));
        assert_eq!(audits[0].options[0].ballots, 2);
        assert_eq!(audits[0].options[1].ballots, 1);

        // Tamper with a counter behind the coordinator's back.
        Coll::<PollOption>::from_db(&db)
            .update_one(doc! { "_id": 2_u32 }, doc! { "$inc": { "vote_count": 1 } }, None)
            .await
            .unwrap();
        let audit = audit_poll(&db_client, &db, 1).await.unwrap();
        assert!(!audit.is_consistent());
        assert_eq!(audit.mismatches().next().unwrap().option_id, 2);
    }

    #[backend_test]
    async fn audit_unknown_poll(db: Database) {
        let db_client = crate::db_client().await;
        let err = audit_poll(&db_client, &db, 1).await.unwrap_err();
        assert!(matches!(err, Error::Vote(VoteError::PollNotFound)));
    }
}
