use std::time::Duration;

use mongodb::{options::CountOptions, Client, ClientSession, Database};

use crate::error::{Error, Result};
use crate::model::{
    api::vote::Receipt,
    common::{OptionId, PollId, UserId},
    db::{ballot::Ballot, option::PollOption, poll::Poll, user::User},
    mongodb::{
        run_transaction, transaction_options, u32_id_filter, Abort, Coll, TransactionBody,
    },
};

use super::VoteError;

/// One voter's choice on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSubmission {
    pub voter_id: UserId,
    pub poll_id: PollId,
    pub option_id: OptionId,
}

/// Record a vote: append a ballot to the ledger and add one to the chosen
/// option's counter, atomically.
///
/// Exactly one of any number of concurrent submissions by the same voter on
/// the same poll succeeds; the rest fail with [`VoteError::DuplicateVote`].
/// This is guaranteed by the unique ledger index, not by the pre-checks below,
/// which only decide which error is reported. A commit that cannot finish
/// within `max_commit_time` leaves no trace.
pub async fn submit_vote(
    db_client: &Client,
    db: &Database,
    submission: VoteSubmission,
    max_commit_time: Duration,
) -> Result<Receipt> {
    let VoteSubmission {
        voter_id,
        poll_id,
        option_id,
    } = submission;
    info!("Vote submission attempt - voter {voter_id}, poll {poll_id}, option {option_id}");

    let cast = CastBallot {
        submission,
        users: Coll::from_db(db),
        polls: Coll::from_db(db),
        options: Coll::from_db(db),
        ballots: Coll::from_db(db),
    };
    let options = transaction_options(max_commit_time);
    match run_transaction(db_client, options, &cast).await {
        Ok(ballot) => {
            info!("Vote recorded - voter {voter_id}, poll {poll_id}, option {option_id}");
            Ok(ballot.into())
        }
        Err(Abort::Rejected(reason)) => {
            warn!(
                "Vote rejected - voter {voter_id}, poll {poll_id}, option {option_id}: {reason:?}"
            );
            Err(reason.into())
        }
        Err(Abort::Db(e)) => {
            error!("Vote failed - voter {voter_id}, poll {poll_id}, option {option_id}: {e}");
            Err(Error::Db(e))
        }
    }
}

/// The unit of work behind [`submit_vote`].
struct CastBallot {
    submission: VoteSubmission,
    users: Coll<User>,
    polls: Coll<Poll>,
    options: Coll<PollOption>,
    ballots: Coll<Ballot>,
}

impl CastBallot {
    async fn exists<T>(
        coll: &Coll<T>,
        id: u32,
        session: &mut ClientSession,
    ) -> std::result::Result<bool, mongodb::error::Error>
    where
        T: Send + Sync,
    {
        let options = CountOptions::builder().limit(1).build();
        let count = coll
            .count_documents_with_session(u32_id_filter(id), options, session)
            .await?;
        Ok(count > 0)
    }
}

#[rocket::async_trait]
impl TransactionBody for CastBallot {
    type Output = Ballot;
    type Rejection = VoteError;

    async fn run(
        &self,
        session: &mut ClientSession,
    ) -> std::result::Result<Ballot, Abort<VoteError>> {
        let VoteSubmission {
            voter_id,
            poll_id,
            option_id,
        } = self.submission;

        // Report an existing vote first. A retry of a submission that
        // committed but timed out on the caller's side ends up here.
        if Ballot::find_for_voter_with_session(&self.ballots, voter_id, poll_id, session)
            .await?
            .is_some()
        {
            return Err(Abort::Rejected(VoteError::DuplicateVote));
        }

        if !Self::exists(&self.polls, poll_id, session).await? {
            return Err(Abort::Rejected(VoteError::PollNotFound));
        }

        let option = PollOption::find_with_session(&self.options, option_id, session)
            .await?
            .ok_or(Abort::Rejected(VoteError::OptionNotFound))?;
        if option.poll_id != poll_id {
            return Err(Abort::Rejected(VoteError::OptionNotInPoll));
        }

        if !Self::exists(&self.users, voter_id, session).await? {
            return Err(Abort::Rejected(VoteError::VoterNotFound));
        }

        // The authoritative duplicate guard.
        let ballot = Ballot::new(voter_id, poll_id, option_id);
        if !ballot.insert_with_session(&self.ballots, session).await? {
            return Err(Abort::Rejected(VoteError::DuplicateVote));
        }

        // Aborting here also discards the ballot above.
        let counted =
            PollOption::increment_with_session(&self.options, option_id, poll_id, session).await?;
        if !counted {
            return Err(Abort::Rejected(VoteError::OptionNotFound));
        }

        Ok(ballot)
    }
}
