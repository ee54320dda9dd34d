use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    api::vote::VoteStatus,
    common::{OptionId, PollId, UserId},
    db::{ballot::Ballot, poll::Poll},
    mongodb::{u32_id_filter, Coll},
};

use super::VoteError;

/// Has the voter voted on the poll, and if so for which option?
///
/// Answers from the ledger, so it never disagrees with the duplicate guard.
pub async fn vote_status(
    polls: &Coll<Poll>,
    ballots: &Coll<Ballot>,
    voter_id: UserId,
    poll_id: PollId,
) -> Result<VoteStatus> {
    if polls.count_documents(u32_id_filter(poll_id), None).await? == 0 {
        return Err(VoteError::PollNotFound.into());
    }
    let ballot = Ballot::find_for_voter(ballots, voter_id, poll_id).await?;
    Ok(ballot.into())
}

/// The option each of the given voters chose on the poll, from one ledger
/// query. Voters who have not voted are absent.
pub async fn voted_options(
    ballots: &Coll<Ballot>,
    poll_id: PollId,
    voter_ids: &[UserId],
) -> Result<HashMap<UserId, OptionId>> {
    if voter_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let found = Ballot::find_for_voters(ballots, poll_id, voter_ids).await?;
    Ok(found
        .into_iter()
        .map(|ballot| (ballot.voter_id, ballot.option_id))
        .collect())
}
