use mongodb::{options::SessionOptions, Client};

use crate::error::Result;
use crate::model::{
    api::vote::{OptionResult, PollResults},
    common::PollId,
    db::{
        option::{total_votes, PollOption},
        poll::Poll,
    },
    mongodb::{u32_id_filter, Coll},
};

use super::VoteError;

/// Share of `total` held by `count`, in percent rounded to 2 decimal places.
/// Zero when nobody has voted.
pub fn percentage(count: u32, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let exact = f64::from(count) * 100.0 / total as f64;
    (exact * 100.0).round() / 100.0
}

/// Current results of a poll, computed from the option counters.
///
/// The poll and its options are read from one snapshot, so the total always
/// equals the sum of the counts shown.
pub async fn poll_results(
    db_client: &Client,
    polls: &Coll<Poll>,
    options: &Coll<PollOption>,
    poll_id: PollId,
) -> Result<PollResults> {
    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let poll = polls
        .find_one_with_session(u32_id_filter(poll_id), None, &mut session)
        .await?
        .ok_or(VoteError::PollNotFound)?;
    let poll_options = PollOption::for_poll_with_session(options, poll_id, &mut session).await?;

    Ok(tally(&poll, poll_options))
}

/// Build results from a poll's options, which must be in display order.
fn tally(poll: &Poll, options: Vec<PollOption>) -> PollResults {
    let total = total_votes(&options);
    let options = options
        .into_iter()
        .map(|option| OptionResult {
            option_id: option.id,
            percentage: percentage(option.vote_count, total),
            vote_count: option.vote_count,
            option_text: option.text,
        })
        .collect();
    PollResults {
        poll_id: poll.id,
        title: poll.title.clone(),
        total_votes: total,
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn option(id: u32, order: i32, votes: u32) -> PollOption {
        let mut option = PollOption::new(id, 1, format!("Option {id}"), order);
        option.vote_count = votes;
        option
    }

    #[test]
    fn three_to_one() {
        let results = tally(&Poll::example(1, 1), vec![option(1, 1, 3), option(2, 2, 1)]);
        assert_eq!(results.total_votes, 4);
        assert_eq!(results.options[0].percentage, 75.0);
        assert_eq!(results.options[1].percentage, 25.0);
    }

    #[test]
    fn no_votes_is_all_zero() {
        let results = tally(&Poll::example(1, 1), vec![option(1, 1, 0), option(2, 2, 0)]);
        assert_eq!(results.total_votes, 0);
        for option in results.options {
            assert_eq!(option.vote_count, 0);
            assert_eq!(option.percentage, 0.0);
        }
    }

    #[test]
    fn percentages_are_rounded() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 14), 35.71);
        assert_eq!(percentage(0, 7), 0.0);
        assert_eq!(percentage(7, 7), 100.0);
    }

    #[test]
    fn options_keep_their_order_and_text() {
        let results = tally(&Poll::example(9, 1), vec![option(4, 1, 1), option(2, 2, 1)]);
        assert_eq!(results.poll_id, 9);
        let ids: Vec<_> = results.options.iter().map(|o| o.option_id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(results.options[0].option_text, "Option 4");
    }

    #[backend_test]
    async fn results_from_counters(polls: Coll<Poll>, options: Coll<PollOption>) {
        let db_client = crate::db_client().await;
        polls.insert_one(Poll::example(1, 1), None).await.unwrap();
        options
            .insert_many([option(2, 2, 1), option(1, 1, 3)], None)
            .await
            .unwrap();

        let results = poll_results(&db_client, &polls, &options, 1).await.unwrap();
        assert_eq!(results.total_votes, 4);
        assert_eq!(results.options[0].option_id, 1);
        assert_eq!(results.options[0].percentage, 75.0);
        assert_eq!(results.options[1].percentage, 25.0);
    }

    #[backend_test]
    async fn results_for_unknown_poll(polls: Coll<Poll>, options: Coll<PollOption>) {
        let db_client = crate::db_client().await;
        let err = poll_results(&db_client, &polls, &options, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Vote(VoteError::PollNotFound)));
    }
}
