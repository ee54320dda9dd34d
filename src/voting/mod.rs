//! Vote recording and aggregation.
//!
//! Votes are written only through [`submit_vote`], which appends a ballot to
//! the ledger and increments the chosen option's counter in one transaction.
//! Everything else here is read-only.

use thiserror::Error;

use crate::model::api::error::{ErrorCategory, Problem};

mod audit;
mod results;
mod status;
mod submit;

pub use audit::{audit_all, audit_poll, OptionAudit, PollAudit};
pub use results::{percentage, poll_results};
pub use status::{vote_status, voted_options};
pub use submit::{submit_vote, VoteSubmission};

/// Business reasons a vote is refused. None of these are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("You have already voted on this poll.")]
    DuplicateVote,
    #[error("The requested poll does not exist.")]
    PollNotFound,
    #[error("The requested option does not exist.")]
    OptionNotFound,
    #[error("The selected option does not belong to this poll.")]
    OptionNotInPoll,
    #[error("The voter does not exist.")]
    VoterNotFound,
}

impl Problem for VoteError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateVote => ErrorCategory::Conflict,
            Self::PollNotFound | Self::OptionNotFound | Self::VoterNotFound => {
                ErrorCategory::NotFound
            }
            Self::OptionNotInPoll => ErrorCategory::InvalidInput,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::DuplicateVote => "Duplicate Vote",
            Self::PollNotFound => "Poll Not Found",
            Self::OptionNotFound => "Option Not Found",
            Self::OptionNotInPoll => "Invalid Option",
            Self::VoterNotFound => "Voter Not Found",
        }
    }
}
