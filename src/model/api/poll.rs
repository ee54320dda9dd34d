use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    api::error::{ErrorCategory, Problem},
    common::{OptionId, OptionOrder, PollId, UserId},
    db::{
        option::{total_votes, PollOption},
        poll::{Poll, PollCore},
    },
};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MIN_OPTIONS: usize = 2;

/// Reasons a new poll is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Poll title cannot be empty.")]
    BlankTitle,
    #[error("Poll title must not exceed {} characters.", MAX_TITLE_LENGTH)]
    TitleTooLong,
    #[error("A poll must have at least {} options.", MIN_OPTIONS)]
    InsufficientOptions,
    #[error("Option text is required.")]
    BlankOption,
    #[error("Option orders must be unique within a poll.")]
    DuplicateOptionOrder,
}

impl Problem for PollError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }

    fn title(&self) -> &'static str {
        match self {
            Self::BlankTitle | Self::TitleTooLong => "Invalid Poll Title",
            Self::InsufficientOptions => "Insufficient Options",
            Self::BlankOption | Self::DuplicateOptionOrder => "Invalid Option",
        }
    }
}

/// A poll as submitted by its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub title: String,
    pub is_public: bool,
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptionRequest {
    pub option_text: String,
    pub option_order: OptionOrder,
}

impl CreatePollRequest {
    /// Reject polls that could never be voted on sensibly.
    pub fn validate(&self) -> Result<(), PollError> {
        if self.title.trim().is_empty() {
            return Err(PollError::BlankTitle);
        }
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(PollError::TitleTooLong);
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(PollError::InsufficientOptions);
        }
        if self.options.iter().any(|o| o.option_text.trim().is_empty()) {
            return Err(PollError::BlankOption);
        }
        let mut orders = HashSet::with_capacity(self.options.len());
        if !self.options.iter().all(|o| orders.insert(o.option_order)) {
            return Err(PollError::DuplicateOptionOrder);
        }
        Ok(())
    }

    /// Split into the database documents, given freshly reserved IDs.
    pub fn into_documents(
        self,
        poll_id: PollId,
        option_ids: impl IntoIterator<Item = OptionId>,
        creator_id: UserId,
    ) -> (Poll, Vec<PollOption>) {
        let poll = Poll {
            id: poll_id,
            poll: PollCore {
                title: self.title.trim().to_string(),
                is_public: self.is_public,
                creator_id,
                created_at: Utc::now(),
            },
        };
        let options = option_ids
            .into_iter()
            .zip(self.options)
            .map(|(id, option)| {
                PollOption::new(id, poll_id, option.option_text, option.option_order)
            })
            .collect();
        (poll, options)
    }
}

/// An option as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDescription {
    pub option_id: OptionId,
    pub option_text: String,
    pub option_order: OptionOrder,
    pub vote_count: u32,
}

impl From<PollOption> for OptionDescription {
    fn from(option: PollOption) -> Self {
        Self {
            option_id: option.id,
            option_text: option.text,
            option_order: option.order,
            vote_count: option.vote_count,
        }
    }
}

/// A poll with its options, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDescription {
    pub poll_id: PollId,
    pub title: String,
    pub is_public: bool,
    pub options: Vec<OptionDescription>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Sum of the option counters.
    pub total_votes: u64,
}

impl PollDescription {
    /// Describe a poll; `options` must be in display order.
    pub fn new(poll: Poll, options: Vec<PollOption>) -> Self {
        let total_votes = total_votes(&options);
        Self {
            poll_id: poll.id,
            title: poll.poll.title,
            is_public: poll.poll.is_public,
            options: options.into_iter().map(Into::into).collect(),
            creator_id: poll.poll.creator_id,
            created_at: poll.poll.created_at,
            total_votes,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CreatePollRequest {
        pub fn example() -> Self {
            Self {
                title: "Favourite programming language?".to_string(),
                is_public: true,
                options: vec![
                    CreateOptionRequest {
                        option_text: "Rust".to_string(),
                        option_order: 1,
                    },
                    CreateOptionRequest {
                        option_text: "Java".to_string(),
                        option_order: 2,
                    },
                ],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_is_valid() {
        CreatePollRequest::example().validate().unwrap();
    }

    #[test]
    fn invalid_polls() {
        let mut blank_title = CreatePollRequest::example();
        blank_title.title = "   ".to_string();

        let mut long_title = CreatePollRequest::example();
        long_title.title = "x".repeat(MAX_TITLE_LENGTH + 1);

        let mut one_option = CreatePollRequest::example();
        one_option.options.pop();

        let mut blank_option = CreatePollRequest::example();
        blank_option.options[1].option_text = String::new();

        let mut same_order = CreatePollRequest::example();
        same_order.options[1].option_order = 1;

        let cases = [
            (blank_title, PollError::BlankTitle),
            (long_title, PollError::TitleTooLong),
            (one_option, PollError::InsufficientOptions),
            (blank_option, PollError::BlankOption),
            (same_order, PollError::DuplicateOptionOrder),
        ];
        for (request, expected) in cases {
            let err = request.validate().unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(err.category(), ErrorCategory::InvalidInput);
        }
    }

    #[test]
    fn poll_errors_have_stable_titles() {
        assert_eq!(PollError::BlankTitle.title(), "Invalid Poll Title");
        assert_eq!(PollError::InsufficientOptions.title(), "Insufficient Options");
        assert_eq!(
            PollError::InsufficientOptions.to_string(),
            "A poll must have at least 2 options."
        );
    }

    #[test]
    fn title_at_limit_is_valid() {
        let mut request = CreatePollRequest::example();
        request.title = "x".repeat(MAX_TITLE_LENGTH);
        request.validate().unwrap();
    }

    #[test]
    fn documents_get_the_reserved_ids() {
        let (poll, options) = CreatePollRequest::example().into_documents(4, 10..=11, 2);
        assert_eq!(poll.id, 4);
        assert_eq!(poll.creator_id, 2);
        let ids: Vec<_> = options.iter().map(|o| (o.id, o.poll_id, o.vote_count)).collect();
        assert_eq!(ids, vec![(10, 4, 0), (11, 4, 0)]);
        assert_eq!(options[0].text, "Rust");
    }

    #[test]
    fn description_totals_counters() {
        let (poll, mut options) = CreatePollRequest::example().into_documents(1, 1..=2, 1);
        options[0].vote_count = 3;
        options[1].vote_count = 2;
        let desc = PollDescription::new(poll, options);
        assert_eq!(desc.total_votes, 5);
        assert_eq!(desc.options[1].option_text, "Java");
    }
}
