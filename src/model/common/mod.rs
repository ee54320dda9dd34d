//! Types shared between the DB and API representations.

/// Our user (voter, poll creator) IDs are integers.
pub type UserId = u32;
/// Our poll IDs are integers.
pub type PollId = u32;
/// Our option IDs are integers, unique across all polls.
pub type OptionId = u32;
/// Our comment IDs are integers.
pub type CommentId = u32;
/// Display position of an option within its poll.
pub type OptionOrder = i32;

/// Order in which a poll's comments are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}
