use chrono::{DateTime, Utc};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    api::error::{ErrorCategory, Problem},
    common::{CommentId, CommentOrder, OptionId, PollId, UserId},
    db::comment::Comment,
};

/// Reasons a comment is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("Comment content cannot be empty.")]
    BlankContent,
}

impl Problem for CommentError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }

    fn title(&self) -> &'static str {
        match self {
            Self::BlankContent => "Invalid Comment Content",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), CommentError> {
        if self.content.trim().is_empty() {
            return Err(CommentError::BlankContent);
        }
        Ok(())
    }

    /// The stored comment, with surrounding whitespace removed.
    pub fn into_comment(self, id: CommentId, poll_id: PollId, author_id: UserId) -> Comment {
        Comment::new(id, poll_id, author_id, self.content.trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentResponse {
    pub comment_id: CommentId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CreateCommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            comment_id: comment.id,
            author_id: comment.comment.author_id,
            content: comment.comment.content,
            created_at: comment.comment.created_at,
        }
    }
}

/// A comment as listed, with the option its author voted for, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDescription {
    pub comment_id: CommentId,
    pub author_id: UserId,
    pub author_username: String,
    pub content: String,
    pub voted_option_id: Option<OptionId>,
    pub created_at: DateTime<Utc>,
}

impl CommentDescription {
    pub fn new(
        comment: Comment,
        author_username: String,
        voted_option_id: Option<OptionId>,
    ) -> Self {
        Self {
            comment_id: comment.id,
            author_id: comment.comment.author_id,
            author_username,
            content: comment.comment.content,
            voted_option_id,
            created_at: comment.comment.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentList {
    pub comments: Vec<CommentDescription>,
}

impl CommentOrder {
    /// `oldest` (any case) lists oldest first; anything else newest first.
    pub fn from_query(sort_by: Option<&str>) -> Self {
        match sort_by {
            Some(value) if value.eq_ignore_ascii_case("oldest") => Self::OldestFirst,
            _ => Self::NewestFirst,
        }
    }
}

/// Read from the `sortBy` query parameter.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for CommentOrder {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let sort_by = req.query_value::<&str>("sortBy").and_then(Result::ok);
        request::Outcome::Success(Self::from_query(sort_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_comments_are_rejected() {
        for content in ["", "   ", "\n\t"] {
            let request = CreateCommentRequest {
                content: content.to_string(),
            };
            assert_eq!(request.validate(), Err(CommentError::BlankContent));
        }
    }

    #[test]
    fn comments_are_trimmed() {
        let request = CreateCommentRequest {
            content: "  Great poll!  ".to_string(),
        };
        request.validate().unwrap();
        let comment = request.into_comment(3, 1, 2);
        assert_eq!(comment.content, "Great poll!");
        assert_eq!((comment.id, comment.poll_id, comment.author_id), (3, 1, 2));
    }

    #[test]
    fn sort_order_defaults_to_newest() {
        assert_eq!(CommentOrder::from_query(None), CommentOrder::NewestFirst);
        assert_eq!(CommentOrder::from_query(Some("newest")), CommentOrder::NewestFirst);
        assert_eq!(CommentOrder::from_query(Some("sideways")), CommentOrder::NewestFirst);
        assert_eq!(CommentOrder::from_query(Some("OLDEST")), CommentOrder::OldestFirst);
    }
}
