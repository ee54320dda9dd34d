use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            comment::{CommentDescription, CommentList, CreateCommentRequest, CreateCommentResponse},
        },
        common::{CommentOrder, PollId, UserId},
        db::{ballot::Ballot, comment::Comment, poll::Poll, user::User},
        mongodb::{u32_id_filter, Coll, Counter, COMMENT_ID_COUNTER},
    },
    voting::{self, VoteError},
};

pub fn routes() -> Vec<Route> {
    routes![create_comment, poll_comments]
}

async fn ensure_poll_exists(polls: &Coll<Poll>, poll_id: PollId) -> Result<()> {
    if polls.count_documents(u32_id_filter(poll_id), None).await? == 0 {
        return Err(VoteError::PollNotFound.into());
    }
    Ok(())
}

#[post("/polls/<poll_id>/comments", data = "<request>", format = "json")]
async fn create_comment(
    token: AuthToken,
    poll_id: PollId,
    request: Json<CreateCommentRequest>,
    polls: Coll<Poll>,
    comments: Coll<Comment>,
    counters: Coll<Counter>,
) -> Result<Json<CreateCommentResponse>> {
    let request = request.into_inner();
    request.validate()?;
    ensure_poll_exists(&polls, poll_id).await?;

    let id = Counter::next(&counters, COMMENT_ID_COUNTER).await?;
    let comment = request.into_comment(id, poll_id, token.user_id);
    comments.insert_one(&comment, None).await?;
    info!("User {} commented on poll {poll_id}", token.user_id);

    Ok(Json(comment.into()))
}

#[get("/polls/<poll_id>/comments")]
async fn poll_comments(
    poll_id: PollId,
    order: CommentOrder,
    polls: Coll<Poll>,
    comments: Coll<Comment>,
    users: Coll<User>,
    ballots: Coll<Ballot>,
) -> Result<Json<CommentList>> {
    ensure_poll_exists(&polls, poll_id).await?;
    let found = Comment::for_poll(&comments, poll_id, order).await?;

    // One lookup each for names and ledger choices, however many comments.
    let mut authors: Vec<UserId> = found.iter().map(|comment| comment.author_id).collect();
    authors.sort_unstable();
    authors.dedup();
    let usernames = User::usernames(&users, &authors).await?;
    let choices = voting::voted_options(&ballots, poll_id, &authors).await?;

    let comments = found
        .into_iter()
        .map(|comment| {
            let username = usernames
                .get(&comment.author_id)
                .cloned()
                .unwrap_or_default();
            let voted = choices.get(&comment.author_id).copied();
            CommentDescription::new(comment, username, voted)
        })
        .collect();
    Ok(Json(CommentList { comments }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use super::*;
    use crate::api::tests::bearer;
    use crate::model::{api::error::ErrorResponse, db::option::PollOption};
    use crate::voting::VoteSubmission;

    async fn comment<'a>(
        client: &'a Client,
        author_id: UserId,
        poll_id: PollId,
        content: &str,
    ) -> rocket::local::asynchronous::LocalResponse<'a> {
        client
            .post(uri!(create_comment(poll_id)))
            .header(ContentType::JSON)
            .header(bearer(client, author_id))
            .body(json!({ "content": content }).to_string())
            .dispatch()
            .await
    }

    async fn list(client: &Client, query: &str) -> CommentList {
        let response = client.get(format!("/polls/1/comments{query}")).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test(users = 2)]
    async fn comments_show_their_authors_votes(
        client: Client,
        db: Database,
        polls: Coll<Poll>,
        options: Coll<PollOption>,
    ) {
        polls.insert_one(Poll::example(1, 1), None).await.unwrap();
        options
            .insert_many(
                [
                    PollOption::new(1, 1, "Rust".into(), 1),
                    PollOption::new(2, 1, "Java".into(), 2),
                ],
                None,
            )
            .await
            .unwrap();
        let submission = VoteSubmission {
            voter_id: 1,
            poll_id: 1,
            option_id: 2,
        };
        voting::submit_vote(&crate::db_client().await, &db, submission, Duration::from_secs(5))
            .await
            .unwrap();

        let response = comment(&client, 1, 1, "  Java, obviously.  ").await;
        assert_eq!(Status::Ok, response.status());
        let created: CreateCommentResponse = response.into_json().await.unwrap();
        assert_eq!(created.author_id, 1);
        assert_eq!(created.content, "Java, obviously.");
        assert_eq!(Status::Ok, comment(&client, 2, 1, "Undecided").await.status());

        let newest = list(&client, "").await.comments;
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].content, "Undecided");
        assert_eq!(newest[0].author_username, "voter2");
        assert_eq!(newest[0].voted_option_id, None);
        assert_eq!(newest[1].comment_id, created.comment_id);
        assert_eq!(newest[1].author_username, "voter1");
        assert_eq!(newest[1].voted_option_id, Some(2));

        let oldest = list(&client, "?sortBy=oldest").await.comments;
        let ids: Vec<_> = oldest.iter().map(|c| c.comment_id).collect();
        let mut expected: Vec<_> = newest.iter().map(|c| c.comment_id).collect();
        expected.reverse();
        assert_eq!(ids, expected);
    }

    #[backend_test(users = 1)]
    async fn comment_errors(client: Client, polls: Coll<Poll>, comments: Coll<Comment>) {
        polls.insert_one(Poll::example(1, 1), None).await.unwrap();

        let response = comment(&client, 1, 1, "   ").await;
        assert_eq!(Status::BadRequest, response.status());
        let error: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(error.title, "Invalid Comment Content");

        let response = comment(&client, 1, 9, "Hello").await;
        assert_eq!(Status::NotFound, response.status());
        let response = client.get(uri!(poll_comments(9))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .post(uri!(create_comment(1)))
            .header(ContentType::JSON)
            .body(json!({ "content": "Anonymous" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        assert_eq!(comments.count_documents(None, None).await.unwrap(), 0);
    }
}
