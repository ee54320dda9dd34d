use mongodb::{Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            vote::{PollResults, Receipt, VoteRequest, VoteStatus},
        },
        common::PollId,
        db::{ballot::Ballot, option::PollOption, poll::Poll},
        mongodb::Coll,
    },
    voting::{self, VoteSubmission},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![submit_vote, vote_status, poll_results]
}

#[post("/polls/<poll_id>/vote", data = "<vote>", format = "json")]
async fn submit_vote(
    token: AuthToken,
    poll_id: PollId,
    vote: Json<VoteRequest>,
    db_client: &State<Client>,
    db: &State<Database>,
    config: &State<Config>,
) -> Result<Json<Receipt>> {
    let submission = VoteSubmission {
        voter_id: token.user_id,
        poll_id,
        option_id: vote.option_id,
    };
    let receipt =
        voting::submit_vote(db_client, db, submission, config.vote_commit_timeout()).await?;
    Ok(Json(receipt))
}

#[get("/polls/<poll_id>/voted")]
async fn vote_status(
    token: AuthToken,
    poll_id: PollId,
    polls: Coll<Poll>,
    ballots: Coll<Ballot>,
) -> Result<Json<VoteStatus>> {
    let status = voting::vote_status(&polls, &ballots, token.user_id, poll_id).await?;
    Ok(Json(status))
}

#[get("/polls/<poll_id>/results")]
async fn poll_results(
    poll_id: PollId,
    polls: Coll<Poll>,
    options: Coll<PollOption>,
    db_client: &State<Client>,
) -> Result<Json<PollResults>> {
    let results = voting::poll_results(db_client, &polls, &options, poll_id).await?;
    Ok(Json(results))
}
