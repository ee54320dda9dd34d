use std::collections::HashMap;
use std::convert::Infallible;

use mongodb::{
    bson::doc,
    options::{FindOptions, SessionOptions},
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            pagination::{Page, Pagination},
            poll::{CreatePollRequest, PollDescription},
        },
        common::PollId,
        db::{option::PollOption, poll::Poll},
        mongodb::{
            run_transaction, transaction_options, u32_id_filter, Abort, Coll, Counter,
            TransactionBody, OPTION_ID_COUNTER, POLL_ID_COUNTER,
        },
    },
    voting::VoteError,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![create_poll, get_poll, public_polls]
}

/// Inserts a poll together with all of its options.
struct InsertPoll {
    poll: Poll,
    options: Vec<PollOption>,
    polls: Coll<Poll>,
    option_coll: Coll<PollOption>,
}

#[rocket::async_trait]
impl TransactionBody for InsertPoll {
    type Output = ();
    type Rejection = Infallible;

    async fn run(&self, session: &mut ClientSession) -> std::result::Result<(), Abort<Infallible>> {
        self.polls
            .insert_one_with_session(&self.poll, None, session)
            .await?;
        self.option_coll
            .insert_many_with_session(&self.options, None, session)
            .await?;
        Ok(())
    }
}

#[post("/polls", data = "<request>", format = "json")]
async fn create_poll(
    token: AuthToken,
    request: Json<CreatePollRequest>,
    polls: Coll<Poll>,
    options: Coll<PollOption>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<Json<PollDescription>> {
    let request = request.into_inner();
    request.validate()?;

    // IDs are reserved outside the transaction; a failed insert only leaves a gap.
    let poll_id = Counter::next(&counters, POLL_ID_COUNTER).await?;
    let count = u32::try_from(request.options.len()).unwrap_or(u32::MAX);
    let option_ids = Counter::reserve(&counters, OPTION_ID_COUNTER, count).await?;
    let (poll, poll_options) = request.into_documents(poll_id, option_ids, token.user_id);

    let insert = InsertPoll {
        poll,
        options: poll_options,
        polls,
        option_coll: options,
    };
    run_transaction(
        db_client,
        transaction_options(config.vote_commit_timeout()),
        &insert,
    )
    .await?;
    info!(
        "User {} created poll {poll_id} with {} options",
        token.user_id,
        insert.options.len()
    );

    let mut poll_options = insert.options;
    poll_options.sort_by_key(|o| o.order);
    Ok(Json(PollDescription::new(insert.poll, poll_options)))
}

#[get("/polls/<poll_id>")]
async fn get_poll(
    poll_id: PollId,
    polls: Coll<Poll>,
    options: Coll<PollOption>,
    db_client: &State<Client>,
) -> Result<Json<PollDescription>> {
    // Read the poll and its counters from one snapshot.
    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let poll = polls
        .find_one_with_session(u32_id_filter(poll_id), None, &mut session)
        .await?
        .ok_or(VoteError::PollNotFound)?;
    let poll_options = PollOption::for_poll_with_session(&options, poll_id, &mut session).await?;

    Ok(Json(PollDescription::new(poll, poll_options)))
}

#[get("/polls")]
async fn public_polls(
    pagination: Pagination,
    polls: Coll<Poll>,
    options: Coll<PollOption>,
) -> Result<Json<Page<PollDescription>>> {
    let public = doc! { "is_public": true };
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .skip(pagination.skip())
        .limit(i64::try_from(pagination.size()).unwrap_or(i64::MAX))
        .build();

    let page: Vec<Poll> = polls
        .find(public.clone(), newest_first)
        .await?
        .try_collect()
        .await?;
    let total = polls.count_documents(public, None).await?;

    // Fetch the options of every poll on the page at once.
    let ids: Vec<PollId> = page.iter().map(|poll| poll.id).collect();
    let display_order = FindOptions::builder()
        .sort(doc! { "poll_id": 1, "order": 1 })
        .build();
    let mut by_poll: HashMap<PollId, Vec<PollOption>> = HashMap::with_capacity(ids.len());
    let mut cursor = options
        .find(doc! { "poll_id": { "$in": ids } }, display_order)
        .await?;
    while let Some(option) = cursor.try_next().await? {
        by_poll.entry(option.poll_id).or_default().push(option);
    }

    let descriptions = page
        .into_iter()
        .map(|poll| {
            let poll_options = by_poll.remove(&poll.id).unwrap_or_default();
            PollDescription::new(poll, poll_options)
        })
        .collect();
    Ok(Json(pagination.page_of(descriptions, total)))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use super::*;
    use crate::api::tests::bearer;
    use crate::model::api::error::ErrorResponse;

    async fn create(client: &Client, request: &CreatePollRequest) -> PollDescription {
        let response = client
            .post(uri!(create_poll))
            .header(ContentType::JSON)
            .header(bearer(client, 1))
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test(users = 1)]
    async fn create_and_fetch(client: Client, options: Coll<PollOption>) {
        let created = create(&client, &CreatePollRequest::example()).await;
        assert_eq!(created.poll_id, 1);
        assert_eq!(created.creator_id, 1);
        assert_eq!(created.total_votes, 0);
        let texts: Vec<_> = created.options.iter().map(|o| o.option_text.as_str()).collect();
        assert_eq!(texts, vec!["Rust", "Java"]);
        assert_eq!(options.count_documents(None, None).await.unwrap(), 2);

        let response = client.get(uri!(get_poll(created.poll_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let fetched: PollDescription = response.into_json().await.unwrap();
        assert_eq!(fetched.options, created.options);
        assert_eq!(fetched.title, created.title);

        // Option IDs are unique across polls.
        let second = create(&client, &CreatePollRequest::example()).await;
        assert_eq!(second.poll_id, 2);
        assert!(second
            .options
            .iter()
            .all(|o| created.options.iter().all(|c| c.option_id != o.option_id)));
    }

    #[backend_test]
    async fn create_requires_identity(client: Client, polls: Coll<Poll>) {
        let response = client
            .post(uri!(create_poll))
            .header(ContentType::JSON)
            .body(json!(CreatePollRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let error: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(error.status, 401);
        assert_eq!(polls.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(users = 1)]
    async fn create_invalid(client: Client, polls: Coll<Poll>) {
        let mut request = CreatePollRequest::example();
        request.options.truncate(1);

        let response = client
            .post(uri!(create_poll))
            .header(ContentType::JSON)
            .header(bearer(&client, 1))
            .body(json!(request).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let error: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(error.title, "Insufficient Options");
        assert_eq!(error.detail, "A poll must have at least 2 options.");
        assert_eq!(polls.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn unknown_poll(client: Client) {
        let response = client.get(uri!(get_poll(42))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let error: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(error.title, "Poll Not Found");
    }

    #[backend_test]
    async fn public_listing(client: Client, polls: Coll<Poll>, options: Coll<PollOption>) {
        // Three public polls of increasing age, and one private poll.
        let now = Utc::now();
        let mut inserted = Vec::new();
        for id in 1..=4 {
            let mut poll = Poll::example(id, 1);
            poll.created_at = now - Duration::minutes(i64::from(id));
            poll.is_public = id != 2;
            inserted.push(poll);
        }
        polls.insert_many(&inserted, None).await.unwrap();
        let mut voted = PollOption::new(1, 3, "Yes".into(), 1);
        voted.vote_count = 4;
        options
            .insert_many([voted, PollOption::new(2, 3, "No".into(), 2)], None)
            .await
            .unwrap();

        let response = client.get("/polls?page=0&size=2").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Page<PollDescription> = response.into_json().await.unwrap();
        let ids: Vec<_> = page.polls.iter().map(|p| p.poll_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.polls[1].total_votes, 4);
        assert_eq!(page.polls[1].options.len(), 2);

        let response = client.get("/polls?page=1&size=2").dispatch().await;
        let page: Page<PollDescription> = response.into_json().await.unwrap();
        let ids: Vec<_> = page.polls.iter().map(|p| p.poll_id).collect();
        assert_eq!(ids, vec![4]);
        assert!(page.polls[0].options.is_empty());

        let response = client.get("/polls?size=0").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());

        // A page beyond what the database can skip to.
        let response = client
            .get(format!("/polls?page={}&size=100", u64::MAX / 2))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }
}
