use std::time::{Duration, Instant};

use mongodb::{
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{Acknowledgment, ReadConcern, TransactionOptions, WriteConcern},
    Client, ClientSession,
};

/// How long we keep re-running a transaction that keeps hitting transient
/// failures (typically write conflicts with concurrent transactions).
pub const TRANSACTION_RETRY_LIMIT: Duration = Duration::from_secs(120);

/// Pause between attempts to commit a transaction whose outcome is unknown.
const COMMIT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Why a transaction body gave up.
#[derive(Debug)]
pub enum Abort<E> {
    /// The database failed. Transient failures are retried before this
    /// reaches the caller.
    Db(DbError),
    /// The body rejected the operation on business grounds.
    Rejected(E),
}

impl<E> From<DbError> for Abort<E> {
    fn from(err: DbError) -> Self {
        Self::Db(err)
    }
}

/// The work done inside a single transaction. It may be run more than once,
/// so it must not have side effects outside the session.
#[rocket::async_trait]
pub trait TransactionBody {
    type Output: Send;
    type Rejection: Send;

    async fn run(
        &self,
        session: &mut ClientSession,
    ) -> Result<Self::Output, Abort<Self::Rejection>>;
}

/// Options for read-write transactions: snapshot reads and majority-acknowledged
/// writes, optionally bounding commit time.
pub fn transaction_options(max_commit_time: impl Into<Option<Duration>>) -> TransactionOptions {
    TransactionOptions::builder()
        .read_concern(ReadConcern::snapshot())
        .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
        .max_commit_time(max_commit_time.into())
        .build()
}

/// Is the failure one the server says is safe to retry as a whole transaction?
pub fn is_transient(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Run `body` inside a transaction and commit it, re-running the whole
/// transaction on transient failures until [`TRANSACTION_RETRY_LIMIT`] passes.
/// Either everything the body wrote is committed, or nothing is.
pub async fn run_transaction<B>(
    client: &Client,
    options: TransactionOptions,
    body: &B,
) -> Result<B::Output, Abort<B::Rejection>>
where
    B: TransactionBody + Sync,
{
    let mut session = client.start_session(None).await?;
    let deadline = Instant::now() + TRANSACTION_RETRY_LIMIT;
    let mut attempt: u32 = 1;
    loop {
        session.start_transaction(options.clone()).await?;
        match body.run(&mut session).await {
            Ok(output) => match commit_with_retry(&mut session, deadline).await {
                Ok(()) => return Ok(output),
                Err(e) if is_transient(&e) && Instant::now() < deadline => {}
                Err(e) => return Err(e.into()),
            },
            Err(Abort::Db(e)) if is_transient(&e) && Instant::now() < deadline => {
                abort(&mut session).await;
            }
            Err(err) => {
                abort(&mut session).await;
                return Err(err);
            }
        }
        attempt += 1;
        trace!("Transaction hit a transient failure, starting attempt {attempt}");
        rocket::tokio::task::yield_now().await;
    }
}

/// Commit the current transaction, retrying while the server cannot tell us
/// whether an earlier commit attempt succeeded.
async fn commit_with_retry(session: &mut ClientSession, deadline: Instant) -> Result<(), DbError> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && Instant::now() < deadline =>
            {
                debug!("Commit result unknown, retrying commit: {e}");
                rocket::tokio::time::sleep(COMMIT_RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Abort the current transaction. The server may already have aborted it
/// after a failed write, so errors here carry no information.
async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        trace!("Ignoring error while aborting transaction: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_retries_pause_well_within_the_limit() {
        assert!(COMMIT_RETRY_BACKOFF > Duration::ZERO);
        assert!(COMMIT_RETRY_BACKOFF * 100 < TRANSACTION_RETRY_LIMIT);
    }

    #[test]
    fn transactions_use_snapshot_and_majority() {
        let options = transaction_options(Duration::from_secs(5));
        assert_eq!(options.read_concern, Some(ReadConcern::snapshot()));
        assert_eq!(
            options.write_concern.and_then(|concern| concern.w),
            Some(Acknowledgment::Majority)
        );
        assert_eq!(options.max_commit_time, Some(Duration::from_secs(5)));
    }
}
