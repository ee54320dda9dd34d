mod bson;
mod collection;
mod counter;
mod errors;
mod transaction;

pub use bson::{u32_id_filter, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    Counter, COMMENT_ID_COUNTER, OPTION_ID_COUNTER, POLL_ID_COUNTER, USER_ID_COUNTER,
};
pub use errors::{is_duplicate_key_error, DUPLICATE_KEY};
pub use transaction::{
    is_transient, run_transaction, transaction_options, Abort, TransactionBody,
    TRANSACTION_RETRY_LIMIT,
};
