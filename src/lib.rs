#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod voting;

pub use config::Config;

/// Assemble the server: configuration, database connection, request logging,
/// routes and error catchers.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Connect to the test database server, as configured by `db_uri`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database at \"{db_uri}\": {e}"))
}

/// A fresh database name for a single test.
#[cfg(test)]
pub(crate) fn database() -> String {
    config::get_database_name()
}

/// Build a server using an existing database connection, bypassing
/// `DatabaseFairing`. Indexes are still ensured.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create test indexes");
    rocket::build()
        .attach(config::ConfigFairing)
        .manage(client)
        .manage(db)
        .mount("/", api::routes())
        .register("/", api::catchers())
}
