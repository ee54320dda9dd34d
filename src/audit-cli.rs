//! A simple CLI tool for checking that every poll's option counters agree
//! with its ballot ledger.
//! This uses the server's own audit implementation, and reads the database
//! directly rather than going through the API.

use std::fmt::{Display, Formatter};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;

use polling_backend::{
    error::Error,
    model::common::PollId,
    voting::{audit_all, audit_poll, OptionAudit, PollAudit},
};

const PROGRAM_NAME: &str = "audit-polls";

const ABOUT_TEXT: &str = "Check that vote counters match the ballot ledger.

EXIT CODES:
     0: Every audited poll is consistent.
   255: Ran successfully, but at least one poll is inconsistent.
 Other: Error.";

const DB_URI: &str = "DB_URI";
const DB_URI_HELP: &str = "MongoDB connection string, e.g.\n\
mongodb://localhost:27017/?replicaSet=rs0";

const DATABASE: &str = "database";
const DATABASE_HELP: &str = "Name of the database holding the polls";
const DEFAULT_DATABASE: &str = "polling";

const POLL: &str = "poll";
const POLL_HELP: &str = "Audit only the poll with this ID";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .help(DB_URI_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DATABASE)
                .long(DATABASE)
                .help(DATABASE_HELP)
                .action(ArgAction::Set)
                .default_value(DEFAULT_DATABASE),
        )
        .arg(
            Arg::new(POLL)
                .long(POLL)
                .help(POLL_HELP)
                .action(ArgAction::Set)
                .value_parser(value_parser!(PollId)),
        )
}

/// One option's line of the report.
struct OptionLine<'a>(&'a OptionAudit);

impl Display for OptionLine<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let audit = self.0;
        write!(
            f,
            "  option {} \"{}\": counter {}, {} ballot{}",
            audit.option_id,
            audit.option_text,
            audit.counter,
            audit.ballots,
            if audit.ballots != 1 { "s" } else { "" },
        )?;
        if !audit.is_consistent() {
            write!(f, "  <-- MISMATCH")?;
        }
        Ok(())
    }
}

/// Print the audit of one poll.
fn print_audit(audit: &PollAudit) {
    let verdict = if audit.is_consistent() {
        "consistent"
    } else {
        "INCONSISTENT"
    };
    println!("Poll {} \"{}\": {verdict}", audit.poll_id, audit.title);
    for option in &audit.options {
        println!("{}", OptionLine(option));
    }
    if audit.stray_ballots > 0 {
        println!(
            "  {} ballot{} for options outside the poll",
            audit.stray_ballots,
            if audit.stray_ballots != 1 { "s" } else { "" }
        );
    }
}

/// Run the audit against the database.
async fn audit(
    db_uri: &str,
    database: &str,
    poll: Option<PollId>,
) -> Result<Vec<PollAudit>, Error> {
    let client = Client::with_uri_str(db_uri).await?;
    let db = client.database(database);
    match poll {
        Some(poll_id) => Ok(vec![audit_poll(&client, &db, poll_id).await?]),
        None => audit_all(&client, &db).await,
    }
}

/// Decide the exit code for a completed audit.
fn exit_code(audits: &[PollAudit]) -> u8 {
    if audits.iter().all(PollAudit::is_consistent) {
        0
    } else {
        255
    }
}

/// Run the audit, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Required or defaulted arguments are guaranteed to be present.
    let db_uri: &String = args.get_one(DB_URI).unwrap();
    let database: &String = args.get_one(DATABASE).unwrap();
    let poll = args.get_one::<PollId>(POLL).copied();

    let runtime = match rocket::tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("Could not start async runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(audit(db_uri, database, poll)) {
        Ok(audits) => {
            if audits.is_empty() {
                println!("No polls found.");
            }
            for audit in &audits {
                print_audit(audit);
            }
            let code = exit_code(&audits);
            if code == 0 {
                println!("Audit succeeded.");
            } else {
                println!("Audit failed: counters disagree with the ledger.");
            }
            code
        }
        Err(err) => {
            println!("Audit could not run: {err}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
