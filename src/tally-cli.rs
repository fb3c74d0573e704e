//! A simple CLI tool for tallying exported instruments offline, and for
//! migrating exports that still hold legacy text-encoded answers.
//! This uses the server's own tally implementation, so its results always
//! agree with `GET /instruments/<id>/tally`.

use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use geopoll_backend::{error::Error as BackendError, model::api::export::InstrumentExport};

const PROGRAM_NAME: &str = "tally-cli";

const ABOUT_TEXT: &str = "Tally or migrate an exported poll or survey.

EXIT CODES:
     0: Success.
   255: Ran successfully, but the export's data is invalid.
 Other: Error.";

const TALLY: &str = "tally";
const MIGRATE: &str = "migrate";

const EXPORT_PATH: &str = "EXPORT_PATH";

const EXPORT_PATH_HELP: &str = "The path to a JSON export of an instrument\n\
and all of its responses";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let export_path = Arg::new(EXPORT_PATH)
        .help(EXPORT_PATH_HELP)
        .action(ArgAction::Set)
        .required(true);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(
            Command::new(TALLY)
                .about("Print the results of an export")
                .arg(export_path.clone()),
        )
        .subcommand(
            Command::new(MIGRATE)
                .about("Rewrite legacy text-encoded answers into canonical records and print the migrated export")
                .arg(export_path),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON export.
    Format(String),
    /// The export decoded, but its contents are not valid.
    Data(BackendError),
}

fn load(path: &str) -> Result<InstrumentExport, Error> {
    let file = File::open(path).map_err(|e| Error::IO(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Format(e.to_string()))
}

fn tally(path: &str) -> Result<String, Error> {
    let export = load(path)?;
    let results = export.tally().map_err(Error::Data)?;
    Ok(format!("{}\n{results}", export.instrument.title))
}

fn migrate(path: &str) -> Result<String, Error> {
    let mut export = load(path)?;
    let report = export.migrate().map_err(Error::Data)?;
    eprintln!(
        "Migrated {} legacy row(s) into {} canonical row(s).",
        report.legacy_rows, report.canonical_rows
    );
    serde_json::to_string_pretty(&export).map_err(|e| Error::Format(e.to_string()))
}

/// Run the subcommand, print its output, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((TALLY, sub_args)) => {
            // Required argument is guaranteed to be present.
            let path: &String = sub_args.get_one(EXPORT_PATH).unwrap();
            tally(path)
        }
        Some((MIGRATE, sub_args)) => {
            let path: &String = sub_args.get_one(EXPORT_PATH).unwrap();
            migrate(path)
        }
        // A subcommand is required.
        _ => unreachable!(),
    };
    match result {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Data(err)) => {
            println!("Invalid export: {err}");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
