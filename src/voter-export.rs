//! A simple CLI tool for exporting every stored voter to a CSV file.
//! The output is identical to the dashboard's CSV download.

use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client as MongoClient;
use thiserror::Error;

use votemap_backend::{
    dashboard::{export_csv, EXPORT_FILE_NAME},
    store::{MongoVoterStore, VoterRepository},
};

const PROGRAM_NAME: &str = "voter-export";

const ABOUT_TEXT: &str = "Export all voter records from the database as CSV.

EXIT CODES:
     0: Export written.
     1: Error.";

const DB_URI: &str = "DB_URI";
const DB_NAME: &str = "DB_NAME";
const OUTPUT: &str = "OUTPUT";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .help("MongoDB connection string")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DB_NAME)
                .long("db-name")
                .help("Database holding the `voters` collection")
                .action(ArgAction::Set)
                .default_value("votemap"),
        )
        .arg(
            Arg::new(OUTPUT)
                .long("output")
                .short('o')
                .help("Where to write the CSV file")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .default_value(EXPORT_FILE_NAME),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Could not connect to database: {0}")]
    Connect(#[from] mongodb::error::Error),
    #[error(transparent)]
    Export(#[from] votemap_backend::error::Error),
    #[error("Could not write output: {0}")]
    IO(#[from] std::io::Error),
}

/// Write every voter in `repository` to `path`, returning how many were written.
async fn export(repository: &VoterRepository, path: &Path) -> Result<usize, Error> {
    let records = repository.list().await?;
    let csv = export_csv(&records).map_err(votemap_backend::error::Error::from)?;
    std::fs::write(path, csv)?;
    Ok(records.len())
}

/// Connect to the configured database, run the export, report the result,
/// and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    // Required and defaulted arguments are guaranteed to be present.
    let db_uri: &String = args.get_one(DB_URI).unwrap();
    let db_name: &String = args.get_one(DB_NAME).unwrap();
    let output: &PathBuf = args.get_one(OUTPUT).unwrap();

    let result: Result<usize, Error> = async {
        let client = MongoClient::with_uri_str(db_uri).await?;
        let repository = VoterRepository::new(MongoVoterStore::new(&client.database(db_name)));
        export(&repository, output).await
    }
    .await;

    match result {
        Ok(count) => {
            println!(
                "Exported {} voter{} to {}",
                count,
                if count != 1 { "s" } else { "" },
                output.display()
            );
            0
        }
        Err(err) => {
            println!("Export failed: {err}");
            1
        }
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
