//! rest-swagger - Command-line front end of the Swagger 2.0 generator.
//!
//! Loads handler and DTO declarations from manifest files, builds one
//! document variant and prints or writes it.
//!
//! # Usage
//!
//! ```bash
//! rest-swagger [OPTIONS] <MANIFEST_PATH>
//! ```
//!
//! # Examples
//!
//! Build the default document as JSON:
//! ```bash
//! rest-swagger ./api -o swagger.json
//! ```
//!
//! Build the `admin` variant as YAML for a superuser:
//! ```bash
//! rest-swagger ./api --settings settings.yaml -c admin -u superuser -f yaml
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use rest_swagger::cli;

fn main() -> Result<()> {
    // Parse once for the verbose flag, validate after the logger is up
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("rest-swagger starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Swagger document generation completed successfully");

    Ok(())
}
