//! RepCRec binary: run a transaction script against a fresh cluster.
//!
//! Reads a script from a file (or stdin), executes it through the
//! coordinator, prints the transcript as it goes, then checks the
//! script's assertion trailer against the outcome log.
//!
//! Exit codes: 0 on success (all assertions passed), 1 when an assertion
//! fails, 2 on input or configuration errors.

mod harness;
mod parse;

use std::fs;
use std::io::Read as _;
use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};
use tracing_subscriber::filter::LevelFilter;

use repcrec_core::{Error, Placement};
use repcrec_engine::TransactionManager;

fn main() {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("debug"));
    match run(&matches) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    }
}

fn build_cli() -> ClapCommand {
    ClapCommand::new("repcrec")
        .about("Replicated concurrency control and recovery demonstrator")
        .arg(
            Arg::new("script")
                .value_name("SCRIPT")
                .help("Script file to execute; '-' or absent reads stdin"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .default_value("./repcrec-data")
                .help("Durable state directory; must not exist yet"),
        )
        .arg(
            Arg::new("sites")
                .long("sites")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .default_value("10")
                .help("Number of storage sites"),
        )
        .arg(
            Arg::new("variables")
                .long("variables")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .default_value("20")
                .help("Number of variables"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Emit debug event logging to stderr"),
        )
        .arg(
            Arg::new("summary-json")
                .long("summary-json")
                .action(ArgAction::SetTrue)
                .help("Print the outcome log as JSON after the run"),
        )
}

fn init_tracing(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn read_script_source(matches: &ArgMatches) -> Result<String, Error> {
    match matches.get_one::<String>("script").map(String::as_str) {
        Some("-") | None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
        Some(path) => Ok(fs::read_to_string(path)?),
    }
}

/// Run the script; `Ok(true)` means every assertion passed.
fn run(matches: &ArgMatches) -> Result<bool, Error> {
    let source = read_script_source(matches)?;
    let script = parse::parse_script(&source).map_err(|e| Error::Input(e.to_string()))?;

    let sites = *matches.get_one::<u32>("sites").unwrap_or(&Placement::DEFAULT_SITES);
    let variables = *matches
        .get_one::<u32>("variables")
        .unwrap_or(&Placement::DEFAULT_VARIABLES);
    let placement = Placement::new(sites, variables)?;

    let data_dir = matches
        .get_one::<String>("data-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./repcrec-data"));

    let mut manager = TransactionManager::new(placement, &data_dir)?;
    for command in &script.commands {
        manager.execute(*command)?;
        for line in manager.take_output() {
            println!("{}", line);
        }
    }

    if matches.get_flag("summary-json") {
        let json = serde_json::to_string_pretty(manager.outcome_log())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        println!("{}", json);
    }

    let failures = harness::check(&script.assertions, manager.outcome_log());
    for failure in &failures {
        eprintln!("assertion failed: {}", failure);
    }
    Ok(failures.is_empty())
}
