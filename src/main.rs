//! SPR file CLI
//!
//! Validates, summarizes and lists fixed-width payment request files.
//!
//! # Usage
//!
//! ```bash
//! spr-file validate payments.spr --agency IRS
//! spr-file summary payments.spr > schedules.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use spr_file::{
    Agency, Dollars, FileSummary, PaymentListing, Reader, ReaderConfig, Result, SprError,
    Validator, ValidatorConfig,
};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

const USAGE: &str =
    "usage: spr-file <validate|verify|summary|payments> <file> [--skip-errors] [--agency CODE]";

fn main() {
    env_logger::init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Validate,
    Verify,
    Summary,
    Payments,
}

struct Args {
    command: Command,
    path: String,
    skip_errors: bool,
    agency: Option<Agency>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let usage = || SprError::Usage(USAGE.to_string());
    let command = match args.get(1).map(String::as_str) {
        Some("validate") => Command::Validate,
        Some("verify") => Command::Verify,
        Some("summary") => Command::Summary,
        Some("payments") => Command::Payments,
        _ => return Err(usage()),
    };
    let path = args.get(2).cloned().ok_or_else(usage)?;

    let mut parsed = Args {
        command,
        path,
        skip_errors: false,
        agency: None,
    };
    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--skip-errors" => parsed.skip_errors = true,
            "--agency" => {
                let code = rest.next().ok_or_else(usage)?;
                parsed.agency = Some(code.parse()?);
            }
            other => return Err(SprError::Usage(format!("unknown option {}\n{}", other, USAGE))),
        }
    }
    Ok(parsed)
}

/// Returns `Ok(false)` when the file was read but problems were reported.
fn run() -> Result<bool> {
    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;

    let input = BufReader::new(File::open(&args.path)?);
    let config = if args.skip_errors {
        ReaderConfig::skip_and_collect(ReaderConfig::default().max_collected_errors)
    } else {
        ReaderConfig::default()
    };
    let mut reader = Reader::with_config(input, config);

    match args.command {
        Command::Validate => {
            let file = reader.read()?;
            let mut problems = reader.take_errors();
            let validator = Validator::new(ValidatorConfig {
                agency: args.agency,
            });
            problems.extend(validator.collect(&file));
            for problem in &problems {
                eprintln!("{}", problem);
            }
            if !problems.is_empty() {
                eprintln!("{} problem(s) found", problems.len());
                return Ok(false);
            }
            let totals = file.totals();
            println!(
                "OK: {} schedule(s), {} payment(s), {} record(s), total {}",
                file.schedules.len(),
                totals.payments,
                totals.records,
                Dollars::from_cents(totals.amount)
            );
        }
        Command::Verify => {
            let summary = reader.verify_structure()?;
            println!(
                "records={} schedules={} payments={}",
                summary.records, summary.schedules, summary.payments
            );
            if !reader.errors().is_empty() {
                for problem in reader.errors() {
                    eprintln!("{}", problem);
                }
                return Ok(false);
            }
        }
        Command::Summary => {
            let file = reader.read()?;
            FileSummary::from_file(&file).write_csv(io::stdout().lock())?;
        }
        Command::Payments => {
            let mut listing = PaymentListing::new(io::stdout().lock());
            reader.stream(&mut listing)?;
            listing.finish()?;
        }
    }

    for problem in reader.errors() {
        eprintln!("skipped: {}", problem);
    }
    Ok(true)
}
