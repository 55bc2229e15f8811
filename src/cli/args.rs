//! Command-line argument parsing.
//!
//! This module turns the raw argument list into a [`CliCommand`].

use chrono::NaiveDate;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Ask a question and print the answer
    Query { text: String, deep: bool },
    /// List threads in the library
    Threads {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        search: Option<String>,
    },
    /// Arguments could not be parsed
    Invalid(String),
}

/// Usage text printed by `--help`.
pub const USAGE: &str = "\
usage: perplexity-stream [--deep] <question...>
       perplexity-stream --threads [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--search TERM]
       perplexity-stream --version | --help

environment:
  PERPLEXITY_TOKEN   session token sent as a bearer credential
  RUST_LOG           log filter (default: warn)";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use perplexity_stream::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["perplexity-stream".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1).peekable();

    match args.peek().map(String::as_str) {
        None | Some("--help") | Some("-h") => return CliCommand::Help,
        Some("--version") | Some("-V") => return CliCommand::Version,
        Some("threads") | Some("--threads") => {
            args.next();
            return parse_threads(args);
        }
        _ => {}
    }

    let mut deep = false;
    let mut words = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--deep" | "-d" => deep = true,
            "--help" | "-h" => return CliCommand::Help,
            _ => words.push(arg),
        }
    }

    let text = words.join(" ");
    if text.trim().is_empty() {
        return CliCommand::Invalid("missing question".to_string());
    }
    CliCommand::Query { text, deep }
}

fn parse_threads<I>(mut args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut from = None;
    let mut to = None;
    let mut search = None;

    while let Some(arg) = args.next() {
        let flag = arg.as_str();
        let value = match flag {
            "--from" | "--to" | "--search" => match args.next() {
                Some(value) => value,
                None => return CliCommand::Invalid(format!("{} needs a value", flag)),
            },
            "--help" | "-h" => return CliCommand::Help,
            other => return CliCommand::Invalid(format!("unknown argument: {}", other)),
        };

        match flag {
            "--search" => search = Some(value),
            _ => {
                let date = match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
                    Ok(date) => date,
                    Err(_) => {
                        return CliCommand::Invalid(format!("invalid date for {}: {}", flag, value))
                    }
                };
                if flag == "--from" {
                    from = Some(date);
                } else {
                    to = Some(date);
                }
            }
        }
    }

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return CliCommand::Invalid("--from is after --to".to_string());
        }
    }

    CliCommand::Threads { from, to, search }
}
