//! Command-line interface.
//!
//! The binary calls [`parse_args`] first and handles the commands that need
//! no network access through [`run_cli_command`]:
//!
//! ```ignore
//! use perplexity_stream::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! if let Some(code) = run_cli_command(&command) {
//!     std::process::exit(code);
//! }
//! // Query or Threads: build a client and go
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_string, VERSION};

/// Run a local command if applicable.
///
/// Returns the exit code for `Version`, `Help` and `Invalid`, or `None` when
/// the command needs a client.
pub fn run_cli_command(command: &CliCommand) -> Option<i32> {
    match command {
        CliCommand::Version => {
            println!("{}", version_string());
            Some(0)
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Some(0)
        }
        CliCommand::Invalid(reason) => {
            eprintln!("error: {}\n\n{}", reason, USAGE);
            Some(2)
        }
        CliCommand::Query { .. } | CliCommand::Threads { .. } => None,
    }
}
