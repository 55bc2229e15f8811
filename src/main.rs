use perplexity_stream::cli::{parse_args, run_cli_command, CliCommand};
use perplexity_stream::client::{ListOptions, ProtocolClient, RunOptions};
use perplexity_stream::config::ClientConfig;
use perplexity_stream::error::ProtocolError;
use perplexity_stream::models::{AnswerResult, QueryMode, QueryRequest, ThreadQuery, ThreadRecord};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const TOKEN_VAR: &str = "PERPLEXITY_TOKEN";

/// Exit code for an interrupted run, as a shell reports SIGINT.
const EXIT_CANCELLED: i32 = 130;

fn main() -> Result<()> {
    let command = parse_args(std::env::args());
    if let Some(code) = run_cli_command(&command) {
        std::process::exit(code);
    }

    color_eyre::install()?;
    init_logging();

    let token = std::env::var(TOKEN_VAR)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| eyre!("{} is not set", TOKEN_VAR))?;
    let config = ClientConfig::load_default().wrap_err("Failed to load configuration")?;
    let client = ProtocolClient::new(config, token)?;

    let cancel = setup_interrupt_handler();
    let runtime = tokio::runtime::Runtime::new()?;

    let outcome = runtime.block_on(async {
        match command {
            CliCommand::Query { text, deep } => {
                let mode = if deep {
                    QueryMode::DeepResearch
                } else {
                    QueryMode::Standard
                };
                let request = QueryRequest::new(text).with_mode(mode);
                let options = RunOptions::new()
                    .with_cancel(cancel.clone())
                    .on_progress(|progress| {
                        let step = progress.progress.as_deref().unwrap_or("Researching");
                        match progress.pct_complete {
                            Some(pct) => eprintln!("[{:>3}%] {}", pct, step),
                            None => eprintln!("[ .. ] {}", step),
                        }
                    });
                client
                    .run_with(&request, &options)
                    .await
                    .map(|answer| print_answer(&answer))
            }
            CliCommand::Threads { from, to, search } => {
                let mut query = ThreadQuery::new();
                query.from = from;
                query.to = to;
                query.search_term = search;
                let options = ListOptions::new()
                    .with_cancel(cancel.clone())
                    .on_page(|fetched, total| eprintln!("Fetched {}/{} threads", fetched, total));
                client
                    .list_threads_with(&query, &options)
                    .await
                    .map(|threads| print_threads(&threads))
            }
            // Local commands were handled above
            _ => Ok(()),
        }
    });

    match outcome {
        Ok(()) => Ok(()),
        Err(ProtocolError::Cancelled) => {
            eprintln!("Cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            tracing::debug!(error = ?e, code = e.error_code(), "Command failed");
            eprintln!("Error: {}", e.user_message());
            std::process::exit(1);
        }
    }
}

/// Log to stderr so stdout stays clean for the answer. `RUST_LOG`
/// overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel the returned token on Ctrl+C.
fn setup_interrupt_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();

    // Ignore errors if a handler is already installed
    let _ = ctrlc::set_handler(move || handle.cancel());

    cancel
}

fn print_answer(answer: &AnswerResult) {
    println!("{}", answer.answer);
    if !answer.references.is_empty() {
        println!("\nReferences:");
        for (i, reference) in answer.references.iter().enumerate() {
            println!("  [{}] {} - {}", i + 1, reference.title, reference.url);
        }
    }
    if let Some(slug) = &answer.thread_slug {
        eprintln!("\nThread: {}", slug);
    }
}

fn print_threads(threads: &[ThreadRecord]) {
    for thread in threads {
        println!(
            "{}  {}  {}",
            thread.created_at.format("%Y-%m-%d %H:%M"),
            thread.title,
            thread.url
        );
    }
    eprintln!("{} threads", threads.len());
}
