//! lantern: a debug client for the lantern daemon.
//!
//! Encodes one request, writes it as a frame, and prints the response
//! frames. Useful for poking a running daemon without a front-end.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lantern_daemon::Config;
use lantern_protocol::{
    decode, encode, read_frame, request, response, write_frame, ActivateRequest, QueryRequest,
    QueryResponse, SubscribeRequest, SubscribeResponse,
};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "lantern", version, about = "Talk to a running lantern daemon")]
struct Cli {
    /// Socket path; defaults to the daemon's own default location.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query and print the ranked items.
    Query {
        /// Comma-separated provider list, e.g. "desktopapplications,websearch".
        #[arg(long, value_delimiter = ',', required = true)]
        providers: Vec<String>,
        #[arg(long, default_value_t = 50)]
        max_results: u32,
        /// Require a contiguous substring match.
        #[arg(long)]
        exact: bool,
        query: String,
    },
    /// Activate an item by provider, identifier, and action.
    Activate {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        action: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "")]
        arguments: String,
    },
    /// Subscribe to a provider and print pushes until interrupted.
    Subscribe {
        #[arg(long)]
        provider: String,
        /// Poll interval in milliseconds; 0 subscribes to change events.
        #[arg(long, default_value_t = 0)]
        interval: u32,
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LANTERN_LOG", "warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let socket = cli
        .socket
        .unwrap_or_else(|| Config::from_env().socket_path);
    let mut stream = UnixStream::connect(&socket)
        .await
        .with_context(|| format!("connect to lantern daemon at {}", socket.display()))?;

    match cli.command {
        Command::Query {
            providers,
            max_results,
            exact,
            query,
        } => {
            run_query(
                &mut stream,
                QueryRequest {
                    query,
                    providers,
                    max_results,
                    exact_search: exact,
                },
            )
            .await
        }
        Command::Activate {
            provider,
            identifier,
            action,
            query,
            arguments,
        } => {
            run_activate(
                &mut stream,
                ActivateRequest {
                    provider,
                    identifier,
                    action,
                    query,
                    arguments,
                },
            )
            .await
        }
        Command::Subscribe {
            provider,
            interval,
            query,
        } => {
            run_subscribe(
                &mut stream,
                SubscribeRequest {
                    interval,
                    provider,
                    query,
                },
            )
            .await
        }
    }
}

async fn run_query(stream: &mut UnixStream, req: QueryRequest) -> Result<()> {
    write_frame(stream, request::QUERY, &encode(&req)?).await?;

    loop {
        let Some(frame) = read_frame(stream).await? else {
            anyhow::bail!("daemon closed the connection mid-query");
        };
        match frame.tag {
            response::QUERY_ITEM | response::QUERY_ASYNC_ITEM => {
                let resp: QueryResponse = decode(&frame.payload)?;
                let item = resp.item;
                if item.subtext.is_empty() {
                    println!("{:>6}  {:<22}  {}", item.score, item.provider, item.text);
                } else {
                    println!(
                        "{:>6}  {:<22}  {}  ({})",
                        item.score, item.provider, item.text, item.subtext
                    );
                }
            }
            response::QUERY_NO_RESULTS => println!("(no results)"),
            response::QUERY_DONE => return Ok(()),
            other => log::warn!("unexpected tag {other} during query"),
        }
    }
}

async fn run_activate(stream: &mut UnixStream, req: ActivateRequest) -> Result<()> {
    write_frame(stream, request::ACTIVATE, &encode(&req)?).await?;

    loop {
        let Some(frame) = read_frame(stream).await? else {
            anyhow::bail!("daemon closed the connection before acknowledging");
        };
        if frame.tag == response::ACTIVATION_FINISHED {
            println!("activation finished");
            return Ok(());
        }
        log::warn!("unexpected tag {} while waiting for the ack", frame.tag);
    }
}

async fn run_subscribe(stream: &mut UnixStream, req: SubscribeRequest) -> Result<()> {
    write_frame(stream, request::SUBSCRIBE, &encode(&req)?).await?;

    loop {
        let Some(frame) = read_frame(stream).await? else {
            println!("daemon closed the connection");
            return Ok(());
        };
        match frame.tag {
            response::SUBSCRIPTION_DATA_CHANGED => {
                let resp: SubscribeResponse = decode(&frame.payload)?;
                if resp.value.is_empty() {
                    println!("data changed");
                } else {
                    println!("data changed: {}", resp.value);
                }
            }
            response::SUBSCRIPTION_HEALTHCHECK => log::debug!("healthcheck"),
            other => log::warn!("unexpected tag {other} on subscription"),
        }
    }
}
