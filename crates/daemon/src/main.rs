//! lanternd: the lantern launcher daemon.

use anyhow::Result;
use lantern_daemon::{Config, Server};
use lantern_providers::Registry;

fn print_help() {
    println!("lantern launcher daemon");
    println!();
    println!("Usage: lanternd [--socket <path>|--version|--help]");
    println!();
    println!("Env:");
    println!("  LANTERN_SOCKET           Socket path (default: $XDG_RUNTIME_DIR/lantern/lantern.sock)");
    println!("  LANTERN_LOG              Log filter, env_logger syntax (default: info)");
    println!("  LANTERN_HEALTHCHECK_MS   Subscription liveness probe interval, unset or 0 disables");
    println!("  LANTERN_MAX_GLOBAL_WEBSEARCH  Websearch visibility threshold in combined views");
}

/// Returns an exit code when the invocation should not start the daemon.
fn apply_args(config: &mut Config) -> Option<i32> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--socket" => match args.next() {
                Some(path) if !path.trim().is_empty() => {
                    config.socket_path = path.trim().into();
                }
                _ => {
                    eprintln!("--socket requires a path");
                    return Some(2);
                }
            },
            "--version" | "-V" => {
                println!("lanternd {}", env!("CARGO_PKG_VERSION"));
                return Some(0);
            }
            "--help" | "-h" => {
                print_help();
                return Some(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                return Some(2);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LANTERN_LOG", "info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(code) = apply_args(&mut config) {
        std::process::exit(code);
    }

    // Providers are compiled in by the packaging build; the stock binary
    // starts without any and answers every query with an empty result.
    let registry = Registry::build(Vec::new()).await;
    log::info!("{} providers loaded", registry.len());

    Server::bind(&config, registry)?.run().await
}
