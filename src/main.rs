//! Entry point for `udp-stream`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, stdio plumbing, signal handling, argument parsing).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use udp_stream::app::ChannelApp;
use udp_stream::config::MIN_WINDOW;
use udp_stream::packet::MAX_PAYLOAD;
use udp_stream::socket::Socket;
use udp_stream::{Config, EventLoop, Role};

/// TCP-like reliable byte stream over UDP: stdin is sent, received bytes go to stdout.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    tuning: Tuning,
}

#[derive(Subcommand)]
enum Mode {
    /// Run as a server, waiting for one client.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
    },
    /// Run as a client, connecting to a remote server.
    Client {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
    },
}

#[derive(Args)]
struct Tuning {
    /// Retransmission timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    rto_ms: u64,
    /// Duplicate ACKs that trigger a fast retransmit.
    #[arg(long, global = true, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    dup_acks: u32,
    /// Receive window advertised to the peer, in bytes (at least one full packet).
    #[arg(
        long,
        global = true,
        default_value_t = MIN_WINDOW,
        value_parser = clap::value_parser!(u16).range(i64::from(MIN_WINDOW)..)
    )]
    window: u16,
}

impl Tuning {
    fn into_config(self) -> Config {
        Config {
            rto: Duration::from_millis(self.rto_ms),
            dup_ack_threshold: self.dup_acks,
            receive_window: self.window,
            ..Config::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.tuning.into_config();

    let (role, socket) = match cli.mode {
        Mode::Server { bind } => {
            log::info!("Starting server on {bind}");
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            (Role::Server, socket)
        }
        Mode::Client { server, bind } => {
            log::info!("Starting client, connecting to {server}");
            let socket = Socket::connect(bind, server)
                .await
                .with_context(|| format!("binding {bind}"))?;
            (Role::Client, socket)
        }
    };
    log::debug!("bound to {}", socket.local_addr);

    let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>(64);
    let (output_tx, output_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(pump_stdin(input_tx));
    tokio::spawn(drain_to_stdout(output_rx));

    let mut event_loop = EventLoop::new(role, socket, ChannelApp::new(input_rx, output_tx), config);

    tokio::select! {
        _ = event_loop.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            log::info!("interrupted; exiting");
        }
    }
    Ok(())
}

/// Read stdin in payload-sized chunks and forward them to the transport.
async fn pump_stdin(tx: mpsc::Sender<Vec<u8>>) {
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; MAX_PAYLOAD];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("stdin read failed: {e}");
                break;
            }
        }
    }
    log::debug!("stdin closed");
}

/// Write every delivered chunk to stdout as it arrives.
async fn drain_to_stdout(mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = rx.recv().await {
        if let Err(e) = stdout.write_all(&chunk).await {
            log::warn!("stdout write failed: {e}");
            break;
        }
        let _ = stdout.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("udp-stream").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tuning_flags_reach_the_config() {
        let cli = parse(&["client", "--server", "127.0.0.1:9000", "--rto-ms", "250", "--dup-acks", "5", "--window", "4096"])
            .unwrap();
        let config = cli.tuning.into_config();
        assert_eq!(config.rto, Duration::from_millis(250));
        assert_eq!(config.dup_ack_threshold, 5);
        assert_eq!(config.receive_window, 4096);
    }

    #[test]
    fn defaults_match_config_defaults() {
        let config = parse(&["server"]).unwrap().tuning.into_config();
        let defaults = Config::default();
        assert_eq!(config.rto, defaults.rto);
        assert_eq!(config.dup_ack_threshold, defaults.dup_ack_threshold);
        assert_eq!(config.receive_window, defaults.receive_window);
    }

    #[test]
    fn degenerate_tuning_is_rejected() {
        assert!(parse(&["server", "--dup-acks", "0"]).is_err());
        assert!(parse(&["server", "--rto-ms", "0"]).is_err());
        assert!(parse(&["server", "--window", "0"]).is_err());
        assert!(parse(&["server", "--window", "100"]).is_err());
        assert!(parse(&["--dup-acks", "1", "server"]).is_ok());
    }
}
