//! FlashWire - Framed Echo Server
//!
//! This is the main entry point for the FlashWire demo server.
//! It sets up the TCP listener, builds a connection per accepted socket,
//! and echoes every framed message back to its sender.

use flashwire::connection::{
    Callbacks, Connection, ConnectionConfig, ConnectionRegistry, ConnectionStats,
};
use flashwire::protocol::{ResponseContext, MAX_BUF_LEN};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Idle read timeout in milliseconds (0 disables it)
    timeout_ms: u64,
    /// Largest accepted body length
    max_frame: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: flashwire::DEFAULT_HOST.to_string(),
            port: flashwire::DEFAULT_PORT,
            timeout_ms: 30_000,
            max_frame: MAX_BUF_LEN,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = require_value(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = parse_value(&args, i, "--port", "port number");
                    i += 2;
                }
                "--timeout-ms" | "-t" => {
                    config.timeout_ms = parse_value(&args, i, "--timeout-ms", "timeout");
                    i += 2;
                }
                "--max-frame" | "-m" => {
                    config.max_frame = parse_value(&args, i, "--max-frame", "frame size");
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashWire version {}", flashwire::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_frame_len(self.max_frame)
    }
}

fn require_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str, what: &str) -> T {
    require_value(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid {}", what);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
FlashWire - Framed Echo Server

USAGE:
    flashwire [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 9000)
    -t, --timeout-ms <MS>      Idle read timeout, 0 disables (default: 30000)
    -m, --max-frame <BYTES>    Largest accepted body (default: 10485760)
    -v, --version              Print version information
        --help                 Print this help message

EXAMPLES:
    flashwire                        # Start on 127.0.0.1:9000
    flashwire --port 9100            # Start on port 9100
    flashwire --timeout-ms 0         # Never time out idle clients

WIRE FORMAT:
    16-byte big-endian header followed by `len` body bytes:
      u32 len | u32 request_id | u64 method
    A header with len = 0 is a keep-alive.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(version = flashwire::VERSION, "FlashWire starting");

    let stats = Arc::new(ConnectionStats::new());
    let registry = Arc::new(ConnectionRegistry::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        timeout_ms = config.timeout_ms,
        max_frame = config.max_frame,
        "Listening on {}",
        config.bind_address()
    );

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, config.connection_config(), Arc::clone(&registry), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let closed = registry.close_all();
    info!(
        closed,
        frames = stats.frames_read.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    config: ConnectionConfig,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let conn = Connection::new(
                    stream,
                    addr,
                    config.clone(),
                    echo_callbacks(Arc::clone(&registry)),
                    Arc::clone(&stats),
                );
                registry.insert(Arc::clone(&conn));
                conn.start();
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Callbacks that echo each frame and deregister the connection on failure.
fn echo_callbacks(registry: Arc<ConnectionRegistry>) -> Callbacks {
    Callbacks::new()
        .on_read(|conn, frame| {
            let header = frame.header();
            let Some(response) =
                ResponseContext::framed(header.request_id, header.method, frame.body())
            else {
                return;
            };
            if let Err(e) = conn.respond(response) {
                warn!(conn = conn.id(), error = %e, "Dropped response");
            }
        })
        .on_error(move |conn, err| {
            registry.remove(conn.id());
            debug!(conn = conn.id(), error = %err, "Connection deregistered");
        })
}
