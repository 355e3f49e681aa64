use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use relay_rs::client::terminal;
use relay_rs::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};
use relay_rs::protocol::FrameCodec;
use relay_rs::{RelayServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server.
    Serve(Endpoint),
    /// Connect to a relay server and chat from the terminal.
    Connect(Endpoint),
}

#[derive(Args, Debug, Clone)]
struct Endpoint {
    /// Host to bind (serve) or connect to (connect).
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port. Use 0 with `serve` for an ephemeral port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Largest accepted frame payload, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

impl Endpoint {
    async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("no address found for {}:{}", self.host, self.port))
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(endpoint) => serve(endpoint).await,
        Command::Connect(endpoint) => {
            let addr = endpoint.resolve().await?;
            terminal::run(addr, FrameCodec::new(endpoint.max_frame_size))
                .await
                .with_context(|| format!("connection to {addr} failed"))
        }
    }
}

async fn serve(endpoint: Endpoint) -> Result<()> {
    let addr = endpoint.resolve().await?;
    let config = ServerConfig::with_addr(addr).max_frame_size(endpoint.max_frame_size);

    let server = RelayServer::bind(config).await?;
    println!("listening on {}", server.local_addr()?);

    server.run_until_ctrl_c().await?;
    Ok(())
}
