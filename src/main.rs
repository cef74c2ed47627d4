use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mesh_gateway::rest::ResourceKind;
use mesh_gateway::{Config, Daemon};

/// Meshgw - REST management gateway for low-power mesh border devices
#[derive(Parser)]
#[command(name = "meshgw", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/meshgw/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config and MESHGW_LISTEN)
    #[arg(long)]
    listen: Option<IpAddr>,

    /// Port to listen on (overrides config and MESHGW_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration and exit
    ShowConfig,
    /// List the served resources and their methods
    Routes,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mesh_gateway=info",
        1 => "info,mesh_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(cmd) = cli.command {
        match cmd {
            Command::ShowConfig => println!("{config:#?}"),
            Command::Routes => print_routes(),
        }
        return Ok(());
    }

    tracing::info!(addr = %config.server.socket_addr(), "starting mesh gateway");
    tracing::debug!(?config, "loaded configuration");

    // Run until interrupted
    Daemon::new(config).run().await?;

    Ok(())
}

fn print_routes() {
    for kind in ResourceKind::ALL {
        let mut methods: Vec<&str> = kind.methods().iter().map(|m| m.as_str()).collect();
        if kind.accepts_options() {
            methods.push("OPTIONS");
        }
        println!("{:<28} {}", kind.path(), methods.join(", "));
    }
}
