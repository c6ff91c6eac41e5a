use std::path::PathBuf;

use clap::Parser;
use originfs::{HostContext, OriginFs, RootRef};
use originfs_cli::{execute, init_logging, load_config, Command};

/// ofs - command-line access to an originfs filesystem
#[derive(Parser, Debug)]
#[command(name = "ofs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Mount id to resolve paths against
    #[arg(long, short)]
    root: Option<String>,

    /// Run storage operations inline instead of on a worker thread
    #[arg(long)]
    inline: bool,

    /// More log output (repeatable)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "loaded config");
    if args.inline {
        config.channel.host = HostContext {
            workers_supported: false,
            delegated: false,
        };
    }

    let fs = match OriginFs::from_config(&config).await {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let root = RootRef::from(args.root);
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = execute(&fs, root, args.command, &mut stdout).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
