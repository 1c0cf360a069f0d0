use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use refinery::config::Config;
use refinery::error::RfResult;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weighted parallel refinement of stored solutions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with base settings; flags given on the command line win
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score, select and mutate candidates until interrupted
    Run(cmd::run::RunArgs),
    /// Adopt better solutions from a shared pool
    Sync(cmd::sync::SyncArgs),
    /// Score every candidate once and show its selection weight
    Report(cmd::report::ReportArgs),
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let (cli_config, sub_name) = match &cli.command {
        Commands::Run(args) => (&args.config, "run"),
        Commands::Sync(args) => (&args.config, "sync"),
        Commands::Report(args) => (&args.config, "report"),
    };
    let Some(sub_matches) = matches.subcommand_matches(sub_name) else {
        error!("missing arguments for '{}'", sub_name);
        process::exit(2);
    };

    let config = resolve_config(cli_config, cli.config.as_ref(), sub_matches).unwrap_or_else(|e| {
        error!("❌ {}", e);
        process::exit(1);
    });

    let result = match &cli.command {
        Commands::Run(args) => cmd::run::run(args, config),
        Commands::Sync(args) => cmd::sync::run(args, config),
        Commands::Report(args) => cmd::report::run(args, config),
    };

    if let Err(e) = result {
        error!("\n❌ FATAL: {}", e);
        process::exit(1);
    }
}

fn resolve_config(
    cli_config: &Config,
    path: Option<&PathBuf>,
    sub_matches: &ArgMatches,
) -> RfResult<Config> {
    let config = match path {
        Some(path) => {
            info!("⚙️  Loading settings from: {}", path.display());
            let mut file_config = Config::load_from_file(path)?;
            file_config.merge_from_cli(cli_config, sub_matches);
            file_config
        }
        None => cli_config.clone(),
    };
    config.validate()?;
    Ok(config)
}
