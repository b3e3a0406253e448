use crate::error::AppError;
use crate::marketplace::catalog::PackageCatalog;
use crate::server;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "transportpro",
    about = "Run the TransportPro vehicle marketplace service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the subscription package catalog as JSON
    Packages,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Packages => print_packages(),
    }
}

fn print_packages() -> Result<(), AppError> {
    let catalog = PackageCatalog::standard();
    let rendered = serde_json::to_string_pretty(catalog.packages())?;
    println!("{rendered}");
    Ok(())
}
