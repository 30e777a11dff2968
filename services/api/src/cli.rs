use crate::demo::{run_demo, run_schema_catalog, DemoArgs, SchemaCatalogArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use classifieds::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Classifieds Listing Engine",
    about = "Validate, moderate and publish classified listings",
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
    /// Print the registered details schemas
    Schemas(SchemaCatalogArgs),
    /// Walk one listing from draft to moderation against in-memory storage
    Demo(DemoArgs),
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
        Command::Schemas(args) => run_schema_catalog(args),
        Command::Demo(args) => run_demo(args),
    }
}
