use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use eco_funnel::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Grant Eligibility Funnel",
    about = "Run and demonstrate the home-energy grant eligibility funnel from the command line",
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
    /// Resolve a single certificate against the live registry
    Check(CheckArgs),
    /// Run a scripted applicant journey against in-memory collaborators
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

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Postcode to resolve
    #[arg(long)]
    pub(crate) postcode: String,
    /// Optional unique property reference (preferred over address matching)
    #[arg(long)]
    pub(crate) property_ref: Option<String>,
    /// Optional address label for similarity matching
    #[arg(long)]
    pub(crate) address: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Check(args) => server::run_check(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
