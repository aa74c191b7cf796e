use clap::Parser;
use tracing_subscriber::EnvFilter;

use edif::cli::{
    Cli, Command, cmd_create_user, cmd_disable_user, cmd_init, cmd_seed, cmd_serve, cmd_status,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edif=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => cmd_serve(args.into_config()).await?,
        Command::Init { database, force } => cmd_init(&database, force)?,
        Command::Seed { database } => {
            cmd_seed(&database)?;
        }
        Command::CreateUser {
            database,
            email,
            password,
            name,
            role,
        } => {
            cmd_create_user(&database, &email, &password, &name, role)?;
        }
        Command::DisableUser {
            database,
            email,
            enable,
        } => {
            cmd_disable_user(&database, &email, !enable)?;
        }
        Command::Status { database, json } => cmd_status(&database, json)?,
    }
    Ok(())
}
