use anyhow::Context;
use clap::{Parser, Subcommand};
use covers_app::{seed, Services};
use covers_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "covers", version, about = "Peer-to-peer book lending service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Register the demo accounts and list a few books for each
    Seed {
        /// Password given to every demo account
        #[arg(long, env = "COVERS_SEED_PASSWORD")]
        password: String,
    },
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load covers settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            covers_telemetry::init(&settings.telemetry)?;
            covers_app::serve(settings).await
        }
        Command::Seed { password } => {
            covers_telemetry::init(&settings.telemetry)?;
            if settings.database.data_dir.is_none() {
                tracing::warn!("no database.data_dir configured; seeded data will not be kept");
            }
            let services = Services::open(&settings)?;
            let report = seed::seed_demo_data(&services, &password).await?;
            println!(
                "seeded {} users ({} already present) and {} books",
                report.users_created, report.users_skipped, report.books_created
            );
            Ok(())
        }
        Command::Openapi => {
            // Stdout carries the document, so no log output here.
            let services = Services::in_memory(&settings)?;
            let spec = covers_http::router::merged_openapi(&services.registry());
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(())
        }
    }
}
