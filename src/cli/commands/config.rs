use clap::Subcommand;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the effective configuration (database URL omitted)")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = config();

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    &format!("{:?} configuration", config.environment),
                    Some(serde_json::json!({ "config": config })),
                ),
                OutputFormat::Text => {
                    println!("{}", serde_json::to_string_pretty(config)?);
                    println!(
                        "database: {}",
                        if config.database.url.is_some() { "postgres" } else { "in-memory" }
                    );
                    Ok(())
                }
            }
        }
    }
}
