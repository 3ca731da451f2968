use clap::Subcommand;
use serde_json::json;

use crate::auth::hash_password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Print the digest stored in account_password for a password")]
    HashPassword {
        #[arg(help = "Plain-text password")]
        password: String,
    },
}

pub async fn handle(cmd: SessionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::HashPassword { password } => {
            let digest = hash_password(&password);

            match output_format {
                OutputFormat::Json => output_success(output_format, "Password hashed", Some(json!({ "digest": digest }))),
                OutputFormat::Text => {
                    println!("{}", digest);
                    Ok(())
                }
            }
        }
    }
}
