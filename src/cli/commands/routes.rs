use axum::http::Method;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_success, print_table};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::handlers::HandlerRegistry;
use crate::router::{RouteTable, Router};
use crate::types::RouteVerb;

#[derive(Subcommand)]
pub enum RoutesCommands {
    #[command(about = "List routes in match order")]
    List {
        #[arg(long, help = "Route file (defaults to ROUTE_FILE)")]
        file: Option<String>,
    },

    #[command(about = "Show which handler a request would reach")]
    Match {
        #[arg(help = "HTTP method, e.g. GET or POST")]
        method: String,
        #[arg(help = "Request path, e.g. /en/backend/admin")]
        path: String,
        #[arg(long, help = "Route file (defaults to ROUTE_FILE)")]
        file: Option<String>,
    },
}

fn load(file: Option<String>) -> anyhow::Result<(RouteTable, Router)> {
    let path = file.unwrap_or_else(|| config().routing.route_file.clone());
    let table = RouteTable::load(&path)?;
    let router = Router::from_table(&table, &HandlerRegistry::with_builtins())?;
    Ok((table, router))
}

pub async fn handle(cmd: RoutesCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        RoutesCommands::List { file } => {
            let (table, router) = load(file)?;

            match output_format {
                OutputFormat::Json => {
                    output_success(
                        output_format,
                        &format!("{} routes", router.len()),
                        Some(json!({ "routes": table.routes, "modules": table.modules })),
                    )?;
                }
                OutputFormat::Text => {
                    let rows: Vec<Vec<String>> = router
                        .routes()
                        .iter()
                        .map(|r| vec![r.verb().to_string(), r.pattern().to_string(), r.target().id.clone()])
                        .collect();
                    print_table(&["VERB", "PATTERN", "HANDLER"], &rows);
                }
            }
            Ok(())
        }
        RoutesCommands::Match { method, path, file } => {
            let (_, router) = load(file)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let verb = RouteVerb::from_method(&method);

            match router.route(verb, &path) {
                Some(target) => output_success(
                    output_format,
                    &format!("{} {} -> {}", method, path, target.id),
                    Some(json!({ "handler": target.id, "verb": verb })),
                ),
                None => output_error(output_format, &format!("{} {}: no route", method, path), Some("NOT_FOUND")),
            }
        }
    }
}
