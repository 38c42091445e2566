//! Prints the compiled OpenAPI document as pretty JSON, for committing
//! alongside the repo or feeding to client generators.
//!
//! Usage:
//!   cargo run --bin generate_openapi                # to stdout
//!   cargo run --bin generate_openapi -- openapi.json

use std::io::Write;

use energy_telemetry_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let json = ApiDoc::openapi().to_pretty_json()?;

    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, &json)?;
            eprintln!("OpenAPI spec written to {path}");
        }
        None => std::io::stdout().write_all(json.as_bytes())?,
    }

    Ok(())
}
