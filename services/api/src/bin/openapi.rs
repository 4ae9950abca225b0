//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3 document for the REST API to disk, so clients can be
//! generated without a running server.

use api_lib::web::rest::ApiDoc;
use clap::Parser;
use std::path::PathBuf;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(about = "Generate the OpenAPI document for the acrostic API")]
struct Args {
    /// Where to write the JSON document.
    #[arg(default_value = "openapi.json")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&args.output, spec_json)?;
    println!("OpenAPI document written to {}", args.output.display());
    Ok(())
}
