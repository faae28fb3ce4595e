//! Print the OpenAPI document of the HTTP API to stdout.

use anyhow::Context;
use brain_ring_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    let json = doc
        .to_pretty_json()
        .context("serializing the OpenAPI document")?;
    println!("{json}");
    Ok(())
}
