mod config;
mod platform;

use rag_logging::{rag_info, rag_warn, redact};

use config::AppConfig;
use platform::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Warning: could not read .env: {err}");
        }
    }

    let config = AppConfig::from_env()?;
    logging::initialize(config.log);

    let engine = &config.engine;
    rag_info!(
        "weaviate url={} key={} google key={} collection={}",
        engine.weaviate.url.as_deref().unwrap_or("<unset>"),
        redact(engine.weaviate.api_key.as_deref().unwrap_or_default()),
        redact(engine.gemini.api_key.as_deref().unwrap_or_default()),
        engine.collection
    );
    if engine.weaviate.url.is_none() || engine.gemini.api_key.is_none() {
        rag_warn!("service credentials missing; loads and answers will report errors");
    }

    platform::app::run(config).await
}
