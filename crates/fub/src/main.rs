use std::sync::Arc;

use fub_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), fub_core::Error> {
    fub_core::logging::init("fub")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };

    let host = fub_hosts::build_host(&cfg)?;

    fub_telegram::router::run_polling(cfg, host)
        .await
        .map_err(|e| fub_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
