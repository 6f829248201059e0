use std::sync::Arc;

use anyhow::Context;

use engine::{EngineHandle, ExecutionEngine, RuntimeConfig};
use executor::{Resolver, ScriptLoader};
use http::RuntimeState;

pub fn run(config: RuntimeConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: RuntimeConfig) -> anyhow::Result<()> {
    let function_dir = config.function_dir.clone();
    let engine = EngineHandle::spawn(move || {
        let loader = ScriptLoader::new()?;
        Ok(ExecutionEngine::new(Resolver::new(function_dir, Box::new(loader))))
    })
    .await
    .map_err(anyhow::Error::msg)?;

    tracing::info!("Function code goes to {}", config.function_dir.display());

    let addr = config.bind_addr();
    let state = Arc::new(RuntimeState {
        engine: engine.clone(),
    });
    http::serve_http(state, &addr, shutdown_signal())
        .await
        .with_context(|| format!("failed to serve on {}", addr))?;

    if let Ok(stats) = engine.stats().await {
        tracing::info!("Runtime stopped: {}", stats);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
