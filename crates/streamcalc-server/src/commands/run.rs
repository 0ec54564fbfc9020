/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Process modes: `api`, `worker` and `all`.
//!
//! Each mode opens its own named client handles through one [`Connector`],
//! installs a signal listener that fires the shared shutdown signal, and
//! returns once everything it started has stopped.

use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use streamcalc::backend::{BackendError, BackendType, Connector, Handles};
use streamcalc::config::{StreamcalcConfig, Validate};
use streamcalc::connection::ConnectionError;
use streamcalc::consumer::{ConsumerLoop, HandlerRegistry};
use streamcalc::shutdown::{self, Shutdown, ShutdownTrigger};
use streamcalc_server::{router, AppState};
use tracing::{error, info, warn};

pub async fn api(config: StreamcalcConfig, port: Option<u16>) -> Result<()> {
    let (connector, trigger, shutdown) = prepare(&config)?;
    if connector.backend_type() == BackendType::Memory {
        warn!("API running with the memory backend and no worker; submitted tasks will never complete");
    }
    listen_for_signals(trigger);

    let Some(handles) = connect(&connector, "api", &shutdown).await? else {
        return Ok(());
    };
    serve(&config, port, handles, shutdown).await
}

pub async fn worker(config: StreamcalcConfig) -> Result<()> {
    let (connector, trigger, shutdown) = prepare(&config)?;
    if connector.backend_type() == BackendType::Memory {
        warn!("Worker running with the memory backend; nothing else can submit tasks to it");
    }
    listen_for_signals(trigger);

    let Some(consumer) = build_consumer(&config, &connector, &shutdown).await? else {
        return Ok(());
    };
    consumer.run(shutdown).await;
    Ok(())
}

pub async fn all(config: StreamcalcConfig, port: Option<u16>) -> Result<()> {
    let (connector, trigger, shutdown) = prepare(&config)?;
    listen_for_signals(trigger.clone());

    let Some(consumer) = build_consumer(&config, &connector, &shutdown).await? else {
        return Ok(());
    };
    let Some(handles) = connect(&connector, "api", &shutdown).await? else {
        return Ok(());
    };

    let consumer = tokio::spawn(consumer.run(shutdown.clone()));
    let served = serve(&config, port, handles, shutdown).await;

    // Serving returns early on error; the consumer has to stop either way.
    trigger.trigger();
    let stats = consumer.await.context("Consumer task failed")?;
    info!(
        "Consumer finished: {} processed, {} skipped, {} failures",
        stats.processed, stats.skipped, stats.failures
    );
    served
}

fn prepare(config: &StreamcalcConfig) -> Result<(Connector, Arc<ShutdownTrigger>, Shutdown)> {
    config.validate().context("Invalid configuration")?;

    let connector = Connector::new(config.redis.url(), config.redis.retry_policy())
        .context("Invalid Redis connection settings")?;
    let (trigger, shutdown) = shutdown::channel();
    Ok((connector, Arc::new(trigger), shutdown))
}

/// Opens named handles; `None` when shutdown interrupted the retry loop.
async fn connect(connector: &Connector, name: &str, shutdown: &Shutdown) -> Result<Option<Handles>> {
    match connector.connect(name, shutdown).await {
        Ok(handles) => Ok(Some(handles)),
        Err(BackendError::Connection(ConnectionError::Cancelled)) => {
            info!("Shutdown requested before the {} client connected", name);
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open {} client", name)),
    }
}

/// The consumer reads on its own connection and publishes on another.
async fn build_consumer(
    config: &StreamcalcConfig,
    connector: &Connector,
    shutdown: &Shutdown,
) -> Result<Option<ConsumerLoop>> {
    let Some(worker) = connect(connector, "worker", shutdown).await? else {
        return Ok(None);
    };
    let Some(result) = connect(connector, "result", shutdown).await? else {
        return Ok(None);
    };

    Ok(Some(ConsumerLoop::new(
        worker.log,
        result.store,
        HandlerRegistry::with_defaults(),
        config.consumer_config(),
    )))
}

async fn serve(
    config: &StreamcalcConfig,
    port: Option<u16>,
    handles: Handles,
    shutdown: Shutdown,
) -> Result<()> {
    let state = AppState::new(handles, config.redis.stream_key.clone(), config.wait_options());
    let addr = format!(
        "{}:{}",
        config.server.bind_address,
        port.unwrap_or(config.server.port)
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    info!("Server running on {}", addr);

    let graceful = {
        let shutdown = shutdown.clone();
        async move { shutdown.wait().await }
    };
    let mut server = tokio::spawn(
        axum::serve(listener, router(state))
            .with_graceful_shutdown(graceful)
            .into_future(),
    );

    let grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    tokio::select! {
        joined = &mut server => {
            joined.context("HTTP server task failed")?.context("HTTP server error")?;
        }
        _ = async { shutdown.wait().await; tokio::time::sleep(grace).await } => {
            warn!("In-flight requests did not finish within {}s; closing", grace.as_secs());
            server.abort();
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Fires `trigger` on Ctrl+C or SIGTERM.
fn listen_for_signals(trigger: Arc<ShutdownTrigger>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        info!("Received shutdown signal");
        trigger.trigger();
    });
}
