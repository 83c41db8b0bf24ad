mod cli;
mod initializers;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use blobgate_common::kzg::KzgBackend;
use blobgate_proxy::api::{self, ApiContext};
use blobgate_proxy::completer::CompletionWorker;
use blobgate_proxy::config::{EthConfig, ProxyConfig, SignerConfig};
use blobgate_proxy::coordinator::Coordinator;
use blobgate_proxy::escrow::{EscrowApi, EscrowClient};
use blobgate_proxy::submitter::BlobTxEngine;
use blobgate_rpc::{EthClient, FeeOracle};

use crate::cli::CLI;
use crate::initializers::{init_store, init_tracing, read_env_file};

/// Fallback when the escrow does not answer `jobTimeout()`.
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// How long in-flight work may drain after a shutdown signal.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

const COMPLETER_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let CLI { opts } = CLI::parse();

    init_tracing(&opts);
    read_env_file(&opts.env_file)?;

    let eth_config = EthConfig::from_env()?;
    let proxy_config = ProxyConfig::from_env()?;
    let signer_config = SignerConfig::from_env()?;

    let eth_client = EthClient::new_with_urls(eth_config.rpc_urls())?;

    // Fail fast when the RPC is unreachable; a proxy that cannot read the
    // escrow must not accept prepaid work.
    let chain_id = match proxy_config.chain_id {
        Some(chain_id) => chain_id,
        None => eth_client
            .get_chain_id()
            .await
            .map_err(|error| eyre::eyre!("cannot reach the RPC endpoint: {error}"))?
            .low_u64(),
    };
    info!(chain_id, "connected to chain");

    let signer = signer_config.build().await?;
    info!(proxy_address = %signer.address(), "signer ready");

    let kzg = KzgBackend::initialize();

    let tx_timeout = Duration::from_millis(proxy_config.tx_timeout_ms);
    let escrow = Arc::new(EscrowClient::new(
        eth_client.clone(),
        proxy_config.escrow_contract,
        signer.clone(),
        chain_id,
        tx_timeout,
    ));

    if !escrow.is_proxy_authorized(signer.address()).await? {
        eyre::bail!(
            "proxy {:#x} is not authorized by escrow {:#x}",
            signer.address(),
            proxy_config.escrow_contract
        );
    }

    let job_timeout = match escrow.job_timeout().await {
        Ok(job_timeout) => job_timeout,
        Err(error) => {
            warn!(%error, "could not read jobTimeout, using the default");
            DEFAULT_JOB_TIMEOUT_SECS
        }
    };

    let store_path = opts
        .store_path
        .unwrap_or_else(|| proxy_config.store_path.clone());
    let store = init_store(&store_path)?;

    let oracle = FeeOracle::new(eth_client.clone(), proxy_config.eip7918);
    let engine = Arc::new(BlobTxEngine::new(
        eth_client.clone(),
        oracle,
        signer.clone(),
        kzg,
        chain_id,
        tx_timeout,
    ));
    let coordinator = Arc::new(Coordinator::new(
        escrow.clone(),
        engine,
        store.clone(),
        job_timeout,
    ));

    // completion retry workers, independent of the request path
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    for _ in 0..proxy_config.completer_workers {
        let worker = CompletionWorker::new(
            escrow.clone() as Arc<dyn EscrowApi>,
            store.clone(),
            COMPLETER_POLL_INTERVAL,
        );
        tracker.spawn(worker.run(token.clone()));
    }
    tracker.close();

    let http_addr = opts.http_addr.unwrap_or_else(|| proxy_config.http_addr.clone());
    let context = ApiContext {
        coordinator,
        eth_client,
        chain_id,
        escrow_contract: proxy_config.escrow_contract,
        proxy_fee_percent: proxy_config.fee_percent,
    };

    let server_token = token.clone();
    let server = tokio::spawn(async move {
        api::start_api(&http_addr, context, async move {
            server_token.cancelled().await;
        })
        .await
    });

    shutdown_signal().await;
    info!("shutdown signal received, draining");
    token.cancel();

    match tokio::time::timeout(SHUTDOWN_DRAIN, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => error!(%error, "HTTP server error"),
        Ok(Err(error)) => error!(%error, "HTTP server task panicked"),
        Err(_) => {
            warn!("drain window elapsed, forcing exit");
            std::process::exit(1);
        }
    }

    tracker.wait().await;
    info!("bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await.expect("failed to install Ctrl+C handler");
}
