use std::sync::Arc;
use std::time::Duration;

use crate::support::helpers::{
    build_chain, full_block_data, init_tracing, new_chain, wait_for_metrics, CollectingEndpoint,
};
use crate::support::mock_chain::{MockChain, PendingBlocks};
use anyhow::{Context, Result};
use chain_sync::{Collaborators, Runner, SyncConfig, TelemetryEndpoint, TracingEndpoint};
use serde_json::Value;
use tokio::time::timeout;

fn collaborators(chain: &Arc<MockChain>) -> Collaborators {
    Collaborators {
        pending_blocks: Arc::new(PendingBlocks::default()),
        block_state: chain.clone(),
        storage_state: chain.clone(),
        transaction_state: chain.clone(),
        header_verifier: chain.clone(),
        finality_gadget: chain.clone(),
        block_import_handler: chain.clone(),
    }
}

fn test_config() -> Result<SyncConfig> {
    SyncConfig::builder()
        .ready_queue_capacity(16)
        .telemetry_queue_capacity(32)
        .metrics_interval(Duration::from_millis(20))
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_imports_blocks_and_ships_telemetry() -> Result<()> {
    init_tracing();
    let chain = new_chain();
    let endpoint = Arc::new(CollectingEndpoint::default());
    let endpoints: Vec<Arc<dyn TelemetryEndpoint>> =
        vec![endpoint.clone(), Arc::new(TracingEndpoint)];
    let mut runner = Runner::new(test_config()?, collaborators(&chain), endpoints);

    runner.start().await?;
    let queue = runner.ready_blocks();
    for (hash, block) in build_chain(3) {
        queue.push(full_block_data(hash, &block)).await;
    }

    wait_for_metrics(&runner.metrics(), Duration::from_secs(5), |snapshot| {
        snapshot.imported == 3
    })
    .await?;
    runner.stop().await?;

    assert_eq!(chain.import_log(), vec![1, 2, 3]);
    let payloads = endpoint.payloads();
    assert_eq!(payloads.len(), 3, "mailer drains queued telemetry on shutdown");
    let last: Value = serde_json::from_str(&payloads[2])?;
    assert_eq!(last["msg"], "block.import");
    assert_eq!(last["height"], 3);
    assert_eq!(last["origin"], "NetworkInitialSync");
    assert!(last["ts"].as_u64().is_some());
    assert_eq!(runner.telemetry().dropped(), 0);
    Ok(())
}

#[tokio::test]
async fn runner_is_single_use() -> Result<()> {
    init_tracing();
    let chain = new_chain();
    let mut runner = Runner::new(test_config()?, collaborators(&chain), Vec::new());

    runner.stop().await.context("stop before start is a no-op")?;
    runner.start().await?;
    assert!(runner.start().await.is_err(), "second start must fail");
    runner.stop().await?;
    runner.stop().await.context("second stop is a no-op")?;

    let err = runner
        .start()
        .await
        .expect_err("a stopped runner cannot restart");
    assert!(format!("{err}").contains("cannot be restarted"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_exits_on_runtime_panic() -> Result<()> {
    init_tracing();
    let chain = new_chain();
    chain.panic_at(Some(2));
    let mut runner = Runner::new(test_config()?, collaborators(&chain), Vec::new());

    let queue = runner.ready_blocks();
    for (hash, block) in build_chain(3) {
        queue.push(full_block_data(hash, &block)).await;
    }

    let outcome = timeout(Duration::from_secs(5), runner.run_until_ctrl_c())
        .await
        .context("runner should stop after a runtime panic")?;

    let err = outcome.expect_err("panic should abort the runner");
    let message = format!("{err:#}");
    assert!(
        message.contains("chain processor aborted"),
        "runner did not propagate the panic, got {message}"
    );
    assert_eq!(chain.import_log(), vec![1]);
    assert!(queue.has(&build_chain(3)[2].0), "items after the panic stay queued");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_the_root_token_stops_run_until_ctrl_c() -> Result<()> {
    init_tracing();
    let chain = new_chain();
    let mut runner = Runner::new(test_config()?, collaborators(&chain), Vec::new());
    let token = runner.cancellation_token();

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    timeout(Duration::from_secs(5), runner.run_until_ctrl_c())
        .await
        .context("runner should observe external cancellation")??;
    cancel.await?;
    Ok(())
}
