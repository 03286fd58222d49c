//! Worker dispatcher: a long-running control loop that claims jobs, bounds
//! concurrency with a semaphore, dispatches to per-type handlers, and shuts
//! down gracefully draining in-flight work.
//!
//! Structurally this is the same shape as `thumbnails::run_thumbnail_worker`
//! / `process_thumbnail_batch` in this codebase (a `JoinSet` of claimed
//! work, drained on exit) generalized from a cron-triggered batch into a
//! continuously-polling loop.

use crate::config::Config;
use crate::handlers;
use crate::queue;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Poll and dispatch until `shutdown` is signalled. Handler tasks already
/// launched are awaited to completion (not interrupted mid-flight) before
/// this returns, preserving the transactional discipline handlers depend on.
pub async fn run(pool: PgPool, config: Arc<Config>, mut shutdown: watch::Receiver<bool>) {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    let mut tasks: JoinSet<()> = JoinSet::new();

    println!(
        "[dispatcher] started (poll_interval={:?}, concurrency={})",
        config.poll_interval, config.max_concurrent_jobs
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Gate on the semaphore *before* issuing the claim: the semaphore
        // throttles launch, not claim, but a claimed-and-unrun job must
        // never be possible, so we only claim once a slot is free.
        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            permit = semaphore.clone().acquire_owned() => {
                permit.expect("dispatcher semaphore is never closed")
            }
        };

        match queue::claim_next(&pool).await {
            Ok(Some(job)) => {
                let job_pool = pool.clone();
                let job_config = config.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    handlers::handle_job(job_pool, job, job_config).await;
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(e) => {
                eprintln!("[dispatcher] claim error: {}", e);
                drop(permit);
                tokio::time::sleep(config.poll_interval).await;
            }
        }

        reap_finished(&mut tasks);
    }

    println!(
        "[dispatcher] stopping, draining {} in-flight job(s)",
        tasks.len()
    );
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            eprintln!("[dispatcher] handler task panicked during drain: {}", e);
        }
    }
    println!("[dispatcher] shut down cleanly");
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            eprintln!("[dispatcher] handler task panicked: {}", e);
        }
    }
}
