//! Per-service-type job handlers and the error-to-job-state boundary.
//!
//! The dispatcher never sees handler errors directly: `handle_job` captures
//! them, logs with full context, and reflects them into job state via
//! `queue::fail`'s conditional retry/exhaust semantics.

mod detector;
mod thumb;
mod vector;

use crate::config::Config;
use crate::models::{Job, ServiceType};
use crate::queue;
use sqlx::PgPool;

pub async fn handle_job(pool: PgPool, job: Job, config: std::sync::Arc<Config>) {
    let result = match job.service_type {
        ServiceType::Thumb => thumb::run(&pool, &job, &config).await,
        ServiceType::Vector => vector::run(&pool, &job, &config).await,
        ServiceType::Detector => detector::run(&pool, &job).await,
    };

    if let Err(e) = result {
        eprintln!(
            "[handlers] job {} ({}) failed: {}",
            job.id,
            job.service_type.as_str(),
            e
        );
        // A fresh connection: the failed handler's own transaction (if any
        // got that far) was already rolled back by never being committed.
        if let Err(fail_err) = queue::fail(&pool, job.id).await {
            eprintln!(
                "[handlers] CRITICAL: failed to mark job {} as failed: {}",
                job.id, fail_err
            );
        }
    }
}
