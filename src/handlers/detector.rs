//! DETECTOR handler: currently a no-op reserved for object-detection
//! metadata.

use crate::models::Job;
use crate::queue;
use sqlx::PgPool;

pub async fn run(
    pool: &PgPool,
    job: &Job,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("[detector] no-op for image={}", job.image_id);

    let mut tx = pool.begin().await?;
    queue::complete(&mut *tx, job.id).await?;
    tx.commit().await?;
    Ok(())
}
