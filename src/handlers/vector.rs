//! VECTOR handler: embed the thumbnail with the vector encoder.
//!
//! Chaining to DETECTOR is reserved for a future extension and is
//! deliberately not wired here.

use crate::config::Config;
use crate::models::Job;
use crate::{domain, encoder, queue};
use pgvector::Vector;
use sqlx::PgPool;
use std::path::PathBuf;

pub async fn run(
    pool: &PgPool,
    job: &Job,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let image = domain::images::get_image(pool, job.image_id)
        .await?
        .ok_or("VECTOR: image not found")?;

    // The chain guarantees this never happens, but the handler must not
    // corrupt state if it does.
    let thumb_path = image
        .thumb
        .clone()
        .ok_or("VECTOR: image has no thumbnail yet")?;

    let clip_model = config.clip_model.clone();
    let cpu_only = config.cpu_only;
    let thumb_path_buf = PathBuf::from(&thumb_path);
    let embedding = tokio::task::spawn_blocking(move || {
        encoder::encode_image(&thumb_path_buf, &clip_model, cpu_only)
    })
    .await??;

    if embedding.len() != crate::encoder::EMBEDDING_DIM {
        return Err(format!(
            "encoder returned {} dims, expected {}",
            embedding.len(),
            crate::encoder::EMBEDDING_DIM
        )
        .into());
    }

    let vector = Vector::from(embedding);

    let mut tx = pool.begin().await?;
    domain::images::set_embeddings(&mut *tx, image.id, &vector).await?;
    queue::complete(&mut *tx, job.id).await?;
    tx.commit().await?;

    println!("[vector] image={} embedded", image.id);
    Ok(())
}
