//! THUMB handler: down-sample the original into a thumbnail, chain-enqueue
//! the VECTOR stage.

use crate::config::Config;
use crate::models::{Job, ServiceType};
use crate::{domain, queue, storage, thumbnailer};
use sqlx::PgPool;
use std::path::Path;

pub async fn run(
    pool: &PgPool,
    job: &Job,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let image = domain::images::get_image(pool, job.image_id)
        .await?
        .ok_or("THUMB: image not found")?;

    // CPU-bound decode/resize happens off the event loop inside
    // `generate_to_file`; no DB transaction is open while it runs.
    let output_path = storage::thumb_path_for(&config.upload_dir, Path::new(&image.path));
    thumbnailer::generate_to_file(Path::new(&image.path), &output_path).await?;
    let thumb_path = output_path.to_string_lossy().into_owned();

    let mut tx = pool.begin().await?;
    domain::images::set_thumb(&mut *tx, image.id, &thumb_path).await?;
    queue::enqueue(&mut *tx, image.id, ServiceType::Vector).await?;
    queue::complete(&mut *tx, job.id).await?;
    tx.commit().await?;

    println!("[thumb] image={} -> {}", image.id, thumb_path);
    Ok(())
}
