//! Core data model: images and their background-processing jobs.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use uuid::Uuid;

/// A stage in the per-image processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "service_type", rename_all = "UPPERCASE")]
pub enum ServiceType {
    Thumb,
    Vector,
    Detector,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Thumb => "THUMB",
            ServiceType::Vector => "VECTOR",
            ServiceType::Detector => "DETECTOR",
        }
    }
}

/// Lifecycle state of a queued job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "service_status", rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A row in the `image` table.
///
/// Not `Serialize` directly — routes project this into response DTOs
/// (see `routes::images`), the same separation `domain::captures` keeps
/// between its `CaptureRow` and the route layer's `CaptureItem`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub thumb: Option<String>,
    pub tags: Vec<String>,
    pub embeddings: Option<Vector>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub uploaded_by: Option<Uuid>,
}

/// A row in the `serviceq` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub image_id: Uuid,
    pub service_type: ServiceType,
    pub status: ServiceStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
