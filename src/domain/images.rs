//! Image domain — DB queries for the `image` table.
//!
//! All functions use the generic executor pattern (`domain::captures`'
//! convention in this codebase), so they work with both `&PgPool` and
//! `&mut PgConnection` inside a transaction.

use crate::models::Image;
use pgvector::Vector;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

/// Insert a freshly uploaded image row with no thumbnail/embeddings yet.
pub async fn insert_image<'e, E>(
    executor: E,
    id: Uuid,
    name: &str,
    path: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO image (id, name, path)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(path)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_image<'e, E>(executor: E, id: Uuid) -> Result<Option<Image>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, name, path, thumb, tags, embeddings, created_at, updated_at, uploaded_by
        FROM image
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn set_thumb<'e, E>(executor: E, id: Uuid, thumb_path: &str) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE image
        SET thumb = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(thumb_path)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_embeddings<'e, E>(
    executor: E,
    id: Uuid,
    embeddings: &Vector,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE image
        SET embeddings = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(embeddings)
    .execute(executor)
    .await?;
    Ok(())
}

/// Patch `name`/`tags`. `None` leaves the field untouched. Returns the
/// updated row, or `None` if the image doesn't exist.
pub async fn update_image<'e, E>(
    executor: E,
    id: Uuid,
    name: Option<&str>,
    tags: Option<&[String]>,
) -> Result<Option<Image>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        UPDATE image
        SET name = COALESCE($2, name),
            tags = COALESCE($3, tags),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, path, thumb, tags, embeddings, created_at, updated_at, uploaded_by
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(tags)
    .fetch_optional(executor)
    .await
}

/// Delete the image row, returning it so the caller can remove its
/// on-disk artifacts. Cascade-deletes its `serviceq` rows.
pub async fn delete_image<'e, E>(executor: E, id: Uuid) -> Result<Option<Image>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        DELETE FROM image
        WHERE id = $1
        RETURNING id, name, path, thumb, tags, embeddings, created_at, updated_at, uploaded_by
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

#[derive(Debug, sqlx::FromRow)]
struct CountResult {
    count: i64,
}

/// Paginated list, ordered by `id` ascending (time-ordered by construction
/// since `id` is a UUIDv7).
pub async fn list_images(
    pool: &sqlx::PgPool,
    page: i64,
    page_size: i64,
) -> Result<(Vec<Image>, i64), sqlx::Error> {
    let offset = (page - 1) * page_size;

    let items: Vec<Image> = sqlx::query_as(
        r#"
        SELECT id, name, path, thumb, tags, embeddings, created_at, updated_at, uploaded_by
        FROM image
        ORDER BY id ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let count: CountResult = sqlx::query_as("SELECT COUNT(*) as count FROM image")
        .fetch_one(pool)
        .await?;

    Ok((items, count.count))
}

/// A search hit: the image plus its cosine distance to the query vector.
#[derive(Debug)]
pub struct SearchHit {
    pub image: Image,
    pub distance: f64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SearchHit {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(SearchHit {
            image: Image {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                path: row.try_get("path")?,
                thumb: row.try_get("thumb")?,
                tags: row.try_get("tags")?,
                embeddings: row.try_get("embeddings")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                uploaded_by: row.try_get("uploaded_by")?,
            },
            distance: row.try_get("distance")?,
        })
    }
}

/// Images ordered by ascending cosine distance to `query`, filtered to
/// `distance < threshold`. Images with no embedding yet never match (the
/// `<=>` operator requires both sides non-null).
pub async fn search_by_vector(
    pool: &sqlx::PgPool,
    query: &Vector,
    threshold: f32,
    page: i64,
    page_size: i64,
) -> Result<Vec<SearchHit>, sqlx::Error> {
    let offset = (page - 1) * page_size;

    sqlx::query_as(
        r#"
        SELECT id, name, path, thumb, tags, embeddings, created_at, updated_at, uploaded_by,
               (embeddings <=> $1) AS distance
        FROM image
        WHERE embeddings IS NOT NULL
          AND (embeddings <=> $1) < $2
        ORDER BY distance ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(query)
    .bind(threshold as f64)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await
}
