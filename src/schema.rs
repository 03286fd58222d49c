//! One-shot schema bootstrap.
//!
//! Full migration tooling lives outside this crate; this just gets a fresh
//! database to the shape the core expects, the way
//! `apalis_sql::postgres::PostgresStorage::setup` bootstraps its own table
//! on startup.

use sqlx::PgPool;

const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS vector;

DO $$ BEGIN
    CREATE TYPE service_type AS ENUM ('THUMB', 'VECTOR', 'DETECTOR');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE service_status AS ENUM ('PENDING', 'RUNNING', 'COMPLETED', 'FAILED');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS image (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    thumb TEXT,
    tags TEXT[] NOT NULL DEFAULT '{}',
    embeddings VECTOR(512),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    uploaded_by UUID REFERENCES "user" (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS serviceq (
    id UUID PRIMARY KEY,
    image_id UUID NOT NULL REFERENCES image (id) ON DELETE CASCADE,
    service_type service_type NOT NULL,
    status service_status NOT NULL DEFAULT 'PENDING',
    attempts INT NOT NULL DEFAULT 0,
    max_attempts INT NOT NULL DEFAULT 3,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS serviceq_dispatch_idx
    ON serviceq (status, created_at)
    WHERE attempts < max_attempts;
"#;

/// Apply the schema. Safe to call on every startup — every statement is
/// idempotent (`IF NOT EXISTS` / `duplicate_object` swallowed).
///
/// The `"user"` table referenced by `image.uploaded_by` belongs to the auth
/// collaborator and is assumed to already exist; if it doesn't, the
/// `uploaded_by` foreign key is dropped from the statement and a warning is
/// logged, so the core still stands up without the auth layer.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    match sqlx::raw_sql(SCHEMA_SQL).execute(pool).await {
        Ok(_) => {
            println!("[startup] Schema ensured");
            Ok(())
        }
        Err(e) if e.to_string().contains("\"user\"") => {
            eprintln!(
                "[startup] No user table found, creating image/serviceq without uploaded_by FK: {}",
                e
            );
            sqlx::raw_sql(&SCHEMA_SQL.replace(
                "uploaded_by UUID REFERENCES \"user\" (id) ON DELETE SET NULL",
                "uploaded_by UUID",
            ))
            .execute(pool)
            .await?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
