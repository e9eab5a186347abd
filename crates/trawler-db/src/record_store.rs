use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use trawler_core::error::ScrapeError;
use trawler_core::record::{NewRecord, RecordMetadata, ScrapedRecord};
use trawler_core::traits::{DataStore, RecordQuery};

/// PostgreSQL-backed append-only [`DataStore`].
#[derive(Clone)]
pub struct PgDataStore {
    pool: Pool<Postgres>,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    job_id: Uuid,
    url: String,
    scraped_at: DateTime<Utc>,
    data: serde_json::Value,
    data_size: i64,
    content_hash: String,
}

impl From<RecordRow> for ScrapedRecord {
    fn from(row: RecordRow) -> Self {
        ScrapedRecord {
            id: row.id,
            job_id: row.job_id,
            url: row.url.clone(),
            scraped_at: row.scraped_at,
            data: row.data,
            metadata: RecordMetadata {
                job_id: row.job_id,
                url: row.url,
                data_size: row.data_size as usize,
                content_hash: row.content_hash,
            },
        }
    }
}

fn db_err(e: sqlx::Error) -> ScrapeError {
    ScrapeError::Storage(e.to_string())
}

const RECORD_COLUMNS: &str = "id, job_id, url, scraped_at, data, data_size, content_hash";

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &RecordQuery) {
    if let Some(job_id) = query.job_id {
        builder.push(" AND job_id = ").push_bind(job_id);
    }
    if let Some(url) = &query.url {
        builder.push(" AND url = ").push_bind(url.clone());
    }
}

impl DataStore for PgDataStore {
    async fn append(&self, record: &NewRecord) -> Result<Uuid, ScrapeError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO scraped_records (job_id, url, data, data_size, content_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(record.job_id)
        .bind(&record.url)
        .bind(&record.data)
        .bind(record.data_size as i64)
        .bind(&record.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(id)
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<ScrapedRecord>, ScrapeError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, job_id, url, scraped_at, data, data_size, content_hash
            FROM scraped_records
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<ScrapedRecord>, ScrapeError> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {RECORD_COLUMNS} FROM scraped_records WHERE TRUE"
        ));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY scraped_at DESC");
        if query.limit > 0 {
            builder.push(" LIMIT ").push_bind(query.limit as i64);
        }
        if query.offset > 0 {
            builder.push(" OFFSET ").push_bind(query.offset as i64);
        }

        let rows: Vec<RecordRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, ScrapeError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM scraped_records WHERE TRUE");
        push_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count as u64)
    }
}
