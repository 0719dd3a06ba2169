//! PostgreSQL-backed `MetadataStore`, grounded on the reference pack's
//! `PgFileStorageRepository` (parameterized `sqlx::query`, row-to-struct
//! mapping, `Transaction`-taking variants for callers that need atomicity
//! with a second write).
//!
//! Statistics writes must be co-transactional with the metadata write that
//! triggered them (spec §4.6, §9 Open Question iii). [`MetadataStoreExt`]
//! exposes the three combined operations the interceptor chain's Metadata
//! and Statistics stages use; the plain [`MetadataStore`] methods remain
//! available for reads and for operations with no stats side effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{MetadataStore, Paging};
use crate::error::GatewayResult;
use crate::model::{FileCategory, FileMetadata, StorageType, Visibility};
use crate::stats::StatsDelta;

pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresMetadataStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_metadata(row: &sqlx::postgres::PgRow) -> FileMetadata {
    let storage_type: String = row.get("storage_type");
    let visibility: String = row.get("visibility");
    let tags: Vec<String> = row
        .try_get::<Option<String>, _>("tags")
        .ok()
        .flatten()
        .map(|s| s.split(',').filter(|t| !t.is_empty()).map(|t| t.to_string()).collect())
        .unwrap_or_default();

    FileMetadata {
        file_id: row.get("file_id"),
        family_id: row.get("family_id"),
        owner_id: row.get("owner_id"),
        original_name: row.get("original_name"),
        folder_path: row.get("folder_path"),
        file_type: row.get("file_type"),
        file_size: row.get::<i64, _>("file_size") as u64,
        storage_type: if storage_type == "object" {
            StorageType::Object
        } else {
            StorageType::Local
        },
        storage_path: row.get("storage_path"),
        visibility: Visibility::parse(&visibility).unwrap_or(Visibility::Private),
        description: row.get("description"),
        tags,
        create_time: row.get("create_time"),
        update_time: row.get("update_time"),
        upload_time: row.get("upload_time"),
        last_access_time: row.get("last_access_time"),
        access_count: row.get::<i64, _>("access_count") as u64,
        deleted: row.get("deleted"),
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn save(&self, mut metadata: FileMetadata) -> GatewayResult<FileMetadata> {
        let now = Utc::now();
        metadata.create_time = now;
        metadata.update_time = now;

        sqlx::query(
            r#"INSERT INTO file_metadata
               (file_id, family_id, owner_id, original_name, folder_path, file_type,
                file_size, storage_type, storage_path, visibility, description, tags,
                create_time, update_time, upload_time, last_access_time, access_count, deleted)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)"#,
        )
        .bind(metadata.file_id)
        .bind(&metadata.family_id)
        .bind(&metadata.owner_id)
        .bind(&metadata.original_name)
        .bind(&metadata.folder_path)
        .bind(&metadata.file_type)
        .bind(metadata.file_size as i64)
        .bind(storage_type_str(metadata.storage_type))
        .bind(&metadata.storage_path)
        .bind(visibility_str(metadata.visibility))
        .bind(&metadata.description)
        .bind(metadata.tags.join(","))
        .bind(metadata.create_time)
        .bind(metadata.update_time)
        .bind(metadata.upload_time)
        .bind(metadata.last_access_time)
        .bind(metadata.access_count as i64)
        .bind(metadata.deleted)
        .execute(&self.pool)
        .await?;

        Ok(metadata)
    }

    async fn update(&self, mut metadata: FileMetadata) -> GatewayResult<FileMetadata> {
        metadata.update_time = Utc::now();
        sqlx::query(
            r#"UPDATE file_metadata SET
               original_name = $2, folder_path = $3, file_type = $4, file_size = $5,
               storage_type = $6, storage_path = $7, visibility = $8, description = $9,
               tags = $10, update_time = $11
               WHERE file_id = $1"#,
        )
        .bind(metadata.file_id)
        .bind(&metadata.original_name)
        .bind(&metadata.folder_path)
        .bind(&metadata.file_type)
        .bind(metadata.file_size as i64)
        .bind(storage_type_str(metadata.storage_type))
        .bind(&metadata.storage_path)
        .bind(visibility_str(metadata.visibility))
        .bind(&metadata.description)
        .bind(metadata.tags.join(","))
        .bind(metadata.update_time)
        .execute(&self.pool)
        .await?;
        Ok(metadata)
    }

    async fn find_active(&self, file_id: Uuid, family_id: &str) -> GatewayResult<Option<FileMetadata>> {
        let row = sqlx::query(
            "SELECT * FROM file_metadata WHERE file_id = $1 AND family_id = $2 AND deleted = false",
        )
        .bind(file_id)
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_metadata))
    }

    async fn find_by_id(&self, file_id: Uuid) -> GatewayResult<Option<FileMetadata>> {
        let row = sqlx::query("SELECT * FROM file_metadata WHERE file_id = $1")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_metadata))
    }

    async fn soft_delete(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()> {
        sqlx::query("UPDATE file_metadata SET deleted = true, update_time = $2 WHERE file_id = $1")
            .bind(file_id)
            .bind(ts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_access_count(&self, file_id: Uuid, ts: DateTime<Utc>) -> GatewayResult<()> {
        sqlx::query(
            "UPDATE file_metadata SET access_count = access_count + 1, last_access_time = $2 WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_active(
        &self,
        family_id: &str,
        keyword: &str,
        paging: Paging,
    ) -> GatewayResult<Vec<FileMetadata>> {
        let like = format!("%{}%", keyword.to_ascii_lowercase());
        let limit = if paging.limit == 0 { 50 } else { paging.limit } as i64;
        let rows = sqlx::query(
            r#"SELECT * FROM file_metadata
               WHERE family_id = $1 AND deleted = false
                 AND (LOWER(original_name) LIKE $2 OR LOWER(COALESCE(description, '')) LIKE $2
                      OR LOWER(tags) LIKE $2)
               ORDER BY upload_time DESC
               OFFSET $3 LIMIT $4"#,
        )
        .bind(family_id)
        .bind(&like)
        .bind(paging.offset as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_metadata).collect())
    }

    /// Rows whose `folder_path` is `folder_path` itself or a strict
    /// extension of it — the caller (`FileStorageService::list`) splits this
    /// into the folder's own files and its sub-folder names (spec §4.7).
    async fn list_active(&self, family_id: &str, folder_path: &str) -> GatewayResult<Vec<FileMetadata>> {
        let base = folder_path.trim_end_matches('/');
        let sub_prefix = if base.is_empty() { "/".to_string() } else { format!("{base}/") };
        let sub_pattern = format!("{sub_prefix}%");

        let rows = sqlx::query(
            "SELECT * FROM file_metadata WHERE family_id = $1 AND deleted = false \
             AND (folder_path = $2 OR folder_path LIKE $3)",
        )
        .bind(family_id)
        .bind(folder_path)
        .bind(sub_pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_metadata).collect())
    }

    async fn count_active_by_family(&self, family_id: &str) -> GatewayResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM file_metadata WHERE family_id = $1 AND deleted = false",
        )
        .bind(family_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn sum_size_by_family(&self, family_id: &str) -> GatewayResult<u64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(file_size), 0) AS total FROM file_metadata WHERE family_id = $1 AND deleted = false",
        )
        .bind(family_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("total") as u64)
    }

    async fn count_by_type_by_family(
        &self,
        family_id: &str,
    ) -> GatewayResult<std::collections::BTreeMap<FileCategory, u64>> {
        let rows = sqlx::query(
            "SELECT * FROM file_metadata WHERE family_id = $1 AND deleted = false",
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;
        let active: Vec<FileMetadata> = rows.iter().map(row_to_metadata).collect();
        let mut counts = std::collections::BTreeMap::new();
        for category in FileCategory::all() {
            counts.insert(category, 0);
        }
        for m in active {
            *counts.entry(m.category()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn largest_active_file(
        &self,
        family_id: &str,
    ) -> GatewayResult<Option<(String, u64, DateTime<Utc>)>> {
        let row = sqlx::query(
            "SELECT original_name, file_size, upload_time FROM file_metadata \
             WHERE family_id = $1 AND deleted = false \
             ORDER BY file_size DESC, upload_time DESC LIMIT 1",
        )
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            (
                r.get::<String, _>("original_name"),
                r.get::<i64, _>("file_size") as u64,
                r.get::<DateTime<Utc>, _>("upload_time"),
            )
        }))
    }

    async fn most_recent_upload_time(&self, family_id: &str) -> GatewayResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT MAX(upload_time) AS latest FROM file_metadata WHERE family_id = $1 AND deleted = false",
        )
        .bind(family_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<Option<DateTime<Utc>>, _>("latest"))
    }
}

fn storage_type_str(t: StorageType) -> &'static str {
    match t {
        StorageType::Local => "local",
        StorageType::Object => "object",
    }
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Private => "PRIVATE",
        Visibility::Family => "FAMILY",
        Visibility::Public => "PUBLIC",
    }
}

/// Combined metadata + statistics writes executed inside one transaction
/// (spec §4.6, §9 Open Question iii).
#[async_trait]
pub trait MetadataStoreExt: MetadataStore {
    async fn save_with_stats(
        &self,
        metadata: FileMetadata,
        delta: StatsDelta,
    ) -> GatewayResult<FileMetadata>;

    async fn soft_delete_with_stats(
        &self,
        file_id: Uuid,
        family_id: &str,
        ts: DateTime<Utc>,
        delta: StatsDelta,
    ) -> GatewayResult<()>;

    async fn update_with_stats(
        &self,
        metadata: FileMetadata,
        delta: StatsDelta,
    ) -> GatewayResult<FileMetadata>;
}

#[async_trait]
impl MetadataStoreExt for PostgresMetadataStore {
    async fn save_with_stats(
        &self,
        mut metadata: FileMetadata,
        delta: StatsDelta,
    ) -> GatewayResult<FileMetadata> {
        let now = Utc::now();
        metadata.create_time = now;
        metadata.update_time = now;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO file_metadata
               (file_id, family_id, owner_id, original_name, folder_path, file_type,
                file_size, storage_type, storage_path, visibility, description, tags,
                create_time, update_time, upload_time, last_access_time, access_count, deleted)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)"#,
        )
        .bind(metadata.file_id)
        .bind(&metadata.family_id)
        .bind(&metadata.owner_id)
        .bind(&metadata.original_name)
        .bind(&metadata.folder_path)
        .bind(&metadata.file_type)
        .bind(metadata.file_size as i64)
        .bind(storage_type_str(metadata.storage_type))
        .bind(&metadata.storage_path)
        .bind(visibility_str(metadata.visibility))
        .bind(&metadata.description)
        .bind(metadata.tags.join(","))
        .bind(metadata.create_time)
        .bind(metadata.update_time)
        .bind(metadata.upload_time)
        .bind(metadata.last_access_time)
        .bind(metadata.access_count as i64)
        .bind(metadata.deleted)
        .execute(&mut *tx)
        .await?;

        apply_stats_delta(&mut tx, &metadata.family_id, &delta).await?;
        tx.commit().await?;
        Ok(metadata)
    }

    async fn soft_delete_with_stats(
        &self,
        file_id: Uuid,
        family_id: &str,
        ts: DateTime<Utc>,
        delta: StatsDelta,
    ) -> GatewayResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE file_metadata SET deleted = true, update_time = $2 WHERE file_id = $1")
            .bind(file_id)
            .bind(ts)
            .execute(&mut *tx)
            .await?;
        apply_stats_delta(&mut tx, family_id, &delta).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_with_stats(
        &self,
        mut metadata: FileMetadata,
        delta: StatsDelta,
    ) -> GatewayResult<FileMetadata> {
        metadata.update_time = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"UPDATE file_metadata SET
               original_name = $2, folder_path = $3, file_type = $4, file_size = $5,
               storage_type = $6, storage_path = $7, visibility = $8, description = $9,
               tags = $10, update_time = $11
               WHERE file_id = $1"#,
        )
        .bind(metadata.file_id)
        .bind(&metadata.original_name)
        .bind(&metadata.folder_path)
        .bind(&metadata.file_type)
        .bind(metadata.file_size as i64)
        .bind(storage_type_str(metadata.storage_type))
        .bind(&metadata.storage_path)
        .bind(visibility_str(metadata.visibility))
        .bind(&metadata.description)
        .bind(metadata.tags.join(","))
        .bind(metadata.update_time)
        .execute(&mut *tx)
        .await?;
        apply_stats_delta(&mut tx, &metadata.family_id, &delta).await?;
        tx.commit().await?;
        Ok(metadata)
    }
}

/// Upserts `family_storage_stats`, bounding `total_files`/`total_size` at
/// zero (spec §4.6 "bounded at zero").
async fn apply_stats_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    family_id: &str,
    delta: &StatsDelta,
) -> GatewayResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO family_storage_stats (family_id, total_files, total_size, last_updated)
           VALUES ($1, GREATEST($2, 0), GREATEST($3, 0), $4)
           ON CONFLICT (family_id) DO UPDATE SET
             total_files = GREATEST(family_storage_stats.total_files + $2, 0),
             total_size = GREATEST(family_storage_stats.total_size + $3, 0),
             last_updated = $4"#,
    )
    .bind(family_id)
    .bind(delta.total_files_delta)
    .bind(delta.total_size_delta)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    if let Some((name, size)) = &delta.largest_file_candidate {
        sqlx::query(
            r#"UPDATE family_storage_stats SET largest_file_name = $2, largest_file_size = $3, most_recent_file_time = $4
               WHERE family_id = $1 AND $3 > largest_file_size"#,
        )
        .bind(family_id)
        .bind(name)
        .bind(*size as i64)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
