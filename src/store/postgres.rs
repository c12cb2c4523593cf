use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ArticleDraft, ArticleStore, SaveOutcome, SourceCount, StoreError, StoredArticle, DRAFT_STATUS};

const ARTICLE_COLUMNS: &str = "id, title, slug, excerpt";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn map_insert_err(e: sqlx::Error, slug: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.constraint() == Some("article_slug_key") => StoreError::SlugTaken(slug.to_string()),
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<StoredArticle>, StoreError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM article WHERE external_id = $1");
        let row = sqlx::query_as::<_, StoredArticle>(&sql).bind(external_id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn find_by_external_id_since(&self, external_id: &str, since: DateTime<Utc>) -> Result<Option<StoredArticle>, StoreError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM article
             WHERE external_id = $1 AND COALESCE(imported_at, created_at) >= $2"
        );
        let row = sqlx::query_as::<_, StoredArticle>(&sql).bind(external_id).bind(since).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM article WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn recent_imported(&self, since: DateTime<Utc>) -> Result<Vec<StoredArticle>, StoreError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM article
             WHERE external_source IS NOT NULL AND COALESCE(imported_at, created_at) >= $1
             ORDER BY COALESCE(imported_at, created_at) DESC"
        );
        let rows = sqlx::query_as::<_, StoredArticle>(&sql).bind(since).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn save_article(&self, draft: &ArticleDraft) -> Result<SaveOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM article WHERE external_id = $1 FOR UPDATE")
            .bind(&draft.external_id)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE article
                       SET title        = $2,
                           content      = $3,
                           excerpt      = $4,
                           published_at = COALESCE($5, published_at),
                           external_url = $6,
                           imported_at  = now()
                     WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(&draft.excerpt)
                .bind(draft.published_at)
                .bind(&draft.external_url)
                .execute(&mut *tx)
                .await?;
                SaveOutcome::Refreshed { id }
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO article (title, slug, content, excerpt, status, published_at,
                        external_id, external_source, external_url, author_id, category_id,
                        created_at, imported_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now(), now())
                    RETURNING id
                    "#,
                )
                .bind(&draft.title)
                .bind(&draft.slug)
                .bind(&draft.content)
                .bind(&draft.excerpt)
                .bind(DRAFT_STATUS)
                .bind(draft.published_at)
                .bind(&draft.external_id)
                .bind(&draft.external_source)
                .bind(&draft.external_url)
                .bind(draft.author_id)
                .bind(draft.category_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_insert_err(e, &draft.slug))?;
                SaveOutcome::Created { id, slug: draft.slug.clone() }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn find_admin_user(&self) -> Result<Option<i64>, StoreError> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM app_user WHERE role = 'ADMIN' ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn find_or_create_category(&self, name: &str, slug: &str) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO category (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_by_source(&self, source: &str) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM article WHERE external_source = $1")
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn count_by_source(&self, source: &str) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article WHERE external_source = $1")
            .bind(source)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn counts_by_source(&self) -> Result<Vec<SourceCount>, StoreError> {
        let rows = sqlx::query_as::<_, SourceCount>(
            r#"
            SELECT external_source AS source, COUNT(*) AS count
            FROM article
            WHERE external_source IS NOT NULL
            GROUP BY external_source
            ORDER BY external_source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
