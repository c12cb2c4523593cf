use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ArticleDraft, ArticleStore, SaveOutcome, SourceCount, StoreError, StoredArticle, DRAFT_STATUS};

#[derive(Debug, Clone)]
pub struct MemArticle {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub external_source: Option<String>,
    pub external_url: Option<String>,
    pub author_id: i64,
    pub category_id: i64,
    pub imported_at: DateTime<Utc>,
}

impl MemArticle {
    fn stored(&self) -> StoredArticle {
        StoredArticle {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: Some(self.excerpt.clone()),
        }
    }
}

#[derive(Default)]
struct State {
    articles: Vec<MemArticle>,
    categories: Vec<(i64, String, String)>,
    admin: Option<i64>,
    next_id: i64,
    fail_saves: bool,
    yield_on_slug_check: bool,
    reserved_slug: Option<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory `ArticleStore` for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_admin(id: i64) -> Self {
        let s = Self::default();
        s.state.lock().unwrap().admin = Some(id);
        s
    }

    pub fn articles(&self) -> Vec<MemArticle> { self.state.lock().unwrap().articles.clone() }

    pub fn set_fail_saves(&self, fail: bool) { self.state.lock().unwrap().fail_saves = fail; }

    /// Hand control back to the runtime after every slug lookup, so
    /// concurrent saves interleave between check and insert.
    pub fn set_yield_on_slug_check(&self, on: bool) { self.state.lock().unwrap().yield_on_slug_check = on; }

    /// Have another writer claim `slug` just before the next insert.
    pub fn reserve_slug_on_next_save(&self, slug: &str) { self.state.lock().unwrap().reserved_slug = Some(slug.to_string()); }

    /// Insert a row directly, e.g. one imported some time ago.
    pub fn insert(&self, mut article: MemArticle) -> i64 {
        let mut st = self.state.lock().unwrap();
        article.id = st.next_id();
        let id = article.id;
        st.articles.push(article);
        id
    }

    pub fn article(title: &str, slug: &str, imported_at: DateTime<Utc>) -> MemArticle {
        MemArticle {
            id: 0,
            title: title.to_string(),
            slug: slug.to_string(),
            content: String::new(),
            excerpt: String::new(),
            status: DRAFT_STATUS.to_string(),
            published_at: None,
            external_id: None,
            external_source: None,
            external_url: None,
            author_id: 1,
            category_id: 1,
            imported_at,
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<StoredArticle>, StoreError> {
        let st = self.state.lock().unwrap();
        Ok(st.articles.iter().find(|a| a.external_id.as_deref() == Some(external_id)).map(MemArticle::stored))
    }

    async fn find_by_external_id_since(&self, external_id: &str, since: DateTime<Utc>) -> Result<Option<StoredArticle>, StoreError> {
        let st = self.state.lock().unwrap();
        Ok(st
            .articles
            .iter()
            .find(|a| a.external_id.as_deref() == Some(external_id) && a.imported_at >= since)
            .map(MemArticle::stored))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let (exists, yield_now) = {
            let st = self.state.lock().unwrap();
            (st.articles.iter().any(|a| a.slug == slug), st.yield_on_slug_check)
        };
        if yield_now {
            tokio::task::yield_now().await;
        }
        Ok(exists)
    }

    async fn recent_imported(&self, since: DateTime<Utc>) -> Result<Vec<StoredArticle>, StoreError> {
        let st = self.state.lock().unwrap();
        Ok(st
            .articles
            .iter()
            .filter(|a| a.external_source.is_some() && a.imported_at >= since)
            .map(MemArticle::stored)
            .collect())
    }

    async fn save_article(&self, draft: &ArticleDraft) -> Result<SaveOutcome, StoreError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_saves {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        if let Some(a) = st.articles.iter_mut().find(|a| a.external_id.as_deref() == Some(draft.external_id.as_str())) {
            a.title = draft.title.clone();
            a.content = draft.content.clone();
            a.excerpt = draft.excerpt.clone();
            a.published_at = draft.published_at.or(a.published_at);
            a.external_url = Some(draft.external_url.clone());
            a.imported_at = Utc::now();
            return Ok(SaveOutcome::Refreshed { id: a.id });
        }
        if let Some(slug) = st.reserved_slug.take() {
            let mut other = MemoryStore::article("Placeholder", &slug, Utc::now());
            other.id = st.next_id();
            st.articles.push(other);
        }
        if st.articles.iter().any(|a| a.slug == draft.slug) {
            return Err(StoreError::SlugTaken(draft.slug.clone()));
        }
        let id = st.next_id();
        st.articles.push(MemArticle {
            id,
            title: draft.title.clone(),
            slug: draft.slug.clone(),
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            status: DRAFT_STATUS.to_string(),
            published_at: draft.published_at,
            external_id: Some(draft.external_id.clone()),
            external_source: Some(draft.external_source.clone()),
            external_url: Some(draft.external_url.clone()),
            author_id: draft.author_id,
            category_id: draft.category_id,
            imported_at: Utc::now(),
        });
        Ok(SaveOutcome::Created { id, slug: draft.slug.clone() })
    }

    async fn find_admin_user(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.state.lock().unwrap().admin)
    }

    async fn find_or_create_category(&self, name: &str, slug: &str) -> Result<i64, StoreError> {
        let mut st = self.state.lock().unwrap();
        if let Some((id, _, _)) = st.categories.iter().find(|(_, _, s)| s == slug) {
            return Ok(*id);
        }
        let id = st.categories.len() as i64 + 1;
        st.categories.push((id, name.to_string(), slug.to_string()));
        Ok(id)
    }

    async fn delete_by_source(&self, source: &str) -> Result<u64, StoreError> {
        let mut st = self.state.lock().unwrap();
        let before = st.articles.len();
        st.articles.retain(|a| a.external_source.as_deref() != Some(source));
        Ok((before - st.articles.len()) as u64)
    }

    async fn count_by_source(&self, source: &str) -> Result<i64, StoreError> {
        let st = self.state.lock().unwrap();
        Ok(st.articles.iter().filter(|a| a.external_source.as_deref() == Some(source)).count() as i64)
    }

    async fn counts_by_source(&self) -> Result<Vec<SourceCount>, StoreError> {
        let st = self.state.lock().unwrap();
        let mut counts: Vec<SourceCount> = Vec::new();
        for a in &st.articles {
            let Some(src) = &a.external_source else { continue };
            match counts.iter_mut().find(|c| &c.source == src) {
                Some(c) => c.count += 1,
                None => counts.push(SourceCount { source: src.clone(), count: 1 }),
            }
        }
        counts.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::with_admin(1);
        for slug in ["a", "b"] {
            let mut a = MemoryStore::article(slug, slug, Utc::now());
            a.external_source = Some("KOB 4".into());
            store.insert(a);
        }
        assert_eq!(store.delete_by_source("KOB 4").await.unwrap(), 2);
        let id = store.insert(MemoryStore::article("c", "c", Utc::now()));
        assert_eq!(id, 3);
    }
}
