use chrono::{SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::models::{Article, ArticleSource};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bookmarks are keyed by URL, so an article without one can't be stored
    #[error("Article has no URL")]
    MissingUrl,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkChange {
    Added(String),
    Removed(String),
}

/// A saved article. Missing fields are stored as empty strings.
#[derive(Debug, Clone, FromRow)]
pub struct Bookmark {
    pub url: String,
    pub source: String,
    pub author: String,
    pub title: String,
    pub details: String,
    pub url_to_image: String,
    pub published_at: String,
    pub content: String,
    pub created_at: String,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<Bookmark> for Article {
    fn from(bookmark: Bookmark) -> Self {
        Article {
            source: non_empty(bookmark.source).map(|name| ArticleSource {
                id: None,
                name: Some(name),
            }),
            author: non_empty(bookmark.author),
            title: non_empty(bookmark.title),
            description: non_empty(bookmark.details),
            url: non_empty(bookmark.url),
            url_to_image: non_empty(bookmark.url_to_image),
            published_at: non_empty(bookmark.published_at),
            content: non_empty(bookmark.content),
        }
    }
}

pub struct BookmarkStore {
    pool: SqlitePool,
    changes: broadcast::Sender<BookmarkChange>,
}

impl BookmarkStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let (changes, _) = broadcast::channel(64);

        Ok(Self { pool, changes })
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                details TEXT NOT NULL DEFAULT '',
                url_to_image TEXT NOT NULL DEFAULT '',
                published_at TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_bookmarks_created
            ON bookmarks(created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Change notifications for every add and remove.
    pub fn subscribe(&self) -> broadcast::Receiver<BookmarkChange> {
        self.changes.subscribe()
    }

    /// Save an article, refreshing its fields if it is already bookmarked.
    /// The original save time is kept.
    pub async fn add(&self, article: &Article) -> Result<(), StoreError> {
        let url = article.bookmark_key().ok_or(StoreError::MissingUrl)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO bookmarks
                (url, source, author, title, details, url_to_image, published_at, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                source = excluded.source,
                author = excluded.author,
                title = excluded.title,
                details = excluded.details,
                url_to_image = excluded.url_to_image,
                published_at = excluded.published_at,
                content = excluded.content
            "#,
        )
        .bind(url)
        .bind(article.source_name().unwrap_or_default())
        .bind(article.author.as_deref().unwrap_or_default())
        .bind(article.title.as_deref().unwrap_or_default())
        .bind(article.description.as_deref().unwrap_or_default())
        .bind(article.url_to_image.as_deref().unwrap_or_default())
        .bind(article.published_at.as_deref().unwrap_or_default())
        .bind(article.content.as_deref().unwrap_or_default())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!("Bookmarked {}", url);
        // No receivers is fine
        let _ = self.changes.send(BookmarkChange::Added(url.to_string()));
        Ok(())
    }

    /// Delete a bookmark. Returns whether one existed.
    pub async fn remove(&self, url: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Removed bookmark {}", url);
            let _ = self.changes.send(BookmarkChange::Removed(url.to_string()));
        }
        Ok(removed)
    }

    /// Bookmark the article if it isn't saved yet, otherwise remove it.
    /// Returns whether the article is bookmarked afterwards.
    pub async fn toggle(&self, article: &Article) -> Result<bool, StoreError> {
        let url = article.bookmark_key().ok_or(StoreError::MissingUrl)?;
        if self.contains(url).await? {
            self.remove(url).await?;
            Ok(false)
        } else {
            self.add(article).await?;
            Ok(true)
        }
    }

    pub async fn get(&self, url: &str) -> Result<Option<Bookmark>, StoreError> {
        let bookmark = sqlx::query_as::<_, Bookmark>(
            r#"
            SELECT url, source, author, title, details, url_to_image, published_at, content, created_at
            FROM bookmarks WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bookmark)
    }

    pub async fn contains(&self, url: &str) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookmarks WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// All bookmarks, most recently saved first.
    pub async fn list(&self) -> Result<Vec<Bookmark>, StoreError> {
        let bookmarks = sqlx::query_as::<_, Bookmark>(
            r#"
            SELECT url, source, author, title, details, url_to_image, published_at, content, created_at
            FROM bookmarks
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bookmarks)
    }
}
