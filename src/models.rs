use serde::{Deserialize, Serialize};

/// Source id used when nothing else is selected.
pub const DEFAULT_SOURCE_ID: &str = "abc-news";

/// The publisher reference embedded in an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// An article as returned by the search endpoint or rebuilt from a bookmark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub source: Option<ArticleSource>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

impl Article {
    /// Display name of the publisher, if known
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }

    /// The URL used as bookmark identity. Empty URLs count as missing.
    pub fn bookmark_key(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// A publisher usable as a search filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl Source {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Filter identity: two sources select the same thing when their ids match.
    pub fn same_id(&self, other: &Source) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub status: Option<String>,
    pub total_results: Option<u64>,
    pub articles: Option<Vec<Article>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesResponse {
    pub status: Option<String>,
    pub sources: Option<Vec<Source>>,
}

/// Body NewsAPI sends alongside `"status": "error"`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    pub status: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_articles_response() {
            let json = r#"{
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": {"id": "abc-news", "name": "ABC News"},
                        "author": "Jane Doe",
                        "title": "Something happened",
                        "description": "A summary",
                        "url": "https://abcnews.go.com/story/1",
                        "urlToImage": "https://abcnews.go.com/story/1.jpg",
                        "publishedAt": "2023-02-12T10:00:00Z",
                        "content": "Body text"
                    },
                    {
                        "source": {"id": null, "name": "Blog"},
                        "author": null,
                        "title": "Untitled",
                        "description": null,
                        "url": "https://blog.example.com/post",
                        "urlToImage": null,
                        "publishedAt": "2023-02-11T09:00:00Z",
                        "content": null
                    }
                ]
            }"#;

            let response: ArticlesResponse = serde_json::from_str(json).unwrap();

            assert_eq!(response.status.as_deref(), Some("ok"));
            assert_eq!(response.total_results, Some(2));
            let articles = response.articles.unwrap();
            assert_eq!(articles.len(), 2);
            assert_eq!(articles[0].source_name(), Some("ABC News"));
            assert_eq!(
                articles[0].url_to_image.as_deref(),
                Some("https://abcnews.go.com/story/1.jpg")
            );
            assert_eq!(
                articles[0].published_at.as_deref(),
                Some("2023-02-12T10:00:00Z")
            );
            assert!(articles[1].author.is_none());
            assert_eq!(articles[1].source.as_ref().unwrap().id, None);
        }

        #[test]
        fn test_decode_articles_response_missing_fields() {
            let response: ArticlesResponse = serde_json::from_str("{}").unwrap();
            assert!(response.status.is_none());
            assert!(response.articles.is_none());
        }

        #[test]
        fn test_decode_sources_response() {
            let json = r#"{
                "status": "ok",
                "sources": [
                    {
                        "id": "abc-news",
                        "name": "ABC News",
                        "description": "Your trusted source",
                        "url": "https://abcnews.go.com",
                        "category": "general",
                        "language": "en",
                        "country": "us"
                    }
                ]
            }"#;

            let response: SourcesResponse = serde_json::from_str(json).unwrap();
            let sources = response.sources.unwrap();

            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].id.as_deref(), Some("abc-news"));
            assert_eq!(sources[0].category.as_deref(), Some("general"));
            assert_eq!(sources[0].country.as_deref(), Some("us"));
        }

        #[test]
        fn test_decode_error_body() {
            let json = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#;
            let body: ApiErrorBody = serde_json::from_str(json).unwrap();

            assert!(body.is_error());
            assert_eq!(body.code.as_deref(), Some("apiKeyInvalid"));
        }

        #[test]
        fn test_ok_status_is_not_error() {
            let body: ApiErrorBody = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
            assert!(!body.is_error());
        }

        #[test]
        fn test_article_serializes_camel_case() {
            let article = Article {
                url_to_image: Some("https://img".to_string()),
                published_at: Some("2023-02-12".to_string()),
                ..Default::default()
            };

            let json = serde_json::to_value(&article).unwrap();
            assert_eq!(json["urlToImage"], "https://img");
            assert_eq!(json["publishedAt"], "2023-02-12");
        }
    }

    mod source_tests {
        use super::*;

        #[test]
        fn test_same_id_ignores_other_fields() {
            let a = Source {
                name: Some("ABC".to_string()),
                ..Source::with_id("abc-news")
            };
            let b = Source {
                name: Some("ABC News".to_string()),
                ..Source::with_id("abc-news")
            };

            assert!(a.same_id(&b));
            assert!(!a.same_id(&Source::with_id("cnn")));
        }

        #[test]
        fn test_sources_without_id_never_match() {
            let a = Source::default();
            let b = Source::default();
            assert!(!a.same_id(&b));
        }
    }

    mod article_tests {
        use super::*;

        #[test]
        fn test_bookmark_key_rejects_empty_url() {
            let article = Article {
                url: Some(String::new()),
                ..Default::default()
            };
            assert_eq!(article.bookmark_key(), None);
        }

        #[test]
        fn test_bookmark_key_uses_url() {
            let article = Article {
                url: Some("https://example.com/a".to_string()),
                ..Default::default()
            };
            assert_eq!(article.bookmark_key(), Some("https://example.com/a"));
        }
    }
}
