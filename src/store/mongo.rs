// src/store/mongo.rs

//! MongoDB-backed article store.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_document, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::warn;

use super::ArticleStore;
use crate::error::Result;
use crate::models::Article;

pub struct MongoStore {
    collection: Collection<Article>,
}

impl MongoStore {
    /// Open the collection and ensure the secondary access paths exist:
    /// `(source asc, published_at desc)` and `external_id`.
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<Article>(collection_name);
        let store = Self { collection };
        store.create_indexes().await?;
        Ok(store)
    }

    async fn create_indexes(&self) -> Result<()> {
        let source_published = IndexModel::builder()
            .keys(doc! { "source": 1, "published_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("source_published_at_idx".to_string())
                    .build(),
            )
            .build();
        let external_id = IndexModel::builder()
            .keys(doc! { "external_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("external_id_idx".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(source_published).await?;
        self.collection.create_index(external_id).await?;
        Ok(())
    }

    fn raw(&self) -> Collection<Document> {
        self.collection.clone_with_type::<Document>()
    }
}

#[async_trait]
impl ArticleStore for MongoStore {
    async fn upsert(&self, article: &Article) -> Result<()> {
        let update = doc! { "$set": to_document(article).map_err(mongodb::error::Error::from)? };
        self.collection
            .update_one(doc! { "_id": &article.id }, update)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn bulk_upsert(&self, articles: &[Article]) -> Result<()> {
        let mut first_error = None;
        for article in articles {
            if let Err(e) = self.upsert(article).await {
                warn!(id = %article.id, error = %e, "upsert failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn get_last_fetched(&self, source: &str) -> Result<Option<Article>> {
        let article = self
            .collection
            .find_one(doc! { "source": source })
            .sort(doc! { "published_at": -1 })
            .await?;
        Ok(article)
    }

    async fn get_content_hashes(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let mut cursor = self
            .raw()
            .find(doc! { "_id": { "$in": ids } })
            .projection(doc! { "_id": 1, "content_hash": 1 })
            .await?;

        let mut hashes = HashMap::new();
        while let Some(document) = cursor.try_next().await? {
            let (Ok(id), Ok(hash)) = (document.get_str("_id"), document.get_str("content_hash"))
            else {
                // Skip malformed records
                continue;
            };
            hashes.insert(id.to_string(), hash.to_string());
        }
        Ok(hashes)
    }
}
