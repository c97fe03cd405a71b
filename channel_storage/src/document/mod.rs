//! Embedded document storage for the `nedb` protocol.
//!
//! Records are kept as JSON documents in three collections, one each for tokens, payments and channels. With
//! `nedb://` the collections live in memory only. With `nedb://<dir>` every collection is also kept in
//! `<dir>/<collection>.db`, one document per line, and rewritten after each change.
//!
//! Document stores have no schema, so the engine has no migrator.
mod accessors;
pub mod collection;

use std::{collections::HashMap, fmt::Debug, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use log::*;
use tokio::sync::RwLock;

pub use accessors::{DocChannels, DocPayments, DocTokens};
use collection::{Document, Filter};

use crate::{
    config::EngineSettings,
    connection::{ConnectionDescriptor, Protocol},
    db_types::Namespace,
    migrations::Migrator,
    traits::{Backend, BackendFactory, ChannelContract, DatasetAccessors, Engine},
    StorageError,
};

pub const TOKENS: &str = "token";
pub const PAYMENTS: &str = "payment";
pub const CHANNELS: &str = "channel";
const COLLECTIONS: [&str; 3] = [TOKENS, PAYMENTS, CHANNELS];

#[derive(Clone)]
pub struct DocumentEngine {
    dir: Option<PathBuf>,
    collections: Arc<RwLock<HashMap<&'static str, Vec<Document>>>>,
}

impl DocumentEngine {
    pub fn in_memory() -> Self {
        let collections = COLLECTIONS.iter().map(|&name| (name, Vec::new())).collect();
        Self { dir: None, collections: Arc::new(RwLock::new(collections)) }
    }

    /// Opens the collections stored in `dir`, creating the directory if needed.
    pub async fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let mut collections = HashMap::with_capacity(COLLECTIONS.len());
        for name in COLLECTIONS {
            let docs = collection::load(&dir.join(format!("{name}.db"))).await?;
            trace!("🗃️ Loaded {} documents into {name}", docs.len());
            collections.insert(name, docs);
        }
        Ok(Self { dir: Some(dir), collections: Arc::new(RwLock::new(collections)) })
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub async fn find(&self, collection: &'static str, filter: &Filter) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default()
    }

    pub async fn count(&self, collection: &'static str, filter: &Filter) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map(|docs| docs.iter().filter(|d| filter.matches(d)).count()).unwrap_or(0)
    }

    /// Inserts `doc`, unless a document matching `unique` already exists.
    pub async fn insert_unique(
        &self,
        collection: &'static str,
        unique: &Filter,
        doc: Document,
    ) -> Result<(), StorageError> {
        self.modify(collection, |docs| {
            if docs.iter().any(|d| unique.matches(d)) {
                return Err(StorageError::InvalidRecord(format!("a matching {collection} record already exists")));
            }
            docs.push(doc);
            Ok(((), true))
        })
        .await
    }

    pub async fn insert(&self, collection: &'static str, doc: Document) -> Result<(), StorageError> {
        self.modify(collection, |docs| {
            docs.push(doc);
            Ok(((), true))
        })
        .await
    }

    /// Sets the fields in `changes` on every matching document. When nothing matches and `upsert` is set, `changes`
    /// is inserted as a new document. Returns the number of documents written.
    pub async fn update(
        &self,
        collection: &'static str,
        filter: &Filter,
        changes: Document,
        upsert: bool,
    ) -> Result<usize, StorageError> {
        self.modify(collection, |docs| {
            let mut count = 0;
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                doc.extend(changes.clone());
                count += 1;
            }
            if count == 0 && upsert {
                docs.push(changes);
                count = 1;
            }
            Ok((count, count > 0))
        })
        .await
    }

    pub async fn remove(&self, collection: &'static str, filter: &Filter) -> Result<usize, StorageError> {
        self.modify(collection, |docs| {
            let before = docs.len();
            docs.retain(|d| !filter.matches(d));
            let count = before - docs.len();
            Ok((count, count > 0))
        })
        .await
    }

    /// Runs `change` against a copy of the collection. The copy replaces the live collection only once it has been
    /// persisted, so a failed write leaves memory and disk in agreement.
    async fn modify<T, F>(&self, collection: &'static str, change: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Vec<Document>) -> Result<(T, bool), StorageError>,
    {
        let mut collections = self.collections.write().await;
        let mut docs = collections.get(collection).cloned().unwrap_or_default();
        let (result, changed) = change(&mut docs)?;
        if changed {
            self.persist(collection, &docs).await?;
            collections.insert(collection, docs);
        }
        Ok(result)
    }

    async fn persist(&self, collection: &'static str, docs: &[Document]) -> Result<(), StorageError> {
        match &self.dir {
            Some(dir) => collection::store(&dir.join(format!("{collection}.db")), docs).await,
            None => Ok(()),
        }
    }
}

impl Debug for DocumentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dir {
            Some(dir) => write!(f, "DocumentEngine ({})", dir.display()),
            None => write!(f, "DocumentEngine (in memory)"),
        }
    }
}

#[async_trait]
impl Engine for DocumentEngine {
    fn protocol(&self) -> Protocol {
        Protocol::Nedb
    }

    fn migrator(&self) -> Option<Arc<Migrator>> {
        None
    }
}

impl Backend for DocumentEngine {
    fn engine(&self) -> Arc<dyn Engine> {
        Arc::new(self.clone())
    }

    fn datasets(&self, namespace: &Namespace, contract: Arc<dyn ChannelContract>) -> DatasetAccessors {
        DatasetAccessors {
            tokens: Box::new(DocTokens::new(self.clone(), namespace.clone())),
            payments: Box::new(DocPayments::new(self.clone(), namespace.clone())),
            channels: Box::new(DocChannels::new(self.clone(), namespace.clone(), contract)),
        }
    }
}

/// Opens [`DocumentEngine`]s for the `nedb` protocol. An empty URL body means in-memory storage, anything else is
/// the directory holding the collection files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFactory;

#[async_trait]
impl BackendFactory for DocumentFactory {
    fn family(&self) -> &'static str {
        "document"
    }

    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        _settings: &EngineSettings,
    ) -> Result<Box<dyn Backend>, StorageError> {
        if descriptor.protocol() != Protocol::Nedb {
            return Err(StorageError::UnsupportedProtocol(descriptor.protocol().to_string()));
        }
        let engine = match descriptor.body() {
            "" => {
                debug!("🗃️ Using in-memory document storage");
                DocumentEngine::in_memory()
            },
            dir => {
                debug!("🗃️ Using document storage in {dir}");
                DocumentEngine::open(dir).await?
            },
        };
        Ok(Box::new(engine))
    }
}
