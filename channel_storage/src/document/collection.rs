//! Schemaless collections of JSON documents.
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::{fs, io::AsyncWriteExt};

use crate::StorageError;

pub type Document = Map<String, Value>;

/// Matches documents whose fields equal all the given values.
#[derive(Debug, Clone, Default)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.0.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0.iter().all(|(field, value)| doc.get(field) == Some(value))
    }
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StorageError> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StorageError::InvalidRecord(format!("expected a JSON object, got {other}"))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StorageError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Reads a collection file with one JSON document per line. A missing file is an empty collection.
pub async fn load(path: &Path) -> Result<Vec<Document>, StorageError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Document>(l).map_err(StorageError::from))
        .collect()
}

/// Rewrites the collection file. The new contents are written to a sibling file first and then moved into place.
pub async fn store(path: &Path, docs: &[Document]) -> Result<(), StorageError> {
    let mut contents = String::new();
    for doc in docs {
        contents.push_str(&serde_json::to_string(doc)?);
        contents.push('\n');
    }
    let tmp = path.with_extension("db~");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
