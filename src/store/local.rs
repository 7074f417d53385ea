//! In-process vector store, optionally persisted to disk.
//!
//! Backs the Qdrant provider for `QDRANT_URL=:memory:` and for `QDRANT_LOCAL_PATH`. Every
//! collection is kept in memory and, when a directory is configured, mirrored to
//! `<dir>/<escaped collection>.json` on each write. A write only becomes visible once its
//! snapshot is on disk. Queries are exhaustive cosine scans.

use crate::store::{
    backend::VectorBackend,
    types::{BackendError, PointInsert, ScoredPoint, VectorSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::Write as _,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;

/// Vector store living inside the server process.
pub struct LocalBackend {
    directory: Option<PathBuf>,
    collections: RwLock<HashMap<String, LocalCollection>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalCollection {
    schema: VectorSchema,
    points: Vec<LocalPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalPoint {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

impl LocalBackend {
    /// Store that forgets everything when the process exits.
    pub fn in_memory() -> Self {
        Self {
            directory: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Open (or initialize) a store persisted under `directory`.
    pub async fn open(directory: &Path) -> Result<Self, BackendError> {
        tokio::fs::create_dir_all(directory).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(collection_from_file_stem)
            else {
                tracing::warn!(path = %path.display(), "Skipping unrecognized file in local store");
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            let collection: LocalCollection = serde_json::from_slice(&bytes)?;
            tracing::debug!(
                collection = %name,
                points = collection.points.len(),
                "Loaded local collection"
            );
            collections.insert(name, collection);
        }

        tracing::info!(
            path = %directory.display(),
            collections = collections.len(),
            "Opened local vector store"
        );

        Ok(Self {
            directory: Some(directory.to_path_buf()),
            collections: RwLock::new(collections),
        })
    }

    /// Write the collection snapshot; a no-op for in-memory stores.
    ///
    /// Callers hold the map's write lock, so snapshots of one collection never interleave.
    async fn persist(&self, name: &str, collection: &LocalCollection) -> Result<(), BackendError> {
        let Some(directory) = &self.directory else {
            return Ok(());
        };

        let stem = file_stem_for(name);
        let target = directory.join(format!("{stem}.json"));
        let staging = directory.join(format!(".{stem}.json.tmp"));
        let bytes = serde_json::to_vec(collection)?;
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl VectorBackend for LocalBackend {
    async fn collection_schema(
        &self,
        collection: &str,
    ) -> Result<Option<Vec<VectorSchema>>, BackendError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|existing| vec![existing.schema.clone()]))
    }

    async fn create_collection(
        &self,
        collection: &str,
        schema: &VectorSchema,
    ) -> Result<(), BackendError> {
        if collection.is_empty() {
            return Err(BackendError::Rejected("collection name is empty".into()));
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            tracing::debug!(collection, "Local collection already exists");
            return Ok(());
        }

        let created = LocalCollection {
            schema: schema.clone(),
            points: Vec::new(),
        };
        self.persist(collection, &created).await?;
        collections.insert(collection.to_string(), created);

        tracing::debug!(collection, vector_name = %schema.vector_name, "Local collection created");
        Ok(())
    }

    async fn upsert_point(
        &self,
        collection: &str,
        point: PointInsert,
    ) -> Result<(), BackendError> {
        let mut collections = self.collections.write().await;
        let existing = collections.get_mut(collection).ok_or_else(|| {
            BackendError::Rejected(format!("collection `{collection}` does not exist"))
        })?;
        check_vector(&existing.schema, &point.vector_name, point.vector.len())?;

        let stored = LocalPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        };
        let replaced = match existing.points.iter().position(|p| p.id == stored.id) {
            Some(idx) => Some((idx, std::mem::replace(&mut existing.points[idx], stored))),
            None => {
                existing.points.push(stored);
                None
            }
        };

        if let Err(error) = self.persist(collection, existing).await {
            match replaced {
                Some((idx, previous)) => existing.points[idx] = previous,
                None => {
                    existing.points.pop();
                }
            }
            tracing::error!(collection, error = %error, "Local snapshot failed; write rolled back");
            return Err(error);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, BackendError> {
        let collections = self.collections.read().await;
        let existing = collections.get(collection).ok_or_else(|| {
            BackendError::Rejected(format!("collection `{collection}` does not exist"))
        })?;
        check_vector(&existing.schema, vector_name, vector.len())?;

        let mut scored: Vec<ScoredPoint> = existing
            .points
            .iter()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(&vector, &point.vector),
                payload: Some(point.payload.clone()),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn check_vector(schema: &VectorSchema, vector_name: &str, size: usize) -> Result<(), BackendError> {
    if schema.vector_name != vector_name {
        return Err(BackendError::Rejected(format!(
            "vector `{vector_name}` does not exist (collection uses `{}`)",
            schema.vector_name
        )));
    }
    if schema.size != size {
        return Err(BackendError::Rejected(format!(
            "vector dimension error: expected {}, got {size}",
            schema.size
        )));
    }
    Ok(())
}

/// Percent-escape a collection name into a portable file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through, as does `.` anywhere but the first position.
fn file_stem_for(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for (idx, byte) in name.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_')
            || (byte == b'.' && idx > 0);
        if plain {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}

/// Inverse of [`file_stem_for`]; `None` for stems it could not have produced.
fn collection_from_file_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok().filter(|name| !name.is_empty())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
