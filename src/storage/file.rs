use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::models::StationRecord;

use super::Storage;

/// Station history kept as one pretty-printed JSON array.
///
/// Every write goes to a temporary file in the same directory which then
/// replaces the store, so a failed save leaves the previous content intact.
/// There is no locking: one collector owns the file.
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| Error::StorageUnavailable(format!("file task: {}", e)))?
    }
}

impl Storage for File {
    fn initialize(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.blocking(|path| {
            if path.exists() {
                return Ok(());
            }

            log::info!("creating station store {}", path.display());
            replace(path, &[])
        }))
    }

    fn save<'a>(&'a self, records: &'a [StationRecord]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let new = records
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::MalformedPayload(format!("encode station: {}", e)))?;

            self.blocking(move |path| {
                let mut all = read(path)?;
                all.extend(new);

                replace(path, &all)
            })
            .await
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<StationRecord>>> {
        Box::pin(self.blocking(|path| -> Result<Vec<StationRecord>> {
            read(path)?
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    serde_json::from_value(value).map_err(|e| {
                        Error::CorruptStore(format!("{}: entry {}: {}", path.display(), i, e))
                    })
                })
                .collect()
        }))
    }
}

/// Reads the stored array. A store removed after initialization reads as empty.
fn read(path: &Path) -> Result<Vec<Value>> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content).map_err(|e| {
        Error::CorruptStore(format!(
            "{}: expected a JSON array of stations: {}",
            path.display(),
            e
        ))
    })
}

fn replace(path: &Path, values: &[Value]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, values)
            .map_err(|e| Error::StorageUnavailable(format!("write {}: {}", path.display(), e)))?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
