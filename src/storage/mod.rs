use chrono::{DateTime, FixedOffset};
use futures::future::BoxFuture;
use sqlx::{ColumnIndex, Decode, Row, Type};

pub use file::File;
pub use mysql::{MySql, MySqlParams};
pub use sqlite::Sqlite;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::models::{parse_timestamp, StationRecord};

mod file;
mod mysql;
mod sqlite;

/// Append-only store of station readings.
pub trait Storage: Sync + Send {
    /// Creates the underlying file or table if it does not exist yet.
    /// Calling it on an already initialized store changes nothing.
    fn initialize(&self) -> BoxFuture<'_, Result<()>>;

    /// Appends `records` after everything already stored. Either the whole
    /// batch is stored or nothing is.
    fn save<'a>(&'a self, records: &'a [StationRecord]) -> BoxFuture<'a, Result<()>>;

    /// Every stored record, in insertion order.
    fn list(&self) -> BoxFuture<'_, Result<Vec<StationRecord>>>;
}

/// The backend selected on the command line.
#[derive(Debug)]
pub enum Backend {
    File(File),
    Sqlite(Sqlite),
    MySql(MySql),
}

impl Backend {
    /// Connects to the configured backend and initializes it.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend = match config {
            StorageConfig::File(path) => Backend::File(File::new(path)),
            StorageConfig::Sqlite(path) => Backend::Sqlite(Sqlite::connect(path).await?),
            StorageConfig::MySql(params) => Backend::MySql(MySql::connect(params).await?),
        };

        backend.initialize().await?;

        match (&backend, config) {
            (Backend::File(file), _) => log::info!("using file store {}", file.path().display()),
            (Backend::Sqlite(_), StorageConfig::Sqlite(path)) => {
                log::info!("using sqlite store {}", path.display())
            }
            (_, config) => log::info!("using {:?}", config),
        }

        Ok(backend)
    }

    fn inner(&self) -> &dyn Storage {
        match self {
            Backend::File(s) => s,
            Backend::Sqlite(s) => s,
            Backend::MySql(s) => s,
        }
    }
}

impl Storage for Backend {
    fn initialize(&self) -> BoxFuture<'_, Result<()>> {
        self.inner().initialize()
    }

    fn save<'a>(&'a self, records: &'a [StationRecord]) -> BoxFuture<'a, Result<()>> {
        self.inner().save(records)
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<StationRecord>>> {
        self.inner().list()
    }
}

/// Reads one column, reporting values of the wrong type as a corrupt store.
fn column<'r, R, T>(row: &'r R, name: &str) -> Result<T>
where
    R: Row,
    for<'n> &'n str: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(name).map_err(|e| match e {
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            Error::CorruptStore(e.to_string())
        }
        e => e.into(),
    })
}

fn decode_count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::CorruptStore(format!("column {}: {} is not a valid count", column, value)))
}

fn decode_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    parse_timestamp(value)
        .ok_or_else(|| Error::CorruptStore(format!("column timestamp: invalid value `{}`", value)))
}
