use std::path::Path;

use futures::future::BoxFuture;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::models::format_timestamp;

use super::{column, decode_count, decode_timestamp, Result, StationRecord, Storage};

const CREATE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS station (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    station_id TEXT NOT NULL,
    bikes INTEGER NOT NULL,
    slots INTEGER NOT NULL,
    total_slots INTEGER NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp TEXT NOT NULL,
    city TEXT NOT NULL
)"#;

#[derive(Debug, Clone)]
pub struct Sqlite {
    pool: SqlitePool,
}

impl Sqlite {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Sqlite> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        Self::with_options(opts).await
    }

    /// The collector is the only writer, one connection is enough.
    async fn with_options(opts: SqliteConnectOptions) -> Result<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }
}

impl Storage for Sqlite {
    fn initialize(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(CREATE_TABLE).execute(&self.pool).await?;

            Ok(())
        })
    }

    fn save<'a>(&'a self, records: &'a [StationRecord]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            for record in records {
                sqlx::query(
                    r#"INSERT INTO station (
                    name,
                    address,
                    station_id,
                    bikes,
                    slots,
                    total_slots,
                    latitude,
                    longitude,
                    timestamp,
                    city
                ) VALUES (
                    ?1,
                    ?2,
                    ?3,
                    ?4,
                    ?5,
                    ?6,
                    ?7,
                    ?8,
                    ?9,
                    ?10
                )"#,
                )
                .bind(&record.name)
                .bind(&record.address)
                .bind(&record.station_id)
                .bind(i64::from(record.bikes_available))
                .bind(i64::from(record.slots_available))
                .bind(i64::from(record.total_slots))
                .bind(record.latitude)
                .bind(record.longitude)
                .bind(format_timestamp(&record.timestamp))
                .bind(&record.city)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;

            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<StationRecord>>> {
        Box::pin(async move {
            let mut rows = sqlx::query(
                r#"SELECT
                    name,
                    address,
                    station_id,
                    bikes,
                    slots,
                    total_slots,
                    latitude,
                    longitude,
                    timestamp,
                    city
                FROM station
                ORDER BY id"#,
            )
            .fetch(&self.pool);

            let mut result = vec![];

            while let Some(row) = rows.try_next().await? {
                result.push(decode(&row)?);
            }

            Ok(result)
        })
    }
}

fn decode(row: &SqliteRow) -> Result<StationRecord> {
    Ok(StationRecord {
        station_id: column(row, "station_id")?,
        name: column(row, "name")?,
        address: column(row, "address")?,
        bikes_available: decode_count(column(row, "bikes")?, "bikes")?,
        slots_available: decode_count(column(row, "slots")?, "slots")?,
        total_slots: decode_count(column(row, "total_slots")?, "total_slots")?,
        latitude: column(row, "latitude")?,
        longitude: column(row, "longitude")?,
        timestamp: decode_timestamp(column(row, "timestamp")?)?,
        city: column(row, "city")?,
    })
}
