use std::time::Duration;

use futures::future::BoxFuture;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};

use crate::models::format_timestamp;

use super::{column, decode_count, decode_timestamp, Result, StationRecord, Storage};

const CREATE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS station (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    address VARCHAR(255) NOT NULL,
    station_id VARCHAR(64) NOT NULL,
    bikes BIGINT NOT NULL,
    slots BIGINT NOT NULL,
    total_slots BIGINT NOT NULL,
    latitude DOUBLE NOT NULL,
    longitude DOUBLE NOT NULL,
    timestamp VARCHAR(64) NOT NULL,
    city VARCHAR(64) NOT NULL
) CHARACTER SET utf8mb4"#;

/// Credentials of a networked MySQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl std::fmt::Debug for MySqlParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

impl From<&MySqlParams> for MySqlConnectOptions {
    fn from(value: &MySqlParams) -> Self {
        let opts = MySqlConnectOptions::new()
            .host(&value.host)
            .port(value.port)
            .username(&value.user)
            .database(&value.database);

        match &value.password {
            Some(password) => opts.password(password),
            None => opts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MySql {
    pool: MySqlPool,
}

impl MySql {
    pub async fn connect(params: &MySqlParams) -> Result<MySql> {
        log::debug!(
            "connecting to mysql://{}@{}:{}/{}",
            params.user,
            params.host,
            params.port,
            params.database
        );

        Self::with_options(params.into()).await
    }

    /// A single connection, held open for the whole run.
    async fn with_options(opts: MySqlConnectOptions) -> Result<MySql> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }
}

impl Storage for MySql {
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
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
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

fn decode(row: &MySqlRow) -> Result<StationRecord> {
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
