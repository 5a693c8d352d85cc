//! SQLite storage for stations and records.

use std::{fs, path::Path, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    Error as SqlxError, FromRow,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use super::record::{NewRecord, Record};

/// Path that keeps the database in memory.
pub const MEMORY_PATH: &'static str = ":memory:";

const MAX_CONNECTIONS: u32 = 4;

/// Database handle. Cloning shares the same connection pool.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// A registered station. `api_token` authenticates its uploads.
#[derive(Clone, Debug, FromRow, PartialEq)]
pub struct Station {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub api_token: String,
}

const CREATE_STATION: &'static str = "CREATE TABLE IF NOT EXISTS station(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    description TEXT,
    api_token TEXT NOT NULL UNIQUE
)";

const CREATE_RECORD: &'static str = "CREATE TABLE IF NOT EXISTS record(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    broadcasted_station_id INTEGER NOT NULL,
    battery BOOLEAN NOT NULL,
    timestamp INTEGER NOT NULL,
    temperature REAL NOT NULL,
    humidity INTEGER NOT NULL,
    wind_speed REAL NOT NULL,
    wind_dir INTEGER NOT NULL,
    wind_gust REAL NOT NULL,
    rain REAL NOT NULL,
    station_id INTEGER NOT NULL,
    FOREIGN KEY(station_id) REFERENCES station(id)
)";

const CREATE_RECORD_INDEX: &'static str =
    "CREATE INDEX IF NOT EXISTS record_station_timestamp ON record(station_id, timestamp)";

impl Db {
    /// Open (and create if missing) the database file at `path` and make sure the tables exist.
    pub async fn connect(path: &str) -> Result<Self, SqlxError> {
        const FN_NAME: &'static str = "Db::connect";

        let (opts, max_conns) = match path {
            MEMORY_PATH => (SqliteConnectOptions::from_str("sqlite::memory:")?, 1),
            _ => {
                if let Some(dir) = Path::new(path).parent() {
                    if !dir.as_os_str().is_empty() {
                        fs::create_dir_all(dir)?;
                    }
                }
                (
                    SqliteConnectOptions::new()
                        .filename(path)
                        .create_if_missing(true),
                    MAX_CONNECTIONS,
                )
            }
        };
        // An in-memory database lives as long as its only connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_conns)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts.foreign_keys(true))
            .await?;

        let db = Db { pool };
        db.init_schema().await?;
        info!("[{}] database {} ready", FN_NAME, path);
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), SqlxError> {
        for stmt in [CREATE_STATION, CREATE_RECORD, CREATE_RECORD_INDEX] {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Register a station and return its ID.
    pub async fn add_station(
        &self,
        name: &str,
        description: &str,
        api_token: &str,
    ) -> Result<i64, SqlxError> {
        let result =
            sqlx::query("INSERT INTO station(name, description, api_token) VALUES(?, ?, ?)")
                .bind(name)
                .bind(description)
                .bind(api_token)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_station_by_token(&self, api_token: &str) -> Result<Option<Station>, SqlxError> {
        sqlx::query_as::<_, Station>(
            "SELECT id, name, description, api_token FROM station WHERE api_token = ?",
        )
        .bind(api_token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Store a record for the station and return the record ID.
    pub async fn add_record(&self, record: &NewRecord, station_id: i64) -> Result<i64, SqlxError> {
        let result = sqlx::query(
            "INSERT INTO record(broadcasted_station_id, battery, timestamp, temperature, humidity, \
             wind_speed, wind_dir, wind_gust, rain, station_id) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.broadcasted_station_id)
        .bind(record.battery)
        .bind(record.timestamp)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.wind_speed)
        .bind(record.wind_dir)
        .bind(record.wind_gust)
        .bind(record.rain)
        .bind(station_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The record with the latest `timestamp` for the station. Ties go to the last inserted one.
    pub async fn get_last_record(&self, station_id: i64) -> Result<Option<Record>, SqlxError> {
        sqlx::query_as::<_, Record>(
            "SELECT id, broadcasted_station_id, battery, timestamp, temperature, humidity, \
             wind_speed, wind_dir, wind_gust, rain, station_id \
             FROM record WHERE station_id = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await
    }
}
