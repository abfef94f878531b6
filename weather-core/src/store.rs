//! SQLite persistence for locations, current snapshots and forecasts.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, types::Type};
use std::path::Path;

use crate::error::StoreError;
use crate::model::{
    CurrentConditions, CurrentSnapshot, DailyEntry, DailyPoint, ForecastReport, Forecasts,
    HourlyEntry, HourlyPoint, Location,
};

pub type StoreResult<T> = Result<T, StoreError>;

const SNAPSHOT_COLUMNS: &str = "id, location_id, temperature, feels_like, condition, description, \
     icon, humidity, wind_speed, wind_direction, wind_deg, visibility, uv_index, pressure, clouds, \
     fetched_at_ms";

const HOURLY_COLUMNS: &str = "id, location_id, time_ms, temperature, condition, description, icon, \
     humidity, wind_speed, pop, fetched_at_ms";

const DAILY_COLUMNS: &str = "id, location_id, date, temp_high, temp_low, condition, description, \
     icon, humidity, wind_speed, pop, fetched_at_ms";

/// Weather database. The connection is serialized behind a mutex so the
/// store can be shared between tasks; no lock is ever held across an await.
#[derive(Debug)]
pub struct WeatherStore {
    conn: Mutex<Connection>,
}

impl WeatherStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// In-memory database, mostly for tests.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                region TEXT NOT NULL DEFAULT '',
                lat REAL NOT NULL DEFAULT 0,
                lon REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS current_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                temperature REAL NOT NULL,
                feels_like REAL NOT NULL,
                condition TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                humidity INTEGER NOT NULL,
                wind_speed REAL NOT NULL,
                wind_direction TEXT NOT NULL,
                wind_deg INTEGER NOT NULL,
                visibility REAL NOT NULL,
                uv_index REAL,
                pressure INTEGER,
                clouds INTEGER NOT NULL,
                fetched_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hourly_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                time_ms INTEGER NOT NULL,
                temperature REAL NOT NULL,
                condition TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                humidity INTEGER,
                wind_speed REAL,
                pop REAL NOT NULL,
                fetched_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                temp_high REAL NOT NULL,
                temp_low REAL NOT NULL,
                condition TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                humidity INTEGER,
                wind_speed REAL,
                pop REAL NOT NULL,
                fetched_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_recent
                ON current_snapshots(location_id, fetched_at_ms DESC);
            CREATE INDEX IF NOT EXISTS idx_hourly_time ON hourly_points(location_id, time_ms);
            CREATE INDEX IF NOT EXISTS idx_daily_date ON daily_points(location_id, date);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // --- locations ---

    pub fn insert_location(
        &self,
        name: &str,
        region: &str,
        lat: f64,
        lon: f64,
    ) -> StoreResult<Location> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO locations (name, region, lat, lon) VALUES (?1, ?2, ?3, ?4)",
            params![name, region, lat, lon],
        )?;

        Ok(Location {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            region: region.to_string(),
            lat,
            lon,
        })
    }

    /// Insert the location unless one with the same name exists.
    /// Returns the stored row and whether it was created.
    pub fn get_or_create_location(
        &self,
        name: &str,
        region: &str,
        lat: f64,
        lon: f64,
    ) -> StoreResult<(Location, bool)> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO locations (name, region, lat, lon) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO NOTHING",
            params![name, region, lat, lon],
        )?;
        let location = conn.query_row(
            "SELECT id, name, region, lat, lon FROM locations WHERE name = ?1",
            params![name],
            row_to_location,
        )?;
        Ok((location, inserted == 1))
    }

    /// Case-insensitive lookup by name.
    pub fn location_by_name(&self, name: &str) -> StoreResult<Option<Location>> {
        let conn = self.conn.lock();
        let location = conn
            .query_row(
                "SELECT id, name, region, lat, lon FROM locations WHERE name = ?1",
                params![name],
                row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    pub fn location(&self, id: i64) -> StoreResult<Option<Location>> {
        let conn = self.conn.lock();
        let location = conn
            .query_row(
                "SELECT id, name, region, lat, lon FROM locations WHERE id = ?1",
                params![id],
                row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    pub fn list_locations(&self) -> StoreResult<Vec<Location>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, region, lat, lon FROM locations ORDER BY name")?;
        let rows = stmt.query_map([], row_to_location)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_coordinates(&self, location_id: i64, lat: f64, lon: f64) -> StoreResult<()> {
        self.conn.lock().execute(
            "UPDATE locations SET lat = ?1, lon = ?2 WHERE id = ?3",
            params![lat, lon, location_id],
        )?;
        Ok(())
    }

    /// Delete a location together with all of its snapshots and forecasts.
    pub fn delete_location(&self, location_id: i64) -> StoreResult<bool> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM locations WHERE id = ?1", params![location_id])?;
        Ok(deleted > 0)
    }

    // --- current snapshots ---

    pub fn insert_snapshot(
        &self,
        location_id: i64,
        conditions: &CurrentConditions,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<CurrentSnapshot> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO current_snapshots
            (location_id, temperature, feels_like, condition, description, icon, humidity,
             wind_speed, wind_direction, wind_deg, visibility, uv_index, pressure, clouds, fetched_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                location_id,
                conditions.temperature_c,
                conditions.feels_like_c,
                conditions.condition,
                conditions.description,
                conditions.icon,
                conditions.humidity_pct,
                conditions.wind_speed_kmh,
                conditions.wind_direction,
                conditions.wind_deg,
                conditions.visibility_km,
                conditions.uv_index,
                conditions.pressure_hpa,
                conditions.clouds_pct,
                fetched_at.timestamp_millis(),
            ],
        )?;

        Ok(CurrentSnapshot {
            id: conn.last_insert_rowid(),
            location_id,
            conditions: conditions.clone(),
            fetched_at,
        })
    }

    pub fn latest_snapshot(&self, location_id: i64) -> StoreResult<Option<CurrentSnapshot>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM current_snapshots WHERE location_id = ?1 \
             ORDER BY fetched_at_ms DESC, id DESC LIMIT 1"
        );
        let snapshot = conn
            .query_row(&sql, params![location_id], row_to_snapshot)
            .optional()?;
        Ok(snapshot)
    }

    pub fn snapshots_newest_first(&self, location_id: i64) -> StoreResult<Vec<CurrentSnapshot>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM current_snapshots WHERE location_id = ?1 \
             ORDER BY fetched_at_ms DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![location_id], row_to_snapshot)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn snapshot_ids_newest_first(&self, location_id: i64) -> StoreResult<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id FROM current_snapshots WHERE location_id = ?1 \
             ORDER BY fetched_at_ms DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![location_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<i64>, _>>()?)
    }

    /// Delete snapshots by id. Returns the number of rows removed.
    pub fn delete_snapshots(&self, ids: &[i64]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM current_snapshots WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    // --- forecasts ---

    /// Fetch time of the newest stored hourly point, if any.
    pub fn latest_hourly_fetch(&self, location_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let ms: Option<i64> = conn.query_row(
            "SELECT MAX(fetched_at_ms) FROM hourly_points WHERE location_id = ?1",
            params![location_id],
            |row| row.get(0),
        )?;
        Ok(ms.and_then(DateTime::from_timestamp_millis))
    }

    /// Hourly points at or after `now`, earliest first.
    pub fn future_hourly(
        &self,
        location_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<HourlyPoint>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {HOURLY_COLUMNS} FROM hourly_points WHERE location_id = ?1 AND time_ms >= ?2 \
             ORDER BY time_ms LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![location_id, now.timestamp_millis(), limit as i64],
            row_to_hourly,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every stored hourly point, earliest first.
    pub fn hourly(&self, location_id: i64) -> StoreResult<Vec<HourlyPoint>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {HOURLY_COLUMNS} FROM hourly_points WHERE location_id = ?1 ORDER BY time_ms"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![location_id], row_to_hourly)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn daily(&self, location_id: i64, limit: usize) -> StoreResult<Vec<DailyPoint>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {DAILY_COLUMNS} FROM daily_points WHERE location_id = ?1 ORDER BY date LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![location_id, limit as i64], row_to_daily)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Drop every stored forecast point for the location and insert the new sets.
    /// Returns the inserted rows with their ids.
    pub fn replace_forecasts(
        &self,
        location_id: i64,
        report: &ForecastReport,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<Forecasts> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM hourly_points WHERE location_id = ?1",
            params![location_id],
        )?;
        tx.execute(
            "DELETE FROM daily_points WHERE location_id = ?1",
            params![location_id],
        )?;

        let hourly = insert_hourly(&tx, location_id, &report.hourly, fetched_at)?;
        let daily = insert_daily(&tx, location_id, &report.daily, fetched_at)?;

        tx.commit()?;
        Ok(Forecasts { hourly, daily })
    }
}

fn insert_hourly(
    tx: &Transaction<'_>,
    location_id: i64,
    entries: &[HourlyEntry],
    fetched_at: DateTime<Utc>,
) -> rusqlite::Result<Vec<HourlyPoint>> {
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO hourly_points
        (location_id, time_ms, temperature, condition, description, icon, humidity, wind_speed, pop, fetched_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;

    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = stmt.insert(params![
            location_id,
            entry.time.timestamp_millis(),
            entry.temperature_c,
            entry.condition,
            entry.description,
            entry.icon,
            entry.humidity_pct,
            entry.wind_speed_kmh,
            entry.pop,
            fetched_at.timestamp_millis(),
        ])?;
        points.push(HourlyPoint {
            id,
            location_id,
            entry: entry.clone(),
            fetched_at,
        });
    }
    Ok(points)
}

fn insert_daily(
    tx: &Transaction<'_>,
    location_id: i64,
    entries: &[DailyEntry],
    fetched_at: DateTime<Utc>,
) -> rusqlite::Result<Vec<DailyPoint>> {
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO daily_points
        (location_id, date, temp_high, temp_low, condition, description, icon, humidity, wind_speed, pop, fetched_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )?;

    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = stmt.insert(params![
            location_id,
            entry.date.format("%Y-%m-%d").to_string(),
            entry.temp_high_c,
            entry.temp_low_c,
            entry.condition,
            entry.description,
            entry.icon,
            entry.humidity_pct,
            entry.wind_speed_kmh,
            entry.pop,
            fetched_at.timestamp_millis(),
        ])?;
        points.push(DailyPoint {
            id,
            location_id,
            entry: entry.clone(),
            fetched_at,
        });
    }
    Ok(points)
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        region: row.get(2)?,
        lat: row.get(3)?,
        lon: row.get(4)?,
    })
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn row_to_snapshot(row: &Row) -> rusqlite::Result<CurrentSnapshot> {
    Ok(CurrentSnapshot {
        id: row.get(0)?,
        location_id: row.get(1)?,
        conditions: CurrentConditions {
            temperature_c: row.get(2)?,
            feels_like_c: row.get(3)?,
            condition: row.get(4)?,
            description: row.get(5)?,
            icon: row.get(6)?,
            humidity_pct: row.get(7)?,
            wind_speed_kmh: row.get(8)?,
            wind_direction: row.get(9)?,
            wind_deg: row.get(10)?,
            visibility_km: row.get(11)?,
            uv_index: row.get(12)?,
            pressure_hpa: row.get(13)?,
            clouds_pct: row.get(14)?,
        },
        fetched_at: timestamp_at(row, 15)?,
    })
}

fn row_to_hourly(row: &Row) -> rusqlite::Result<HourlyPoint> {
    Ok(HourlyPoint {
        id: row.get(0)?,
        location_id: row.get(1)?,
        entry: HourlyEntry {
            time: timestamp_at(row, 2)?,
            temperature_c: row.get(3)?,
            condition: row.get(4)?,
            description: row.get(5)?,
            icon: row.get(6)?,
            humidity_pct: row.get(7)?,
            wind_speed_kmh: row.get(8)?,
            pop: row.get(9)?,
        },
        fetched_at: timestamp_at(row, 10)?,
    })
}

fn row_to_daily(row: &Row) -> rusqlite::Result<DailyPoint> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(DailyPoint {
        id: row.get(0)?,
        location_id: row.get(1)?,
        entry: DailyEntry {
            date,
            temp_high_c: row.get(3)?,
            temp_low_c: row.get(4)?,
            condition: row.get(5)?,
            description: row.get(6)?,
            icon: row.get(7)?,
            humidity_pct: row.get(8)?,
            wind_speed_kmh: row.get(9)?,
            pop: row.get(10)?,
        },
        fetched_at: timestamp_at(row, 11)?,
    })
}
