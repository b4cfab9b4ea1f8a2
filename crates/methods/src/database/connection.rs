//! SQLite connection for the database profile.
//!
//! One connection is opened at startup and shared by every request; calls
//! run on the blocking pool since rusqlite is synchronous.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Number, Value};
use tracing::info;

use crate::error::DatabaseError;

const SCHEME: &str = "sqlite:///";

/// A parsed `sqlite:///<path>[?k=v&...]` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub path: PathBuf,
    option_keys: Vec<String>,
}

impl ConnectionDescriptor {
    pub fn parse(raw: &str) -> Result<Self, DatabaseError> {
        let rest = raw.strip_prefix(SCHEME).ok_or(DatabaseError::InvalidConnection)?;
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() {
            return Err(DatabaseError::InvalidConnection);
        }
        let option_keys = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').map_or(pair, |(k, _)| k).to_string())
            .collect();
        Ok(Self {
            path: PathBuf::from(path),
            option_keys,
        })
    }

    /// Option names from the query part, safe to log.
    pub fn option_keys(&self) -> Vec<&str> {
        self.option_keys.iter().map(String::as_str).collect()
    }
}

/// Shared handle to the profile's single connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open an existing database file. A missing file is an error, never
    /// silently created.
    pub fn open(descriptor: &ConnectionDescriptor) -> Result<Self, DatabaseError> {
        let path: &Path = &descriptor.path;
        if !path.is_file() {
            return Err(DatabaseError::NotFound(path.to_path_buf()));
        }
        let conn = Connection::open(path)?;
        info!(
            path = %path.display(),
            options = ?descriptor.option_keys(),
            "Connected to database"
        );
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `sql` and return every row as a column → value object.
    pub async fn query(&self, sql: String) -> Result<Vec<Map<String, Value>>, DatabaseError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> =
                stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut obj = Map::with_capacity(columns.len());
                for (i, name) in columns.iter().enumerate() {
                    obj.insert(name.clone(), to_json(row.get_ref(i)?));
                }
                out.push(obj);
            }
            Ok(out)
        })
        .await
    }

    /// Run a statement and return the number of rows it changed. Rows the
    /// statement yields are stepped through and discarded; a read-only
    /// statement changes nothing.
    pub async fn execute(&self, sql: String) -> Result<usize, DatabaseError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            if stmt.column_count() == 0 {
                return stmt.execute([]);
            }
            {
                let mut rows = stmt.raw_query();
                while rows.next()?.is_some() {}
            }
            if stmt.readonly() {
                return Ok(0);
            }
            Ok(usize::try_from(conn.changes()).unwrap_or(usize::MAX))
        })
        .await
    }

    /// Table name → ordered column descriptors, for every user table.
    pub async fn schema(&self) -> Result<Map<String, Value>, DatabaseError> {
        self.with_conn(|conn| {
            let mut tables_stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
            let tables = tables_stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut columns_stmt = conn.prepare(
                "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
            )?;
            let mut schema = Map::new();
            for table in tables {
                let columns = columns_stmt
                    .query_map([&table], |row| {
                        Ok(json!({
                            "name": row.get::<_, String>(0)?,
                            "type": row.get::<_, String>(1)?,
                            "not_null": row.get::<_, i64>(2)? != 0,
                            "primary_key": row.get::<_, i64>(3)? != 0,
                        }))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                schema.insert(table, Value::Array(columns));
            }
            Ok(schema)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| DatabaseError::Worker("connection lock poisoned".to_string()))?;
            f(&guard).map_err(DatabaseError::from)
        })
        .await
        .map_err(|e| DatabaseError::Worker(e.to_string()))?
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
