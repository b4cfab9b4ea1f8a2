//! Database-backed profile: raw SQL in, rows or counts out.
//!
//! Statements are passed to SQLite unmodified. Every store failure becomes
//! a `-32000` error envelope carrying SQLite's own message.

mod connection;

use std::sync::Arc;

use async_trait::async_trait;
use linewire_rpc::{
    MethodDefinition, MethodError, MethodHandler, MethodRegistry, ParamKind, Params, RegistryError,
};
use serde_json::{json, Value};
use tracing::{debug, info};

pub use connection::{ConnectionDescriptor, Database};

pub fn registry(db: Database) -> Result<MethodRegistry, RegistryError> {
    let db = Arc::new(db);
    let mut registry = MethodRegistry::new();
    registry.register(QueryMethod { db: Arc::clone(&db) })?;
    registry.register(ExecuteMethod { db: Arc::clone(&db) })?;
    registry.register(SchemaMethod { db })?;
    Ok(registry)
}

fn sql_preview(sql: &str) -> String {
    sql.chars().take(100).collect()
}

struct QueryMethod {
    db: Arc<Database>,
}

#[async_trait]
impl MethodHandler for QueryMethod {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("database/query", "Run a SQL query and return its rows")
            .required("sql", ParamKind::String, "SQL statement")
            .returns(json!({"data": "array", "row_count": "integer", "status": "string"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let sql = params.str("sql")?;
        debug!(sql = %sql_preview(sql), "Executing query");
        let rows = self
            .db
            .query(sql.to_string())
            .await
            .map_err(|e| e.into_method_error())?;
        info!(rows = rows.len(), "Query returned {} rows", rows.len());
        Ok(json!({
            "row_count": rows.len(),
            "data": rows,
            "status": "success",
        }))
    }
}

struct ExecuteMethod {
    db: Arc<Database>,
}

#[async_trait]
impl MethodHandler for ExecuteMethod {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("database/execute", "Run a mutating SQL statement")
            .required("sql", ParamKind::String, "SQL statement")
            .returns(json!({"rows_affected": "integer", "status": "string"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let sql = params.str("sql")?;
        debug!(sql = %sql_preview(sql), "Executing statement");
        let affected = self
            .db
            .execute(sql.to_string())
            .await
            .map_err(|e| e.into_method_error())?;
        info!(rows_affected = affected, "Execute completed");
        Ok(json!({ "rows_affected": affected, "status": "success" }))
    }
}

struct SchemaMethod {
    db: Arc<Database>,
}

#[async_trait]
impl MethodHandler for SchemaMethod {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("database/schema", "Describe every table and its columns")
            .returns(json!({"tables": "object", "status": "string"}))
    }

    async fn call(&self, _params: Params) -> Result<Value, MethodError> {
        let tables = self.db.schema().await.map_err(|e| e.into_method_error())?;
        info!(tables = tables.len(), "Schema info returned");
        Ok(json!({ "tables": tables, "status": "success" }))
    }
}
