//! Database profile driven through the dispatch loop.

use std::sync::Arc;

use linewire_methods::database::{self, ConnectionDescriptor, Database};
use linewire_rpc::{RpcServer, StreamTransport};
use serde_json::{json, Value};

async fn serve(db: Database, requests: &[Value]) -> Vec<Value> {
    let input = requests
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    let registry = database::registry(db).unwrap();
    let mut server = RpcServer::new(Arc::new(registry)).with_name("sqlite-test");
    let mut transport = StreamTransport::new(input.as_bytes(), Vec::new());
    server.run(&mut transport).await.unwrap();

    String::from_utf8(transport.into_writer())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn file_database(dir: &std::path::Path) -> Database {
    let path = dir.join("store.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
        .unwrap();
    drop(conn);
    let descriptor = ConnectionDescriptor::parse(&format!("sqlite:///{}", path.display())).unwrap();
    Database::open(&descriptor).unwrap()
}

#[tokio::test]
async fn test_select_one() {
    let out = serve(
        Database::open_in_memory().unwrap(),
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "database/query", "params": {"sql": "SELECT 1 AS x"}})],
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[0]["result"]["data"], json!([{"x": 1}]));
    assert_eq!(out[0]["result"]["row_count"], 1);
    assert_eq!(out[0]["result"]["status"], "success");
    assert!(out[0].get("error").is_none());
}

#[tokio::test]
async fn test_invalid_sql_keeps_serving() {
    let out = serve(
        Database::open_in_memory().unwrap(),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "database/query", "params": {"sql": "SELEKT * FRUM nowhere"}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "database/query", "params": {"sql": "SELECT 2 AS y"}}),
        ],
    )
    .await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32000);
    let msg = out[0]["error"]["message"].as_str().unwrap();
    assert!(msg.contains("syntax error"), "{msg}");
    assert!(out[0].get("result").is_none());
    assert_eq!(out[1]["result"]["data"], json!([{"y": 2}]));
}

#[tokio::test]
async fn test_schema_of_declared_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = serve(
        file_database(dir.path()),
        &[json!({"jsonrpc": "2.0", "id": "s", "method": "database/schema"})],
    )
    .await;
    assert_eq!(
        out[0]["result"]["tables"]["t"],
        json!([
            {"name": "id", "type": "INTEGER", "not_null": false, "primary_key": true},
            {"name": "name", "type": "TEXT", "not_null": true, "primary_key": false},
        ])
    );
}

#[tokio::test]
async fn test_writes_persist_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let out = serve(
        file_database(dir.path()),
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "database/execute", "params": {"sql": "INSERT INTO t (name) VALUES ('kept')"}})],
    )
    .await;
    assert_eq!(out[0]["result"]["rows_affected"], 1);

    let conn = rusqlite::Connection::open(dir.path().join("store.db")).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM t WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "kept");
}
