use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const USERS_MD: &str = r#"---
database: shop
version: 2
---
# Shop Users

Database: shop

## Table: users
Registered customer accounts.

| Column | Type | Key | Description |
|--------|------|-----|-------------|
| user_id | INT NOT NULL | PK | Unique user id |
| email | VARCHAR(255) | | Login email |
"#;

const ORDERS_MD: &str = r#"# Orders

## orders table
Customer orders.

| Column | Type | Key | Description |
|---|---|---|---|
| order_id | INT NOT NULL | PK | Order id |
| user_id | INT | FK | Buyer |
| total | DECIMAL(10,2) | | Order total |

FK: user_id -> users.user_id
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    setup_with_sql_section("allow_write = false\nmax_results = 50\n")
}

fn setup_with_sql_section(sql: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let schema_dir = root.join("schema_docs");
    fs::create_dir_all(&schema_dir).unwrap();
    fs::write(schema_dir.join("users.md"), USERS_MD).unwrap();
    fs::write(schema_dir.join("orders.md"), ORDERS_MD).unwrap();
    fs::write(schema_dir.join("notes.txt"), "## Table: ignored\n| a | INT |\n").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[data]
schema_path = "{}"
file_extensions = ["md"]

[sql]
{}
[retrieval]
top_k = 3

[logging]
level = "warn"
"#,
        schema_dir.display(),
        sql
    );
    let config_path = config_dir.join("dbchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dbchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_dbchat"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dbchat binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_schema_tables() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_dbchat(&config, &["schema", "tables"]);
    assert!(success, "stderr: {}", stderr);
    assert_eq!(stdout, "orders\nusers\n");
}

#[test]
fn test_schema_summary() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["schema", "summary"]);
    assert!(success);
    assert!(stdout.starts_with("Database Schema Summary\n"));
    assert!(stdout.contains("Total tables: 2\n"));
    assert!(stdout.contains("Table: users\n  Description: Registered customer accounts.\n  Columns: 2\n  Primary Keys: user_id\n"));
    assert!(stdout.contains("  Foreign Keys: user_id\n"));
}

#[test]
fn test_schema_show_is_case_insensitive() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["schema", "show", "ORDERS"]);
    assert!(success);
    assert!(stdout.contains("Table: orders\nDescription: Customer orders.\n"));
    assert!(stdout.contains("  - order_id (INT) [PK] NOT NULL - Order id\n"));
    assert!(stdout.contains("  - user_id (INT) [FK] - Buyer\n"));
    assert!(stdout.contains("Relationships:\n  - user_id -> users.user_id\n"));
}

#[test]
fn test_schema_show_unknown_table_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_dbchat(&config, &["schema", "show", "payments"]);
    assert!(!success);
    assert!(stderr.contains("Table not found: payments"));
}

#[test]
fn test_schema_context() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["schema", "context"]);
    assert!(success);
    assert!(stdout.starts_with("Available Database Schema:\n\n"));
    assert!(stdout.contains("  - email (VARCHAR(255)) - Login email\n"));
}

#[test]
fn test_schema_export_to_file() {
    let (tmp, config) = setup_test_env();
    let out = tmp.path().join("export").join("schema.json");
    let (stdout, stderr, success) = run_dbchat(
        &config,
        &["schema", "export", "--output", out.to_str().unwrap()],
    );
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.is_empty());

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["metadata"]["database"], "shop");
    assert_eq!(value["metadata"]["version"], 2);
    assert_eq!(value["tables"]["users"]["columns"][0]["name"], "user_id");
    assert_eq!(value["tables"]["users"]["columns"][0]["nullable"], false);
    assert_eq!(value["tables"]["orders"]["relationships"][0]["references_table"], "users");
}

#[test]
fn test_sql_check_safe_and_unsafe() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["sql", "check", "SELECT * FROM users"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Query is safe");

    let (_, stderr, success) = run_dbchat(&config, &["sql", "check", "DROP TABLE users"]);
    assert!(!success);
    assert!(stderr.contains("Query contains forbidden operation: DROP"));

    let (_, stderr, success) = run_dbchat(&config, &["sql", "check", "VALUES (1)"]);
    assert!(!success);
    assert!(stderr.contains("Query must start with SELECT, WITH, SHOW, DESCRIBE, or EXPLAIN"));
}

#[test]
fn test_sql_sanitize() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(
        &config,
        &["sql", "sanitize", "SELECT *\n  FROM users /* all */ -- trailing"],
    );
    assert!(success);
    assert_eq!(stdout, "SELECT * FROM users\n");
}

#[test]
fn test_sql_prepare_applies_configured_limit() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) =
        run_dbchat(&config, &["sql", "prepare", "select o.total from orders o;"]);
    assert!(success, "stderr: {}", stderr);
    assert_eq!(stdout.trim(), "select o.total from orders o LIMIT 50");
}

#[test]
fn test_sql_prepare_rejects_unknown_table() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_dbchat(&config, &["sql", "prepare", "SELECT * FROM payments"]);
    assert!(!success);
    assert!(stderr.contains("Query rejected: Unknown tables: payments"));
}

#[test]
fn test_sql_tables() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_dbchat(
        &config,
        &["sql", "tables", "SELECT * FROM Users JOIN orders ON 1=1"],
    );
    assert!(success);

    let (_, stderr, success) = run_dbchat(&config, &["sql", "tables", "SELECT * FROM refunds"]);
    assert!(!success);
    assert!(stderr.contains("Unknown tables: refunds"));
}

#[test]
fn test_documents_listing() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["documents"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("orders.md"));
    assert!(lines[1].starts_with("users.md"));
    assert!(lines[1].contains("title=Shop Users"));
    assert!(lines[1].contains("tables=[users]"));
}

#[test]
fn test_search() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["search", "email"]);
    assert!(success);
    assert!(stdout.starts_with("Result 1 (Score: 1.000):"));
    assert!(stdout.contains("users.md"));
    assert!(!stdout.contains("orders.md"));

    let (stdout, _, success) = run_dbchat(&config, &["search", "warehouse"]);
    assert!(success);
    assert_eq!(stdout.trim(), "No relevant documents found.");
}

#[test]
fn test_tools_list_and_call() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(&config, &["tools", "list"]);
    assert!(success);
    for name in ["rag_search", "schema_info", "sql_query"] {
        assert!(stdout.contains(name), "missing tool {}", name);
    }

    let (stdout, _, success) = run_dbchat(
        &config,
        &["tools", "call", "schema_info", "--param", "table=users"],
    );
    assert!(success);
    assert!(stdout.contains("Referenced by:\n  - orders.user_id -> user_id"));

    let (_, stderr, success) = run_dbchat(
        &config,
        &["tools", "call", "sql_query", "--param", "query=DELETE FROM users"],
    );
    assert!(!success);
    assert!(stderr.contains("Query rejected: Query contains forbidden operation: DELETE"));

    let (_, stderr, success) = run_dbchat(&config, &["tools", "call", "run_python"]);
    assert!(!success);
    assert!(stderr.contains("Unknown tool: run_python"));
}

#[test]
fn test_write_enabled_config_is_refused() {
    let (_tmp, config) = setup_with_sql_section("allow_write = true\n");
    let (_, stderr, success) = run_dbchat(&config, &["sql", "check", "SELECT 1"]);
    assert!(!success);
    assert!(stderr.contains("SQL write operations are not allowed"));
}

#[test]
fn test_missing_schema_dir_gives_empty_schema() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_dbchat(
        &config,
        &[
            "--schema-path",
            tmp.path().join("absent").to_str().unwrap(),
            "schema",
            "summary",
        ],
    );
    assert!(success);
    assert!(stdout.contains("Total tables: 0\n"));
}
