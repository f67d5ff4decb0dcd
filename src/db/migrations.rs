use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{params, Connection};

/// Applies every `migrations/*.sql` file not yet recorded in `_migrations`,
/// in file-name order. Each file and its bookkeeping row commit together.
pub fn run_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    let Some(dir) = migrations_dir() else {
        tracing::warn!("migrations directory not found, skipping");
        return Ok(());
    };

    let applied = applied_names(conn)?;
    for path in sql_files(&dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if applied.contains(&name) {
            continue;
        }

        let sql = fs::read_to_string(&path)
            .with_context(|| format!("failed to read migration file: {name}"))?;

        let tx = conn.transaction()?;
        tx.execute_batch(&sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;
        tx.execute("INSERT INTO _migrations (name) VALUES (?1)", params![name])
            .with_context(|| format!("failed to record migration: {name}"))?;
        tx.commit()
            .with_context(|| format!("failed to commit migration: {name}"))?;

        tracing::info!(migration = %name, "applied migration");
    }

    Ok(())
}

/// `./migrations` when run from the project root, else the crate's own copy.
fn migrations_dir() -> Option<PathBuf> {
    [
        PathBuf::from("migrations"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    ]
    .into_iter()
    .find(|p| p.is_dir())
}

fn applied_names(conn: &Connection) -> anyhow::Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM _migrations")
        .context("failed to read applied migrations")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(names)
}

fn sql_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .context("failed to read migrations directory")?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|ext| ext == "sql").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}
