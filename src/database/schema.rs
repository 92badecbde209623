use rusqlite::{Connection, Result};

/// Initialize complete database schema for the sync engine
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Schema version table for future migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    if current_version < 2 {
        // soft delete: the row stays until the server confirms the delete
        conn.execute("ALTER TABLE projects ADD COLUMN deleted_at INTEGER", [])?;
        conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    }

    // Media rows are owned by the media library crate
    media_library::init_media_schema(conn)?;

    Ok(())
}

/// Create the schema (version 1)
fn create_schema(conn: &Connection) -> Result<()> {
    // Table: projects (created offline, confirmed by the server later)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            server_id TEXT,
            name TEXT NOT NULL,
            description TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending' CHECK(sync_status IN ('pending', 'synced', 'error')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_projects_server_id ON projects(server_id)",
        [],
    )?;

    // Table: sync_queue (pending mutations, one row per deterministic id)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL CHECK(item_type IN ('project', 'photo', 'annotation')),
            local_id TEXT NOT NULL,
            project_id TEXT,
            action TEXT NOT NULL CHECK(action IN ('create', 'update', 'delete')),
            data TEXT NOT NULL DEFAULT 'null',
            retry_count INTEGER NOT NULL DEFAULT 0 CHECK(retry_count >= 0),
            last_attempt INTEGER,
            created_at INTEGER NOT NULL,
            error TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_type ON sync_queue(item_type, created_at DESC)",
        [],
    )?;

    // Table: upload_sessions (server-side chunked upload anchors)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS upload_sessions (
            media_id TEXT PRIMARY KEY,
            upload_id TEXT NOT NULL,
            total_chunks INTEGER NOT NULL,
            chunk_size INTEGER NOT NULL,
            completed_chunks TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('projects', 'media', 'sync_queue', 'upload_sessions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }
}
