use rusqlite::{Connection, Result};

/// Initialize media library database schema
pub fn init_media_schema(conn: &Connection) -> Result<()> {
    // Schema version table for the media library
    conn.execute(
        "CREATE TABLE IF NOT EXISTS media_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM media_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_media_schema_v1(conn)?;
        conn.execute("INSERT INTO media_schema_version (version) VALUES (1)", [])?;
    }

    if current_version < 2 {
        migrate_media_v2(conn)?;
        conn.execute("INSERT INTO media_schema_version (version) VALUES (2)", [])?;
    }

    Ok(())
}

/// Create media schema version 1
fn create_media_schema_v1(conn: &Connection) -> Result<()> {
    // Table: media - captured photos and videos with their payload
    conn.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id TEXT PRIMARY KEY,
            server_id TEXT,
            project_id TEXT,
            local_project_id TEXT,
            media_type TEXT NOT NULL DEFAULT 'photo' CHECK(media_type IN ('photo', 'video')),
            caption TEXT,
            width INTEGER,
            height INTEGER,
            mime_type TEXT NOT NULL,
            blob BLOB NOT NULL,
            thumbnail BLOB,
            blob_size INTEGER NOT NULL DEFAULT 0,
            sync_status TEXT NOT NULL DEFAULT 'pending' CHECK(sync_status IN ('pending', 'syncing', 'synced', 'error')),
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_attempt INTEGER,
            error TEXT,
            pending_tag_ids TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_media_project ON media(project_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_media_local_project ON media(local_project_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_media_sync_status ON media(sync_status)",
        [],
    )?;

    Ok(())
}

/// Version 2: soft deletes and the locally kept annotation document
fn migrate_media_v2(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE media ADD COLUMN deleted_at INTEGER", [])?;
    // JSON text; 'null' records a local delete of the annotation
    conn.execute("ALTER TABLE media ADD COLUMN annotation TEXT", [])?;
    Ok(())
}
