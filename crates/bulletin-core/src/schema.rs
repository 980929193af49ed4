//! Relational schema of the bulletin application.
//!
//! Two tables: `bulletins`, one row per generated bulletin, and
//! `hymn_selections`, owned by a bulletin and deleted with it. Applying the
//! schema is idempotent, and every connection opened here enforces foreign
//! keys.

use crate::error::Result;
use crate::types::HymnPosition;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bulletins (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    parish_name       TEXT NOT NULL,
    service_date      TEXT NOT NULL,
    service_time      TEXT,
    service_type      TEXT,
    liturgical_season TEXT,
    filename          TEXT,
    file_path         TEXT,
    created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS hymn_selections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    bulletin_id INTEGER NOT NULL REFERENCES bulletins(id) ON DELETE CASCADE,
    position    TEXT NOT NULL
                CHECK (position IN ('opening', 'sequence', 'communion-1', 'communion-2', 'closing')),
    hymn_number TEXT NOT NULL,
    title       TEXT,
    tune        TEXT
);

CREATE INDEX IF NOT EXISTS idx_bulletins_service_date ON bulletins(service_date);
CREATE INDEX IF NOT EXISTS idx_hymn_selections_bulletin ON hymn_selections(bulletin_id);

CREATE TRIGGER IF NOT EXISTS bulletins_touch_updated_at
AFTER UPDATE ON bulletins
FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE bulletins SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
END;
"#;

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    apply(&conn)?;
    tracing::debug!(path = %path.display(), "bulletin schema ready");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    apply(&conn)?;
    Ok(conn)
}

/// Enable foreign keys and create any missing tables, indexes and triggers.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Bulletins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBulletin {
    pub parish_name: String,
    pub service_date: NaiveDate,
    pub service_time: Option<String>,
    pub service_type: Option<String>,
    pub liturgical_season: Option<String>,
    pub filename: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bulletin {
    pub id: i64,
    pub parish_name: String,
    pub service_date: NaiveDate,
    pub service_time: Option<String>,
    pub service_type: Option<String>,
    pub liturgical_season: Option<String>,
    pub filename: Option<String>,
    pub file_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub fn insert_bulletin(conn: &Connection, new: &NewBulletin) -> Result<i64> {
    conn.execute(
        "INSERT INTO bulletins
            (parish_name, service_date, service_time, service_type,
             liturgical_season, filename, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.parish_name,
            new.service_date,
            new.service_time,
            new.service_type,
            new.liturgical_season,
            new.filename,
            new.file_path,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bulletin(conn: &Connection, id: i64) -> Result<Option<Bulletin>> {
    let bulletin = conn
        .query_row(
            "SELECT id, parish_name, service_date, service_time, service_type,
                    liturgical_season, filename, file_path, created_at, updated_at
             FROM bulletins WHERE id = ?1",
            params![id],
            |row| {
                Ok(Bulletin {
                    id: row.get(0)?,
                    parish_name: row.get(1)?,
                    service_date: row.get(2)?,
                    service_time: row.get(3)?,
                    service_type: row.get(4)?,
                    liturgical_season: row.get(5)?,
                    filename: row.get(6)?,
                    file_path: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(bulletin)
}

/// Mark a bulletin as edited; the trigger moves `updated_at` to now.
/// Returns false when no such bulletin exists.
pub fn touch_bulletin(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute(
        "UPDATE bulletins SET updated_at = updated_at WHERE id = ?1",
        params![id],
    )?;
    Ok(n > 0)
}

/// Delete a bulletin and, through the cascade, its hymn selections.
pub fn delete_bulletin(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute("DELETE FROM bulletins WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

// ---------------------------------------------------------------------------
// Hymn selections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HymnSelection {
    pub position: HymnPosition,
    pub hymn_number: String,
    pub title: Option<String>,
    pub tune: Option<String>,
}

pub fn add_hymn_selection(
    conn: &Connection,
    bulletin_id: i64,
    selection: &HymnSelection,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO hymn_selections (bulletin_id, position, hymn_number, title, tune)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bulletin_id,
            selection.position.as_str(),
            selection.hymn_number,
            selection.title,
            selection.tune,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Selections of one bulletin in insertion order.
pub fn hymn_selections(conn: &Connection, bulletin_id: i64) -> Result<Vec<HymnSelection>> {
    let mut stmt = conn.prepare(
        "SELECT position, hymn_number, title, tune
         FROM hymn_selections WHERE bulletin_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![bulletin_id], selection_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<HymnSelection> {
    let raw: String = row.get(0)?;
    let position = HymnPosition::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown hymn position '{raw}'").into(),
        )
    })?;
    Ok(HymnSelection {
        position,
        hymn_number: row.get(1)?,
        title: row.get(2)?,
        tune: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use tempfile::TempDir;

    fn sample() -> NewBulletin {
        NewBulletin {
            parish_name: "St. Mark's".into(),
            service_date: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
            service_time: Some("10:00".into()),
            service_type: Some("Holy Eucharist Rite II".into()),
            liturgical_season: Some("Epiphany".into()),
            filename: Some("bulletin_2026-02-08.docx".into()),
            file_path: None,
        }
    }

    fn hymn(position: HymnPosition, number: &str) -> HymnSelection {
        HymnSelection {
            position,
            hymn_number: number.into(),
            title: None,
            tune: None,
        }
    }

    #[test]
    fn insert_and_read_back() {
        let conn = open_in_memory().unwrap();
        let id = insert_bulletin(&conn, &sample()).unwrap();
        let b = get_bulletin(&conn, id).unwrap().unwrap();
        assert_eq!(b.parish_name, "St. Mark's");
        assert_eq!(b.service_date, NaiveDate::from_ymd_opt(2026, 2, 8).unwrap());
        assert_eq!(b.created_at, b.updated_at);
        assert!(get_bulletin(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn selections_keep_insertion_order() {
        let conn = open_in_memory().unwrap();
        let id = insert_bulletin(&conn, &sample()).unwrap();
        let mut opening = hymn(HymnPosition::Opening, "390");
        opening.title = Some("Praise to the Lord, the Almighty".into());
        opening.tune = Some("Lobe den Herren".into());
        add_hymn_selection(&conn, id, &opening).unwrap();
        add_hymn_selection(&conn, id, &hymn(HymnPosition::Closing, "535")).unwrap();
        // position is not unique per bulletin
        add_hymn_selection(&conn, id, &hymn(HymnPosition::Closing, "541")).unwrap();

        let got = hymn_selections(&conn, id).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], opening);
        assert_eq!(got[2].hymn_number, "541");
    }

    #[test]
    fn deleting_bulletin_cascades() {
        let conn = open_in_memory().unwrap();
        let id = insert_bulletin(&conn, &sample()).unwrap();
        add_hymn_selection(&conn, id, &hymn(HymnPosition::Sequence, "50")).unwrap();

        assert!(delete_bulletin(&conn, id).unwrap());
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM hymn_selections", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(!delete_bulletin(&conn, id).unwrap());
    }

    #[test]
    fn selection_requires_existing_bulletin() {
        let conn = open_in_memory().unwrap();
        let err = add_hymn_selection(&conn, 42, &hymn(HymnPosition::Opening, "1")).unwrap_err();
        assert!(matches!(err, DeployError::Database(_)));
    }

    #[test]
    fn position_vocabulary_is_enforced() {
        let conn = open_in_memory().unwrap();
        let id = insert_bulletin(&conn, &sample()).unwrap();
        let res = conn.execute(
            "INSERT INTO hymn_selections (bulletin_id, position, hymn_number) VALUES (?1, 'offertory', '1')",
            params![id],
        );
        assert!(res.is_err());
    }

    #[test]
    fn touch_bumps_updated_at() {
        let conn = open_in_memory().unwrap();
        let id = insert_bulletin(&conn, &sample()).unwrap();
        conn.execute(
            "UPDATE bulletins SET updated_at = '2000-01-01 00:00:00' WHERE id = ?1",
            params![id],
        )
        .unwrap();

        assert!(touch_bulletin(&conn, id).unwrap());
        let b = get_bulletin(&conn, id).unwrap().unwrap();
        assert!(b.updated_at >= b.created_at);
        assert!(!touch_bulletin(&conn, id + 1).unwrap());
    }

    #[test]
    fn reapplying_schema_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bulletins.db");
        let id = {
            let conn = open(&path).unwrap();
            insert_bulletin(&conn, &sample()).unwrap()
        };
        let conn = open(&path).unwrap();
        apply(&conn).unwrap();
        assert!(get_bulletin(&conn, id).unwrap().is_some());
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
