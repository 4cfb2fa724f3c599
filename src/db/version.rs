//! Remote-version bookkeeping (spec §4.4.1): every entity table carries a
//! `remote_version` column so the push path can read a local baseline to
//! hand the conflict transaction, and the pull path can stamp whatever
//! version the server returned.
//!
//! Kept as one small module parameterized by `Collection` rather than
//! duplicated per collection file, since the column and its semantics are
//! identical across every table (spec §3: `_version` is the same concept
//! everywhere a document has one).

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::types::Collection;

pub fn local_version_conn(
    conn: &Connection,
    collection: Collection,
    document_id: &str,
) -> Result<i64> {
    let version: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT remote_version FROM {t} WHERE id = ?1",
                t = collection.as_str()
            ),
            params![document_id],
            |row| row.get(0),
        )
        .ok();
    Ok(version.unwrap_or(0))
}

pub fn set_remote_version_conn(
    conn: &Connection,
    collection: Collection,
    document_id: &str,
    version: i64,
) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {t} SET remote_version = ?1 WHERE id = ?2",
            t = collection.as_str()
        ),
        params![version, document_id],
    )?;
    Ok(())
}
