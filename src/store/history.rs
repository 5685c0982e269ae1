use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::helpers::{parse_created_at, to_dimension, to_u64, truncate_chars, value_to_string};
use crate::snapshot::{RecordCounts, RecordReading, RecordSummary, IMAGE_KIND};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Reads counts and the latest `window` records inside one read transaction so
/// both views describe the same instant.
pub(super) fn read_history(
    conn: &mut Connection,
    window: usize,
    preview_chars: usize,
    images_dir: Option<&Path>,
) -> Result<RecordReading> {
    let tx = conn
        .transaction()
        .context("failed to open read transaction")?;

    let total: i64 = tx
        .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
        .context("failed to count history records")?;

    let mut by_kind = BTreeMap::new();
    {
        let mut stmt = tx
            .prepare("SELECT type, COUNT(*) FROM history GROUP BY type")
            .context("failed to prepare per-type count")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kind: Option<String> = row.get(0)?;
            let count: i64 = row.get(1)?;
            let kind = kind.unwrap_or_else(|| "unknown".to_string());
            *by_kind.entry(kind).or_insert(0) += to_u64(count, "type count")?;
        }
    }

    let mut latest = Vec::with_capacity(window);
    {
        let mut stmt = tx
            .prepare(
                "SELECT id, type, value, width, height, createTime
                 FROM history
                 ORDER BY createTime DESC
                 LIMIT ?1",
            )
            .context("failed to prepare latest records query")?;
        let mut rows = stmt.query(params![window as i64])?;
        while let Some(row) = rows.next()? {
            let id = value_to_string(row.get_ref(0)?);
            let kind: Option<String> = row.get(1)?;
            let value: Option<String> = row.get(2)?;
            let width: Option<i64> = row.get(3)?;
            let height: Option<i64> = row.get(4)?;
            let created_raw: Option<String> = row.get(5)?;

            let created_at = match created_raw.as_deref().map(parse_created_at) {
                Some(Ok(created_at)) => created_at,
                Some(Err(err)) => {
                    log_warn!("skipping record {id}: {err:#}");
                    continue;
                }
                None => {
                    log_warn!("skipping record {id}: missing createTime");
                    continue;
                }
            };

            let kind = kind.unwrap_or_else(|| "unknown".to_string());
            let value = value.unwrap_or_default();
            let artifact_present =
                (kind == IMAGE_KIND).then(|| artifact_exists(&value, images_dir));

            latest.push(RecordSummary {
                id,
                truncated_value: truncate_chars(&value, preview_chars),
                kind,
                width: to_dimension(width),
                height: to_dimension(height),
                created_at,
                artifact_present,
            });
        }
    }

    tx.commit().context("failed to close read transaction")?;

    // Text ordering in SQL is only right when every row uses the same format.
    latest.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(RecordReading {
        counts: RecordCounts::from_parts(by_kind, to_u64(total, "total")?),
        latest,
    })
}

fn artifact_exists(value: &str, images_dir: Option<&Path>) -> bool {
    let path = Path::new(value);
    if path.is_absolute() {
        return path.exists();
    }
    match (images_dir, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name).exists(),
        _ => path.exists(),
    }
}
