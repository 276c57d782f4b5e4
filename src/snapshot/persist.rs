use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::error::{Result, SnapshotError};
use super::types::SnapshotRecord;

/// Write records as pretty-printed UTF-8 JSON.
///
/// Each call writes to its own uniquely named temp file next to `path` and
/// renames it into place once flushed. Readers never see a half-written
/// file and concurrent writers never share a temp file.
pub fn write_records(path: &Path, records: &[SnapshotRecord]) -> Result<()> {
    let persist_err = |source| SnapshotError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;

    let write = |file: &mut fs::File| -> std::io::Result<()> {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    };
    // On error the temp file is removed when `tmp` drops.
    write(tmp.as_file_mut()).map_err(persist_err)?;

    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

/// Read back a file produced by [`write_records`].
pub fn read_records(path: &Path) -> Result<Vec<SnapshotRecord>> {
    let persist_err = |source| SnapshotError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(persist_err)?;
    serde_json::from_slice(&bytes).map_err(|e| persist_err(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<SnapshotRecord> {
        serde_json::from_value(json!([
            { "answer_text_markdown": "Große Veränderungen 🚀", "rank": 1 },
            { "answer_text_markdown": "second", "rank": 2 },
        ]))
        .unwrap()
    }

    #[test]
    fn written_file_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot_results.json");

        write_records(&path, &records()).unwrap();

        assert_eq!(read_records(&path).unwrap(), records());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_writers_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot_result_chatgpt.json");

        for _ in 0..10 {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let path = path.clone();
                    std::thread::spawn(move || {
                        let records: Vec<SnapshotRecord> =
                            serde_json::from_value(json!([{ "answer_text_markdown": "x", "writer": n }]))
                                .unwrap();
                        write_records(&path, &records)
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let written = read_records(&path).unwrap();
            assert_eq!(written.len(), 1);
            assert!(written[0].get("writer").is_some());
        }

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_records(&path, &records()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Große Veränderungen 🚀"));
        assert!(text.contains("\n  {"));
    }

    #[test]
    fn missing_directory_reports_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.json");

        let err = write_records(&path, &records()).unwrap_err();
        assert!(matches!(err, SnapshotError::Persist { .. }));
    }
}
