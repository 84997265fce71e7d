use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StoreError;
use crate::record::{StudentInput, StudentRecord, COURSEWORK_MARK_MAX, EXAM_MARK_MAX};

/// Result of parsing a marks file, plus what was dropped on the way.
#[derive(Debug, Default)]
pub struct ParsedMarks {
    pub records: Vec<StudentRecord>,
    /// Count from the first line, when the file has one.
    pub declared_count: Option<usize>,
    pub skipped_lines: Vec<usize>,
}

pub fn load_marks_file(path: &Path) -> Result<ParsedMarks, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::SourceNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(StoreError::LoadFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let parsed = parse_marks_text(&text);
    tracing::info!(
        path = %path.display(),
        records = parsed.records.len(),
        declared = ?parsed.declared_count,
        skipped = parsed.skipped_lines.len(),
        "loaded student file"
    );
    Ok(parsed)
}

/// Accepts both the count-prefixed layout and the older one-record-per-line
/// layout. Malformed record lines are dropped, never fatal.
pub fn parse_marks_text(text: &str) -> ParsedMarks {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();

    // A negative count still marks the prefixed layout; it just selects nothing.
    let declared_count = lines
        .first()
        .and_then(|first| first.trim().parse::<i64>().ok())
        .map(|n| usize::try_from(n).unwrap_or(0));

    // (1-based line number, content)
    let record_lines: Vec<(usize, &str)> = match declared_count {
        Some(n) => lines
            .iter()
            .enumerate()
            .skip(1)
            .take(n)
            .map(|(i, l)| (i + 1, *l))
            .collect(),
        None => lines.iter().enumerate().map(|(i, l)| (i + 1, *l)).collect(),
    };

    let mut out = ParsedMarks {
        declared_count,
        ..ParsedMarks::default()
    };
    for (line_no, raw) in record_lines {
        if raw.trim().is_empty() {
            continue;
        }
        match parse_record_line(raw) {
            Some(input) => out.records.push(StudentRecord::from_input(input)),
            None => {
                tracing::debug!(line = line_no, "skipping malformed student line");
                out.skipped_lines.push(line_no);
            }
        }
    }

    warn_on_suspect_records(&out.records);
    out
}

fn parse_record_line(line: &str) -> Option<StudentInput> {
    let parts: Vec<&str> = line.split(',').map(|p| p.trim()).collect();
    if parts.len() < 6 {
        return None;
    }
    let input = StudentInput {
        code: parts[0].to_string(),
        name: parts[1].to_string(),
        c1: parts[2].parse::<i64>().ok()?,
        c2: parts[3].parse::<i64>().ok()?,
        c3: parts[4].parse::<i64>().ok()?,
        exam: parts[5].parse::<i64>().ok()?,
    };
    // Marks whose total does not fit an i64 cannot produce a record.
    input
        .c1
        .checked_add(input.c2)?
        .checked_add(input.c3)?
        .checked_add(input.exam)?;
    Some(input)
}

// Loading does not validate, but hand-edited files are worth flagging.
fn warn_on_suspect_records(records: &[StudentRecord]) {
    let mut seen: HashSet<String> = HashSet::new();
    for r in records {
        if !seen.insert(r.code().to_lowercase()) {
            tracing::warn!(code = r.code(), "duplicate student code in file");
        }
        let marks_ok = r
            .coursework_marks()
            .iter()
            .all(|m| (0..=COURSEWORK_MARK_MAX).contains(m))
            && (0..=EXAM_MARK_MAX).contains(&r.exam());
        if !marks_ok {
            tracing::warn!(code = r.code(), "student marks outside allowed range");
        }
    }
}

pub fn render_marks_text(records: &[StudentRecord]) -> String {
    let mut out = format!("{}\n", records.len());
    for r in records {
        let [c1, c2, c3] = r.coursework_marks();
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.code(),
            r.name(),
            c1,
            c2,
            c3,
            r.exam()
        ));
    }
    out
}

/// Rewrites the whole file: temp sibling, fsync, then rename over the target.
pub fn save_marks_file(path: &Path, records: &[StudentRecord]) -> Result<(), StoreError> {
    let persist_err = |source: std::io::Error| StoreError::PersistFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let tmp = temp_sibling(path);
    let written = write_and_sync(&tmp, render_marks_text(records).as_bytes())
        .and_then(|_| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        tracing::error!(path = %path.display(), error = %e, "failed to save student file");
        return Err(persist_err(e));
    }

    tracing::debug!(path = %path.display(), records = records.len(), "saved student file");
    Ok(())
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("students");
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Grade;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn count_prefixed_file_parses_in_order() {
        let parsed = parse_marks_text("2\nS1,Alice,18,17,19,80\nS2,Bob,5,5,5,20\n");
        assert_eq!(parsed.declared_count, Some(2));
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].code(), "S1");
        assert_eq!(parsed.records[0].grade(), Grade::A);
        assert_eq!(parsed.records[1].name(), "Bob");
        assert_eq!(parsed.records[1].grade(), Grade::F);
    }

    #[test]
    fn count_limits_consumed_lines() {
        let parsed = parse_marks_text("1\nS1,Alice,1,1,1,1\nS2,Bob,2,2,2,2\n");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].code(), "S1");
    }

    #[test]
    fn file_without_count_reads_every_non_blank_line() {
        let parsed = parse_marks_text("S1,Alice,1,1,1,1\n\n  \nS2,Bob,2,2,2,2\n");
        assert_eq!(parsed.declared_count, None);
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.skipped_lines.is_empty());
    }

    #[test]
    fn malformed_lines_are_dropped_whole() {
        let text = "4\nS1,Alice,1,1,1\nS2,Bob,x,2,2,2\nS3 , Cara , 3 , 3 , 3 , 30 \nS4,Dan,4,4,4,4.5\n";
        let parsed = parse_marks_text(text);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].code(), "S3");
        assert_eq!(parsed.records[0].name(), "Cara");
        assert_eq!(parsed.skipped_lines, vec![2, 3, 5]);
    }

    #[test]
    fn marks_that_overflow_the_total_are_skipped() {
        let text = "3\nS1,A,9223372036854775807,1,0,0\nS2,B,-9223372036854775808,0,0,-1\nS3,C,99,0,0,500\n";
        let parsed = parse_marks_text(text);
        assert_eq!(parsed.skipped_lines, vec![2, 3]);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].code(), "S3");
        assert_eq!(parsed.records[0].overall(), 599);
    }

    #[test]
    fn leading_bom_is_ignored() {
        let parsed = parse_marks_text("\u{feff}1\nS1,Alice,1,1,1,1\n");
        assert_eq!(parsed.declared_count, Some(1));
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn render_writes_only_raw_fields() {
        let parsed = parse_marks_text("S1, Alice ,18,17,19,80\n");
        assert_eq!(
            render_marks_text(&parsed.records),
            "1\nS1,Alice,18,17,19,80\n"
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = temp_dir("studentd-marks-missing");
        let err = load_marks_file(&dir.join("nope.txt")).expect_err("missing file");
        assert!(matches!(err, StoreError::SourceNotFound { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn save_replaces_file_and_leaves_no_temp() {
        let dir = temp_dir("studentd-marks-save");
        let path = dir.join("nested").join("studentmarks.txt");
        let parsed = parse_marks_text("S1,Alice,18,17,19,80\nS2,Bob,5,5,5,20\n");

        save_marks_file(&path, &parsed.records).expect("save");
        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, "2\nS1,Alice,18,17,19,80\nS2,Bob,5,5,5,20\n");

        save_marks_file(&path, &parsed.records[..1]).expect("save again");
        let reloaded = load_marks_file(&path).expect("reload");
        assert_eq!(reloaded.records.len(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }
}
