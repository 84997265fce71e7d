use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{StoreError, Violation};
use crate::marks_file;
use crate::record::{StudentInput, StudentPatch, StudentRecord, COURSEWORK_MARK_MAX, EXAM_MARK_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<SortDirection> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Ascending),
            "desc" | "descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub count: usize,
    pub average_percentage: f64,
}

/// Characters that would break the comma-separated, line-counted file layout.
const FORBIDDEN_TEXT_CHARS: [char; 3] = [',', '\n', '\r'];

/// Checks a candidate against the collection. Every rule is evaluated so the
/// caller can report all of them at once; `excluding` skips the record being
/// updated in place during the duplicate-code check.
pub fn validate(
    candidate: StudentInput,
    records: &[StudentRecord],
    excluding: Option<usize>,
) -> Result<StudentRecord, StoreError> {
    let code = candidate.code.trim().to_string();
    let name = candidate.name.trim().to_string();
    let mut violations: Vec<Violation> = Vec::new();

    if code.is_empty() {
        violations.push(Violation::EmptyField { field: "code" });
    }
    if name.is_empty() {
        violations.push(Violation::EmptyField { field: "name" });
    }
    for (field, value) in [("code", &code), ("name", &name)] {
        if value.contains(FORBIDDEN_TEXT_CHARS) {
            violations.push(Violation::ForbiddenCharacter { field });
        }
    }

    let marks = [
        ("c1", candidate.c1, COURSEWORK_MARK_MAX),
        ("c2", candidate.c2, COURSEWORK_MARK_MAX),
        ("c3", candidate.c3, COURSEWORK_MARK_MAX),
        ("exam", candidate.exam, EXAM_MARK_MAX),
    ];
    for (field, value, max) in marks {
        if !(0..=max).contains(&value) {
            violations.push(Violation::MarkOutOfRange {
                field,
                value,
                min: 0,
                max,
            });
        }
    }

    if !code.is_empty() {
        let clash = records
            .iter()
            .enumerate()
            .any(|(i, r)| Some(i) != excluding && r.code_matches(&code));
        if clash {
            violations.push(Violation::DuplicateCode { code: code.clone() });
        }
    }

    if !violations.is_empty() {
        return Err(StoreError::ValidationFailed(violations));
    }

    Ok(StudentRecord::from_input(StudentInput {
        code,
        name,
        ..candidate
    }))
}

/// Owns the ordered collection and its backing file. Every successful
/// mutation rewrites the file before returning.
#[derive(Debug)]
pub struct StudentStore {
    path: PathBuf,
    records: Vec<StudentRecord>,
    // In-memory state newer than the file (a save failed).
    dirty: bool,
}

impl StudentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let parsed = marks_file::load_marks_file(path)?;
        Ok(StudentStore {
            path: path.to_path_buf(),
            records: parsed.records,
            dirty: false,
        })
    }

    /// Missing file means an empty collection; the file appears on first save.
    pub fn open_or_empty(path: &Path) -> Result<Self, StoreError> {
        match Self::open(path) {
            Ok(s) => Ok(s),
            Err(StoreError::SourceNotFound { .. }) => {
                tracing::info!(path = %path.display(), "student file missing, starting empty");
                Ok(StudentStore {
                    path: path.to_path_buf(),
                    records: Vec::new(),
                    dirty: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-reads the backing file. Refuses to drop unsaved changes unless
    /// `force` is set.
    pub fn reload(&mut self, force: bool) -> Result<usize, StoreError> {
        self.ensure_saved(force)?;
        let parsed = marks_file::load_marks_file(&self.path)?;
        self.records = parsed.records;
        self.dirty = false;
        Ok(self.records.len())
    }

    pub fn ensure_saved(&self, force: bool) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        if force {
            tracing::warn!(path = %self.path.display(), "discarding unsaved student changes");
            return Ok(());
        }
        Err(StoreError::UnsavedChanges {
            path: self.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn list(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Result<&StudentRecord, StoreError> {
        self.records.get(index).ok_or(StoreError::OutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn position_of(&self, code: &str) -> Result<usize, StoreError> {
        self.records
            .iter()
            .position(|r| r.code_matches(code))
            .ok_or_else(|| StoreError::UnknownCode {
                code: code.trim().to_string(),
            })
    }

    pub fn add(&mut self, candidate: StudentInput) -> Result<StudentRecord, StoreError> {
        let record = validate(candidate, &self.records, None)?;
        self.records.push(record.clone());
        tracing::info!(code = record.code(), index = self.records.len() - 1, "student added");
        self.persist()?;
        Ok(record)
    }

    pub fn update(&mut self, index: usize, patch: &StudentPatch) -> Result<StudentRecord, StoreError> {
        let current = self.get(index)?;
        let candidate = patch.apply_to(&current.to_input());
        let record = validate(candidate, &self.records, Some(index))?;
        self.records[index] = record.clone();
        tracing::info!(code = record.code(), index, "student updated");
        self.persist()?;
        Ok(record)
    }

    pub fn delete(&mut self, index: usize) -> Result<StudentRecord, StoreError> {
        if index >= self.records.len() {
            return Err(StoreError::OutOfRange {
                index,
                len: self.records.len(),
            });
        }
        let removed = self.records.remove(index);
        tracing::info!(code = removed.code(), index, "student deleted");
        self.persist()?;
        Ok(removed)
    }

    /// First record, in collection order, whose code or name contains the
    /// query (case-insensitive).
    pub fn find_by_text(&self, query: &str) -> Result<(usize, &StudentRecord), StoreError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(StoreError::NoMatch {
                query: query.to_string(),
            });
        }
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| r.matches_text(&needle))
            .ok_or_else(|| StoreError::NoMatch {
                query: query.trim().to_string(),
            })
    }

    pub fn highest(&self) -> Result<(usize, &StudentRecord), StoreError> {
        self.extremum(Ordering::Greater)
    }

    pub fn lowest(&self) -> Result<(usize, &StudentRecord), StoreError> {
        self.extremum(Ordering::Less)
    }

    // Replaces the current pick only on a strict win, so ties go to the
    // earliest record.
    fn extremum(&self, wins: Ordering) -> Result<(usize, &StudentRecord), StoreError> {
        let mut it = self.records.iter().enumerate();
        let mut best = it.next().ok_or(StoreError::EmptyCollection)?;
        for (i, r) in it {
            if r.percentage().total_cmp(&best.1.percentage()) == wins {
                best = (i, r);
            }
        }
        Ok(best)
    }

    /// Stable sorted view paired with each record's stored position; storage
    /// order is untouched.
    pub fn sorted_by_percentage(&self, direction: SortDirection) -> Vec<(usize, &StudentRecord)> {
        let mut view: Vec<(usize, &StudentRecord)> = self.records.iter().enumerate().collect();
        match direction {
            SortDirection::Ascending => {
                view.sort_by(|a, b| a.1.percentage().total_cmp(&b.1.percentage()))
            }
            SortDirection::Descending => {
                view.sort_by(|a, b| b.1.percentage().total_cmp(&a.1.percentage()))
            }
        }
        view
    }

    pub fn summary(&self) -> CollectionSummary {
        summarize(&self.records)
    }

    /// Rewrites the backing file from memory.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.persist()
    }

    /// Swaps in a whole new collection. Each record goes through the same
    /// checks as `add`, against the ones accepted before it; any failure
    /// rejects the lot and leaves the current collection alone.
    pub fn replace_all(&mut self, records: Vec<StudentRecord>) -> Result<usize, StoreError> {
        let mut accepted: Vec<StudentRecord> = Vec::with_capacity(records.len());
        let mut violations: Vec<Violation> = Vec::new();
        for r in records {
            match validate(r.to_input(), &accepted, None) {
                Ok(v) => accepted.push(v),
                Err(e) => violations.extend_from_slice(e.violations()),
            }
        }
        if !violations.is_empty() {
            tracing::warn!(violations = violations.len(), "rejected replacement collection");
            return Err(StoreError::ValidationFailed(violations));
        }

        self.records = accepted;
        tracing::info!(count = self.records.len(), "student collection replaced");
        self.persist()?;
        Ok(self.records.len())
    }

    // On failure the in-memory change stays and the store is marked dirty.
    fn persist(&mut self) -> Result<(), StoreError> {
        match marks_file::save_marks_file(&self.path, &self.records) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }
}

pub fn summarize(records: &[StudentRecord]) -> CollectionSummary {
    let count = records.len();
    let average_percentage = if count > 0 {
        records.iter().map(|r| r.percentage()).sum::<f64>() / (count as f64)
    } else {
        0.0
    };
    CollectionSummary {
        count,
        average_percentage,
    }
}
