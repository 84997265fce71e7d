use serde::{Deserialize, Serialize};

pub const COURSEWORK_MARK_MAX: i64 = 20;
pub const EXAM_MARK_MAX: i64 = 100;
/// Three coursework components (60) plus the exam (100).
pub const OVERALL_MAX: i64 = 3 * COURSEWORK_MARK_MAX + EXAM_MARK_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Fixed thresholds: >=70 A, >=60 B, >=50 C, >=40 D, else F.
    pub fn from_percentage(pct: f64) -> Grade {
        if pct >= 70.0 {
            Grade::A
        } else if pct >= 60.0 {
            Grade::B
        } else if pct >= 50.0 {
            Grade::C
        } else if pct >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// The six raw fields of a record, exactly what the marks file stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInput {
    pub code: String,
    pub name: String,
    pub c1: i64,
    pub c2: i64,
    pub c3: i64,
    pub exam: i64,
}

/// Partial replacement of raw fields; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StudentPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub c1: Option<i64>,
    pub c2: Option<i64>,
    pub c3: Option<i64>,
    pub exam: Option<i64>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.c1.is_none()
            && self.c2.is_none()
            && self.c3.is_none()
            && self.exam.is_none()
    }

    pub fn apply_to(&self, base: &StudentInput) -> StudentInput {
        StudentInput {
            code: self.code.clone().unwrap_or_else(|| base.code.clone()),
            name: self.name.clone().unwrap_or_else(|| base.name.clone()),
            c1: self.c1.unwrap_or(base.c1),
            c2: self.c2.unwrap_or(base.c2),
            c3: self.c3.unwrap_or(base.c3),
            exam: self.exam.unwrap_or(base.exam),
        }
    }
}

/// A student row with its derived totals.
///
/// Fields are private: a record can only be built from raw inputs, so the
/// derived values always match the marks they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    code: String,
    name: String,
    c1: i64,
    c2: i64,
    c3: i64,
    exam: i64,
    coursework: i64,
    overall: i64,
    percentage: f64,
    grade: Grade,
}

impl StudentRecord {
    pub fn from_input(input: StudentInput) -> Self {
        let coursework = input.c1.saturating_add(input.c2).saturating_add(input.c3);
        let overall = coursework.saturating_add(input.exam);
        let percentage = percentage_of_overall(overall);
        StudentRecord {
            code: input.code,
            name: input.name,
            c1: input.c1,
            c2: input.c2,
            c3: input.c3,
            exam: input.exam,
            coursework,
            overall,
            percentage,
            grade: Grade::from_percentage(percentage),
        }
    }

    pub fn to_input(&self) -> StudentInput {
        StudentInput {
            code: self.code.clone(),
            name: self.name.clone(),
            c1: self.c1,
            c2: self.c2,
            c3: self.c3,
            exam: self.exam,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coursework_marks(&self) -> [i64; 3] {
        [self.c1, self.c2, self.c3]
    }

    pub fn exam(&self) -> i64 {
        self.exam
    }

    pub fn coursework(&self) -> i64 {
        self.coursework
    }

    pub fn overall(&self) -> i64 {
        self.overall
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Two decimals, the way every table and detail view shows it.
    pub fn percentage_display(&self) -> String {
        format!("{:.2}", self.percentage)
    }

    pub fn code_matches(&self, code: &str) -> bool {
        self.code.to_lowercase() == code.trim().to_lowercase()
    }

    /// Case-insensitive substring match on code or name.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.code.to_lowercase().contains(needle_lower)
            || self.name.to_lowercase().contains(needle_lower)
    }
}

pub fn percentage_of_overall(overall: i64) -> f64 {
    // Multiply first so integer totals with exact percentages stay exact.
    (overall as f64) * 100.0 / (OVERALL_MAX as f64)
}
