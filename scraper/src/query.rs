use std::{collections::BTreeMap, fmt, str::FromStr};

use enum_iterator::{all, Sequence};
use thiserror::Error;

use crate::transport::FetchError;

/// Search filters for one catalog fetch. Built once and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    course_name: String,
    teacher_name: String,
    term: String,
    course_type: String,
    department: String,
}

impl Query {
    /// Query for every course in `term`; the other filters match everything.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            course_name: String::new(),
            teacher_name: String::new(),
            term: term.into(),
            course_type: "0".to_owned(),
            department: "0".to_owned(),
        }
    }

    pub fn with_course_name(self, course_name: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
            ..self
        }
    }

    pub fn with_teacher_name(self, teacher_name: impl Into<String>) -> Self {
        Self {
            teacher_name: teacher_name.into(),
            ..self
        }
    }

    pub fn with_course_type(self, course_type: impl Into<String>) -> Self {
        Self {
            course_type: course_type.into(),
            ..self
        }
    }

    pub fn with_department(self, department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            ..self
        }
    }

    pub fn course_name(&self) -> &str {
        &self.course_name
    }

    pub fn teacher_name(&self) -> &str {
        &self.teacher_name
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn course_type(&self) -> &str {
        &self.course_type
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    /// Form fields understood by the search endpoint, minus `startrow`.
    pub(crate) fn form(&self) -> [(&'static str, &str); 5] {
        [
            ("coursename", &self.course_name),
            ("teachername", &self.teacher_name),
            ("yearandseme", &self.term),
            ("coursetype", &self.course_type),
            ("yuanxi", &self.department),
        ]
    }

    /// Checks department, course type and term, in that order.
    pub fn validate(&self, reference: &ReferenceData) -> Result<(), ValidationError> {
        if !reference.departments.contains_key(&self.department) {
            return Err(ValidationError::UnknownDepartment {
                code: self.department.clone(),
                valid: reference.departments.clone(),
            });
        }

        if !reference.course_types.contains_key(&self.course_type) {
            return Err(ValidationError::UnknownCourseType {
                code: self.course_type.clone(),
                valid: reference.course_types.clone(),
            });
        }

        self.term.parse::<Term>().map(|_| ())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CN{}_TN{}_YS{}_CT{}_YX{}",
            self.course_name, self.teacher_name, self.term, self.course_type, self.department
        )
    }
}

/// Valid codes published by the backend, each mapped to its label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub departments: BTreeMap<String, String>,
    pub course_types: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Sequence)]
pub enum Semester {
    Autumn = 1,
    Spring = 2,
    Summer = 3,
}

impl Semester {
    fn from_number(n: u32) -> Option<Self> {
        all::<Self>().find(|s| *s as u32 == n)
    }

    /// Nearest semester to `n`.
    fn clamp(n: u32) -> Self {
        all::<Self>()
            .min_by_key(|s| (*s as u32).abs_diff(n))
            .unwrap_or(Self::Autumn)
    }
}

/// Academic term in `YY-YY-S` form, e.g. `22-23-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Term {
    pub start: u32,
    pub end: u32,
    pub semester: Semester,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{}", self.start, self.end, self.semester as u32)
    }
}

impl FromStr for Term {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |suggestion| ValidationError::InvalidTerm {
            term: s.to_owned(),
            suggestion,
        };

        let parts = s
            .split('-')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid(None))?;

        let &[start, end, semester] = parts.as_slice() else {
            return Err(invalid(None));
        };

        match Semester::from_number(semester) {
            Some(semester) if start.checked_add(1) == Some(end) => Ok(Term {
                start,
                end,
                semester,
            }),
            _ => {
                let start = start.min(end);
                let suggestion = Term {
                    start,
                    end: start.saturating_add(1),
                    semester: Semester::clamp(semester),
                };
                Err(invalid(Some(suggestion)))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("could not fetch reference data: {source}")]
    ReferenceUnavailable { source: FetchError },
    #[error("invalid department code {code:?}")]
    UnknownDepartment {
        code: String,
        valid: BTreeMap<String, String>,
    },
    #[error("invalid course type code {code:?}")]
    UnknownCourseType {
        code: String,
        valid: BTreeMap<String, String>,
    },
    #[error("invalid term {term:?}{}", did_you_mean(.suggestion))]
    InvalidTerm {
        term: String,
        suggestion: Option<Term>,
    },
}

fn did_you_mean(suggestion: &Option<Term>) -> String {
    suggestion
        .map(|term| format!(", did you mean {term}?"))
        .unwrap_or_default()
}
