use std::collections::BTreeMap;

use select::{
    document::Document,
    predicate::{Attr, Class, Name, Predicate},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::query::ReferenceData;

/// Number of cells in every course row.
pub const COLUMNS: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Row {
    #[serde(rename = "序号")]
    pub sequence: String,
    #[serde(rename = "课程号")]
    pub course_code: String,
    #[serde(rename = "课程名称")]
    pub course_name: String,
    #[serde(rename = "课程类型")]
    pub course_type: String,
    #[serde(rename = "开课单位")]
    pub offering_unit: String,
    #[serde(rename = "班号")]
    pub class_number: String,
    #[serde(rename = "学分")]
    pub credits: String,
    #[serde(rename = "执行计划编号")]
    pub plan_id: String,
    #[serde(rename = "起止周")]
    pub weeks: String,
    #[serde(rename = "上课时间")]
    pub schedule: String,
    #[serde(rename = "教师")]
    pub teacher: String,
    #[serde(rename = "备注")]
    pub remarks: String,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("count is not a number: {0}")]
    InvalidCount(String),
    #[error("course row must be an object or an array")]
    InvalidRow,
    #[error("course row has {found} cells, expected {COLUMNS}")]
    RowWidth { found: usize },
    #[error("no reference data found in page")]
    NoReferenceData,
}

#[derive(Deserialize)]
struct CountBody {
    count: Option<Value>,
}

#[derive(Deserialize)]
struct PageBody {
    courselist: Option<Vec<Value>>,
}

impl Row {
    fn from_cells(cells: Vec<String>) -> Result<Self, ParseError> {
        let [sequence, course_code, course_name, course_type, offering_unit, class_number, credits, plan_id, weeks, schedule, teacher, remarks]: [String; COLUMNS] =
            cells
                .try_into()
                .map_err(|cells: Vec<String>| ParseError::RowWidth { found: cells.len() })?;

        Ok(Row {
            sequence,
            course_code,
            course_name,
            course_type,
            offering_unit,
            class_number,
            credits,
            plan_id,
            weeks,
            schedule,
            teacher,
            remarks,
        })
    }

    fn from_json(value: &Value) -> Result<Self, ParseError> {
        // objects are read positionally, in document order
        let cells = match value {
            Value::Object(map) => map.values().map(cell_text).collect(),
            Value::Array(items) => items.iter().map(cell_text).collect(),
            _ => return Err(ParseError::InvalidRow),
        };

        Self::from_cells(cells)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => strip_tags(s),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Removes any markup from a cell, keeping only its text content.
pub fn strip_tags(text: &str) -> String {
    if !text.contains('<') {
        return text.to_owned();
    }

    let document = Document::from(text);
    document
        .find(Name("body"))
        .next()
        .map(|body| body.text())
        .unwrap_or_default()
}

pub fn count_from_json(source: &str) -> Result<usize, ParseError> {
    let body: CountBody = serde_json::from_str(source)?;

    match body.count.ok_or(ParseError::MissingField("count"))? {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| ParseError::InvalidCount(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidCount(s.clone())),
        other => Err(ParseError::InvalidCount(other.to_string())),
    }
}

pub fn rows_from_json(source: &str) -> Result<Vec<Row>, ParseError> {
    let body: PageBody = serde_json::from_str(source)?;

    body.courselist
        .ok_or(ParseError::MissingField("courselist"))?
        .iter()
        .map(Row::from_json)
        .collect()
}

fn options(document: &Document, class: &str) -> BTreeMap<String, String> {
    document
        .find(Name("span").and(Class(class)).and(Attr("data", ())))
        .filter_map(|node| {
            let code = node.attr("data")?;
            Some((code.to_owned(), node.text().trim().to_owned()))
        })
        .collect()
}

pub fn reference_from_html(source: &str) -> Result<ReferenceData, ParseError> {
    let document = Document::from(source);

    let departments = options(&document, "yuanxi");
    let course_types = options(&document, "coursetype");

    if departments.is_empty() && course_types.is_empty() {
        return Err(ParseError::NoReferenceData);
    }

    Ok(ReferenceData {
        departments,
        course_types,
    })
}
