use std::{io::Write, path::Path};

use anyhow::Result;
use itertools::Itertools;
use scraper::Row;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rows ordered by their sequence number; numbers sort numerically, anything
/// else after them in arrival order.
pub fn sorted(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .sorted_by_cached_key(|row| row.sequence.trim().parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

/// Writes a header line and `rows` as UTF-8 CSV. The leading byte-order mark
/// keeps spreadsheet programs from mangling the Chinese text.
pub fn write_csv<W: Write>(mut writer: W, rows: &[Row]) -> Result<()> {
    writer.write_all(BOM)?;

    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;

    Ok(())
}

pub fn save(path: &Path, rows: Vec<Row>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), &sorted(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sequence: &str, name: &str) -> Row {
        Row {
            sequence: sequence.to_owned(),
            course_code: "00132380".to_owned(),
            course_name: name.to_owned(),
            course_type: "专业课".to_owned(),
            offering_unit: "数学科学学院".to_owned(),
            class_number: "1".to_owned(),
            credits: "5.0".to_owned(),
            plan_id: "22-23-1-00132380-1".to_owned(),
            weeks: "1-16".to_owned(),
            schedule: "周一(第3节-第4节),周三(第1节-第2节)".to_owned(),
            teacher: "张三".to_owned(),
            remarks: String::new(),
        }
    }

    #[test]
    fn sorts_by_numeric_sequence() {
        let rows = vec![row("10", "c"), row("2", "b"), row("x", "z"), row("1", "a")];

        let names: Vec<_> = sorted(rows).into_iter().map(|r| r.course_name).collect();

        assert_eq!(names, ["a", "b", "c", "z"]);
    }

    #[test]
    fn writes_bom_header_and_rows() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[row("1", "高等数学（B）")]).unwrap();

        assert!(buffer.starts_with(BOM));

        let text = String::from_utf8(buffer[BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("序号,课程号,课程名称,课程类型,开课单位,班号,学分,执行计划编号,起止周,上课时间,教师,备注")
        );
        assert_eq!(
            lines.next(),
            Some("1,00132380,高等数学（B）,专业课,数学科学学院,1,5.0,22-23-1-00132380-1,1-16,\"周一(第3节-第4节),周三(第1节-第2节)\",张三,")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn saves_sorted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        save(&path, vec![row("2", "b"), row("1", "a")]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        let first: Vec<_> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(first, ["1", "2"]);
    }
}
