//! Spreadsheet export of the article register.
//!
//! One header row followed by one row per record, in register order
//! (most recently accepted first). Column order is fixed by [`COLUMNS`].

use crate::register::ArticleRegister;
use crate::utils::sanitize_file_stem;
use chrono::{DateTime, TimeZone};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;
use tracing::{info, instrument};

pub const SHEET_NAME: &str = "Sheet1";

pub const COLUMNS: [&str; 8] = [
    "Title",
    "Source",
    "Date",
    "Description",
    "Link",
    "Picture filename",
    "Occurrences search phrase",
    "Contains any amount of money",
];

/// `{phrase}_{DD-MM-YYYY HH_MM}.xlsx`
pub fn file_name<Tz: TimeZone>(phrase: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}.xlsx",
        sanitize_file_stem(phrase),
        now.format("%d-%m-%Y %H_%M")
    )
}

#[instrument(level = "info", skip_all, fields(rows = register.size(), path = %path.display()))]
pub fn write_register(register: &ArticleRegister, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (i, record) in register.all().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &record.title)?;
        sheet.write_string(row, 1, &record.source)?;
        sheet.write_string(row, 2, &record.date)?;
        sheet.write_string(row, 3, &record.description)?;
        sheet.write_string(row, 4, &record.link)?;
        sheet.write_string(row, 5, &record.picture_filename)?;
        sheet.write_number(row, 6, record.occurrence_count as f64)?;
        sheet.write_boolean(row, 7, record.contains_money)?;
    }

    workbook.save(path)?;
    info!("Wrote spreadsheet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlState;
    use crate::register::tests::sighting;
    use crate::register::DerivedFields;
    use calamine::{open_workbook, Reader, Xlsx};
    use chrono::Utc;

    #[test]
    fn test_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 5, 22, 7, 5, 59).unwrap();
        assert_eq!(file_name("economy", &now), "economy_22-05-2024 07_05.xlsx");
        assert_eq!(file_name("a/b", &now), "a_b_22-05-2024 07_05.xlsx");
    }

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cat.xlsx");

        let mut register = ArticleRegister::new();
        let mut state = CrawlState::default();
        for (title, description) in [
            ("Cat cat CAT", "no match"),
            ("Shelter fundraiser", "Raised $1,250.00 for the cat shelter"),
        ] {
            let s = sighting(title, "2 hours ago", description);
            let fields = DerivedFields::compute(&s, "cat", &state);
            register.accept(&s, fields).unwrap();
            state.record_acceptance();
        }
        write_register(&register, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let sheets = workbook.worksheets();
        let (name, range) = &sheets[0];
        assert_eq!(name, SHEET_NAME);

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());

        let expected: Vec<Vec<String>> = register
            .all()
            .map(|r| {
                vec![
                    r.title.clone(),
                    r.source.clone(),
                    r.date.clone(),
                    r.description.clone(),
                    r.link.clone(),
                    r.picture_filename.clone(),
                    r.occurrence_count.to_string(),
                    r.contains_money.to_string(),
                ]
            })
            .collect();
        assert_eq!(rows[1..], expected[..]);
        assert_eq!(rows[1][0], "Shelter fundraiser");
        assert_eq!(rows[1][5], "screenshot-2.png");
        assert_eq!(rows[2][6], "3");
        assert_eq!(rows[2][7], "false");
    }
}
