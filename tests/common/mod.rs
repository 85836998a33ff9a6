//! Builds small `.xlsx` workbooks for the integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

/// One cell of a generated sheet.
#[derive(Clone, Debug)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Blank,
}

pub use Cell::Blank;

pub fn t(text: &'static str) -> Cell {
    Cell::Text(text)
}

pub fn n(number: f64) -> Cell {
    Cell::Number(number)
}

fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn sheet_data(rows: &[Vec<Cell>]) -> String {
    let mut data = String::new();
    for (row_index, row) in rows.iter().enumerate() {
        let row_number = row_index + 1;
        data.push_str(&format!(r#"<row r="{row_number}">"#));
        for (column_index, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(column_index), row_number);
            match cell {
                Cell::Text(text) => data.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(text)
                )),
                Cell::Number(number) => data.push_str(&format!(r#"<c r="{reference}"><v>{number}</v></c>"#)),
                Cell::Blank => (),
            }
        }
        data.push_str("</row>");
    }
    data
}

/// A zipped workbook holding the given sheets in order.
pub fn workbook_bytes(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut entries = String::new();
    let mut relationships = String::new();
    for (index, (name, rows)) in sheets.iter().enumerate() {
        let id = index + 1;
        entries.push_str(&format!(r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        ));
        writer.start_file(format!("xl/worksheets/sheet{id}.xml"), options).unwrap();
        write!(writer, r#"<worksheet {NS}><sheetData>{}</sheetData></worksheet>"#, sheet_data(rows)).unwrap();
    }
    writer.start_file("xl/workbook.xml", options).unwrap();
    write!(writer, r#"<workbook {NS}><workbookPr/><sheets>{entries}</sheets></workbook>"#).unwrap();
    writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    write!(writer, r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#).unwrap();
    writer.start_file("xl/styles.xml", options).unwrap();
    write!(writer, r#"<styleSheet {NS}><cellXfs count="1"><xf numFmtId="0"/></cellXfs></styleSheet>"#).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Cell>>)]) {
    std::fs::write(path, workbook_bytes(sheets)).unwrap();
}

pub fn plan_rows() -> Vec<Vec<Cell>> {
    vec![
        vec![t("YTD Plan vs Actual")],
        vec![t("Location"), t("Yards Produced"), t("Yards Planned"), t("Income Produced"), t("Income Planned")],
        vec![t("Plant A"), n(90.0), n(100.0), n(900.0), n(1000.0)],
        vec![t("Plant B"), n(120.0), n(100.0), t("1,500"), n(1000.0)],
        vec![t("Design Services"), n(1.0), n(1.0), n(1.0), n(1.0)],
        vec![t("Grand Total"), n(211.0), n(201.0), n(2401.0), n(2001.0)],
    ]
}

pub fn ly_rows() -> Vec<Vec<Cell>> {
    vec![
        vec![t("Location"), t("Written"), t("Written LY"), t("Produced"), t("Produced LY"), t("Invoiced"), t("Invoiced LY")],
        vec![t("Plant A"), n(30.0), n(20.0), n(50.0), n(40.0), n(10.0), n(0.0)],
        vec![t("Plant C"), n(5.0), n(5.0), n(5.0), n(5.0), n(5.0), n(5.0)],
    ]
}

pub fn color_rows() -> Vec<Vec<Cell>> {
    vec![
        vec![t("Color Yards by Week")],
        vec![Blank],
        vec![t("Week"), t("Color"), t("Yards Produced"), t("Color X Ratio")],
        vec![n(1.0), t("Navy"), n(100.0), n(0.5)],
        vec![n(1.0), t("Red"), t("1,200"), n(0.2)],
        vec![n(1.0), t("Total"), n(1300.0), n(0.7)],
    ]
}

fn simple_rows(measure: &'static str) -> Vec<Vec<Cell>> {
    vec![
        vec![t("Week"), t("Location"), t(measure), t("Orders")],
        vec![n(1.0), t("Plant A"), n(10.0), n(2.0)],
        vec![n(2.0), t("Plant A"), n(12.0), n(3.0)],
    ]
}

/// A workbook satisfying the seven-tab contract.
pub fn contract_workbook() -> Vec<(&'static str, Vec<Vec<Cell>>)> {
    vec![
        ("Written and Produced by Week", simple_rows("Written Yds")),
        ("Written Produced Invoiced", simple_rows("Invoiced Yds")),
        ("YTD Plan vs Act", plan_rows()),
        ("YTD vs LY", ly_rows()),
        ("Color Yards", color_rows()),
        ("WIP", simple_rows("WIP Yards")),
        ("Yards Wasted", simple_rows("Yds Wasted")),
    ]
}
