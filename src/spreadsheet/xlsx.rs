use crate::error::PivotSheetError;
use crate::error::ResultMessage;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::push_entity;
use crate::helpers::xml::XmlElementExt;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::SheetSelection;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::WORKBOOK_PART;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::sheet::SheetBuilder;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing the OOXML parts
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";
const WORKBOOK_RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";

/// An opened `.xlsx` workbook.
///
/// Sheet order and part paths are read when the workbook is opened; shared
/// strings are loaded on the first sheet read and kept for later reads.
pub struct XlsxWorkbook {
    /// File name of the workbook
    name: String,
    /// ZIP archive containing the workbook parts
    zip: ZipArchive<UnifiedReader>,
    /// Parsed number formats for cell type detection, indexed by style
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
    shared_strings: Option<Vec<String>>,
}

impl XlsxWorkbook {
    /// Opens a workbook file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<XlsxWorkbook, PivotSheetError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let reader = UnifiedReader::open(path).with_prefix(&format!("Open workbook '{name}' failed"))?;
        Self::from_reader(name, reader)
    }

    /// Opens a workbook already held in memory.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxWorkbook, PivotSheetError> {
        Self::from_reader(name.to_owned(), UnifiedReader::from_bytes(bytes))
    }

    fn from_reader(name: String, reader: UnifiedReader) -> Result<XlsxWorkbook, PivotSheetError> {
        let (zip, number_formats, sheets) = excel::open(&name, reader, load_workbook, load_number_formats)?;
        debug!(workbook = %name, sheets = sheets.len(), "opened workbook");
        Ok(XlsxWorkbook {
            name,
            zip,
            number_formats,
            sheets,
            shared_strings: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads one sheet by exact name, optionally stopping after `max_rows` rows.
    pub fn read_sheet(&mut self, sheet_name: &str, max_rows: Option<usize>) -> Result<RawSheet, PivotSheetError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()))?;
        self.read_part(sheet_name, &zip_path, max_rows)
    }

    /// Reads every sheet accepted by the selection, in workbook order.
    pub fn read_sheets(&mut self, selection: &SheetSelection) -> Result<Vec<RawSheet>, PivotSheetError> {
        let targets: Vec<(String, String)> = self
            .sheets
            .iter()
            .filter(|(name, _)| selection.accept(name))
            .take(selection.sheet_limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let mut sheets = Vec::with_capacity(targets.len());
        for (sheet_name, zip_path) in targets {
            sheets.push(self.read_part(&sheet_name, &zip_path, selection.rows_limit)?);
        }
        Ok(sheets)
    }

    fn read_part(&mut self, sheet_name: &str, zip_path: &str, max_rows: Option<usize>) -> Result<RawSheet, PivotSheetError> {
        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }

        let mut reader = self
            .zip
            .xml_reader(zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        let builder = read_cells(&mut reader, sheet_name, &self.number_formats, max_rows)
            .with_prefix(&format!("Read sheet '{sheet_name}' failed"))?;
        drop(reader);

        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();
        let sheet = builder.finish(shared_strings);
        debug!(sheet = sheet_name, rows = sheet.row_count(), cols = sheet.col_count(), "read sheet");
        Ok(sheet)
    }
}

/// Walks the cells of one worksheet part.
fn read_cells(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    sheet_name: &str,
    number_formats: &[CellType],
    max_rows: Option<usize>,
) -> Result<SheetBuilder, PivotSheetError> {
    let mut sheet = SheetBuilder::new(sheet_name, max_rows);
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::default();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == TAG_ROW => {
            row_count += 1;
            col_count = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = event.attr("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row_count, col_count));
            col_count = col + 1;
            value.clear();
            if sheet.after_row_limit(row) {
                break;
            }
            kind = event.attr("t")?.map(|t| {
                match t.as_ref() {
                    "inlineStr" | "str" => CellType::InlineString,
                    "s" => CellType::SharedString,
                    "d" => CellType::IsoDateTime,
                    "b" => CellType::Boolean,
                    "e" => CellType::Error,
                    _ => CellType::Number,
                }
            }).unwrap_or(CellType::Number);
            if kind == CellType::Number {
                if let Some(style) = event.parse_attr::<usize>("s")? {
                    kind = number_formats.get(style).copied().unwrap_or(CellType::Number);
                }
            }
        }
        Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
            value = read_string_value(reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
            value = read_string_value(reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            if kind != CellType::Empty && kind != CellType::Error && !value.is_empty() {
                sheet.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                });
            }
            kind = CellType::Empty;
        }
    });
    Ok(sheet)
}

/// Loads the shared string table; a workbook without one has no shared strings.
fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, PivotSheetError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader(SHARED_STRINGS_PART)? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Loads worksheet names and part paths, and the date system (1900 vs 1904).
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), PivotSheetError> {
    let relationships = load_relationships(zip, WORKBOOK_RELATIONSHIPS_PART)?;
    let mut reader = zip.xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let name = event.attr("name")?;
            let id = event.attr_by_local_name("id")?;
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.attr("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads the cell style table and maps each style to a cell type.
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, PivotSheetError> {
    let mut reader = match zip.xml_reader(STYLES_PART)? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.attr("numFmtId")?;
            let format = event.attr("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.attr("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Reads the text of a string element, skipping phonetic annotations.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, PivotSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_entity(&mut text, &event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn workbook(sheets: &[(&str, &str)], shared_strings: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut entries = String::new();
        let mut relationships = String::new();
        for (index, (name, rows)) in sheets.iter().enumerate() {
            let id = index + 1;
            entries.push_str(&format!(r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
            ));
            writer.start_file(format!("xl/worksheets/sheet{id}.xml"), options).unwrap();
            write!(writer, r#"<worksheet {NS}><sheetData>{rows}</sheetData></worksheet>"#).unwrap();
        }
        writer.start_file("xl/workbook.xml", options).unwrap();
        write!(writer, r#"<workbook {NS}><workbookPr/><sheets>{entries}</sheets></workbook>"#).unwrap();
        writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        write!(writer, r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#).unwrap();
        writer.start_file("xl/styles.xml", options).unwrap();
        write!(writer, r#"<styleSheet {NS}><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#).unwrap();
        writer.start_file("xl/sharedStrings.xml", options).unwrap();
        let items: String = shared_strings.iter().map(|text| format!("<si><t>{text}</t></si>")).collect();
        write!(writer, r#"<sst {NS}>{items}</sst>"#).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_sheet_grid() {
        let rows = concat!(
            r#"<row r="2"><c r="B2" t="s"><v>0</v></c><c r="C2" t="s"><v>1</v></c></row>"#,
            r#"<row r="3"><c r="B3" t="inlineStr"><is><t>Dyeing &amp; Finishing</t></is></c><c r="C3"><v>1250.5</v></c><c r="D3" s="1"><v>45000</v></c></row>"#,
            r#"<row r="4"><c r="B4" t="e"><v>#N/A</v></c><c r="C4" t="b"><v>1</v></c></row>"#,
        );
        let bytes = workbook(&[("WIP", rows)], &["Location", "Yards"]);
        let mut workbook = XlsxWorkbook::from_bytes("wip.xlsx", bytes).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["WIP"]);

        let sheet = workbook.read_sheet("WIP", None).unwrap();
        assert_eq!(sheet.name, "WIP");
        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.col_count(), 3);
        assert!(sheet.rows[0].iter().all(Value::is_empty));
        assert_eq!(sheet.rows[1][0], Value::from("Location"));
        assert_eq!(sheet.rows[2][0], Value::from("Dyeing & Finishing"));
        assert_eq!(sheet.rows[2][1], Value::from(1250.5));
        assert_eq!(sheet.rows[2][2].to_string(), "2023-03-15");
        assert_eq!(sheet.rows[3][0], Value::Empty);
        assert_eq!(sheet.rows[3][1], Value::Bool(true));
    }

    #[test]
    fn selection_and_row_limit() {
        let rows = r#"<row r="1"><c r="A1"><v>1</v></c></row><row r="2"><c r="A2"><v>2</v></c></row>"#;
        let bytes = workbook(&[("YTD vs LY", rows), ("WIP", rows), ("YTD Plan vs Act", rows)], &[]);
        let mut workbook = XlsxWorkbook::from_bytes("ytd.xlsx", bytes).unwrap();

        let selection = SheetSelection::matching(&["YTD*"]).unwrap().with_rows_limit(1);
        let sheets = workbook.read_sheets(&selection).unwrap();
        let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
        assert_eq!(names, vec!["YTD vs LY", "YTD Plan vs Act"]);
        assert!(sheets.iter().all(|sheet| sheet.row_count() == 1));
    }

    #[test]
    fn missing_sheet() {
        let bytes = workbook(&[("WIP", "")], &[]);
        let mut workbook = XlsxWorkbook::from_bytes("wip.xlsx", bytes).unwrap();
        let error = workbook.read_sheet("Sheet1", None).err().unwrap();
        assert!(matches!(error, PivotSheetError::SpreadsheetError(SpreadsheetError::SheetNotFoundError(_, _))));
        assert!(workbook.read_sheet("WIP", None).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_workbook_bytes() {
        assert!(XlsxWorkbook::from_bytes("page.html", b"<html></html>".to_vec()).is_err());
    }
}
