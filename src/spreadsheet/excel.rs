//! Microsoft Office Excel container helpers
use crate::error::PivotSheetError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlElementExt;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Signature of a Compound File Binary container (legacy .xls or an encrypted package)
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Part every workbook container must carry
pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Opens an Excel container and loads its workbook structure
///
/// # Returns
/// Tuple containing:
/// - Zip archive handle
/// - Number format mappings
/// - List of sheet names and their part paths
pub(super) fn open<W, F>(name: &str, mut reader: UnifiedReader, load_workbook: W, load_number_formats: F) -> Result<(
    ZipArchive<UnifiedReader>,
    Vec<CellType>,
    Vec<(String, String)>
), PivotSheetError>
where
    W: Fn(&mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), PivotSheetError>,
    F: Fn(&mut ZipArchive<UnifiedReader>, bool) -> Result<Vec<CellType>, PivotSheetError>,
{
    if is_compound_file(&mut reader)? {
        Err(SpreadsheetError::CompoundFileError(name.to_owned()))?;
    }

    let mut zip = ZipArchive::new(reader)?;
    if !zip.contains(WORKBOOK_PART) {
        Err(SpreadsheetError::FileError(WORKBOOK_PART.to_owned()))?;
    }
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok((zip, number_formats, sheets))
}

/// Loads worksheet relationships
///
/// # Returns
/// Mapping of relationship IDs to worksheet part paths
pub(super) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, PivotSheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.attr("Id")?;
            let kind = event.attr("Type")?;
            let target = event.attr("Target")?;
            // Only worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps style indexes to cell types using custom and built-in formats
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the container
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks for a CFB container (an encrypted OOXML package or a legacy .xls file)
fn is_compound_file<R: Read + Seek>(reader: &mut R) -> Result<bool, PivotSheetError> {
    let mut signature = [0u8; 8];
    let matched = match reader.read_exact(&mut signature) {
        Ok(()) => signature == CFB_SIGNATURE,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(error) => Err(error)?,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path(Cow::from("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("/xl/worksheets/sheet2.xml")), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path(Cow::from("xl/worksheets/sheet3.xml")), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn compound_file_signature() {
        let mut bytes = CFB_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(is_compound_file(&mut Cursor::new(bytes)).unwrap());
        assert!(!is_compound_file(&mut Cursor::new(b"PK\x03\x04".to_vec())).unwrap());
    }

    #[test]
    fn number_formats_fall_back_to_number() {
        let custom = HashMap::from([("164".to_owned(), CellType::NumberDate1900)]);
        let formats = load_number_formats(vec!["0".into(), "14".into(), "164".into()], custom, false);
        assert_eq!(formats, vec![CellType::Number, CellType::NumberDate1900, CellType::NumberDate1900]);
    }
}
