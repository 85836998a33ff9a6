//! ZIP archive helper utilities for Excel (.xlsx) workbooks.
//! Provides convenient methods for accessing parts within the container.

use crate::error::PivotSheetError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Helper trait for ZIP archive operations
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Returns true if the archive holds a part with this name
    fn contains(&self, name: &str) -> bool;

    /// Gets a part by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, PivotSheetError>;

    /// Creates an XML reader for a part within the archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, PivotSheetError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn contains(&self, name: &str) -> bool {
        let pattern = name.replace('\\', "/");
        self.file_names()
            .any(|file_name| pattern.eq_ignore_ascii_case(file_name))
    }

    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, PivotSheetError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, PivotSheetError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive() -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("xl/workbook.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        let cursor = writer.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn file_lookup_ignores_case_and_separator() {
        let mut zip = archive();
        assert!(zip.contains("XL\\Workbook.xml"));
        let mut content = String::new();
        zip.file("XL\\WORKBOOK.XML").unwrap().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<workbook/>");
    }

    #[test]
    fn missing_part_is_none() {
        let mut zip = archive();
        assert!(!zip.contains("xl/styles.xml"));
        assert!(zip.xml_reader("xl/styles.xml").unwrap().is_none());
    }
}
