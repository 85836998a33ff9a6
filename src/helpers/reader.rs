use crate::error::PivotSheetError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// A unified reader over a workbook on disk or a workbook already held in memory
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer (validated download or test fixture)
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local workbook file
    pub(crate) fn open(path: &Path) -> Result<UnifiedReader, PivotSheetError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps bytes that are already in memory
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_local_file() {
        // Cargo.toml always exists at the crate root during tests
        let result = UnifiedReader::open(Path::new("Cargo.toml"));
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = UnifiedReader::open(Path::new("non_existent_file.xlsx"));
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_memory_reader_seeks() {
        let mut reader = UnifiedReader::from_bytes(b"PK\x03\x04rest".to_vec());
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"PK");
        reader.seek(std::io::SeekFrom::Start(4)).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "rest");
    }
}
