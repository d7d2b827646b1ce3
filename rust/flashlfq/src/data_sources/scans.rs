use crate::errors::{
    DataReadingError,
    Result,
};
use crate::models::{
    Scan,
    SpectraFile,
};
use std::collections::HashMap;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use tracing::debug;

/// Anything that can hand over the centroided scans of a spectra file.
///
/// Called from worker threads, once per file.
pub trait ScanSource: Send + Sync {
    fn load_scans(&self, file: &SpectraFile) -> Result<Vec<Scan>>;
}

/// Scans held in memory, keyed by spectra file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScanSource {
    scans: HashMap<SpectraFile, Arc<[Scan]>>,
}

impl InMemoryScanSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: SpectraFile, scans: Vec<Scan>) {
        self.scans.insert(file, scans.into());
    }

    pub fn with_file(mut self, file: SpectraFile, scans: Vec<Scan>) -> Self {
        self.insert(file, scans);
        self
    }
}

impl ScanSource for InMemoryScanSource {
    fn load_scans(&self, file: &SpectraFile) -> Result<Vec<Scan>> {
        match self.scans.get(file) {
            Some(scans) => Ok(scans.to_vec()),
            None => Err(DataReadingError::MissingScanSource {
                file: file.full_path.to_string_lossy().to_string(),
            }
            .into()),
        }
    }
}

/// Reads one JSON scan per line from the path of each spectra file.
///
/// ```json
/// {"ms_level": 1, "retention_time": 10.2, "mz": [500.1, 500.6], "intensity": [1e5, 4e4]}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonScanSource;

impl NdjsonScanSource {
    pub fn read_path(path: &Path) -> std::result::Result<Vec<Scan>, DataReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| DataReadingError::FileReadingError {
                source: e,
                context: "Error opening scan file",
                path: PathBuf::from(path),
            })?;
        let scans = NdJsonScanReader::new(BufReader::new(file), path)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Read {} scans from {}", scans.len(), path.display());
        Ok(scans)
    }
}

impl ScanSource for NdjsonScanSource {
    fn load_scans(&self, file: &SpectraFile) -> Result<Vec<Scan>> {
        Ok(Self::read_path(&file.full_path)?)
    }
}

struct NdJsonScanReader<'a, R: BufRead> {
    reader: R,
    path: &'a Path,
    line_number: usize,
}

impl<'a, R: BufRead> NdJsonScanReader<'a, R> {
    fn new(reader: R, path: &'a Path) -> Self {
        Self {
            reader,
            path,
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for NdJsonScanReader<'_, R> {
    type Item = std::result::Result<Scan, DataReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = String::new();
            self.line_number += 1;
            match self.reader.read_line(&mut line) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(&line).map_err(|e| {
                        DataReadingError::ScanParsingError {
                            source: e,
                            line: self.line_number,
                            path: PathBuf::from(self.path),
                        }
                    }));
                }
                Err(e) => {
                    return Some(Err(DataReadingError::FileReadingError {
                        source: e,
                        context: "Error reading line",
                        path: PathBuf::from(self.path),
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndjson_reader_skips_blank_lines() {
        let text = concat!(
            r#"{"ms_level": 1, "retention_time": 1.0, "mz": [500.0], "intensity": [10.0]}"#,
            "\n\n",
            r#"{"retention_time": 1.1, "mz": [], "intensity": []}"#,
            "\n",
        );
        let path = Path::new("mem.ndjson");
        let scans: Vec<Scan> = NdJsonScanReader::new(text.as_bytes(), path)
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[1].ms_level, 1);
        assert_eq!(scans[0].mz, vec![500.0]);
    }

    #[test]
    fn test_ndjson_reader_reports_line() {
        let text = "{\"retention_time\": 1.0, \"mz\": [], \"intensity\": []}\nnot json\n";
        let path = Path::new("mem.ndjson");
        let res: std::result::Result<Vec<Scan>, _> =
            NdJsonScanReader::new(text.as_bytes(), path).collect();
        match res {
            Err(DataReadingError::ScanParsingError { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected a parsing error, got {:?}", other),
        }
    }

    #[test]
    fn test_in_memory_missing_file() {
        let file = SpectraFile::new("a.ndjson", "", 0, 0, 0);
        let source = InMemoryScanSource::new().with_file(
            file.clone(),
            vec![Scan::ms1(1.0, vec![500.0], vec![1.0])],
        );
        assert_eq!(source.load_scans(&file).unwrap().len(), 1);
        let other = SpectraFile::new("b.ndjson", "", 0, 0, 0);
        assert!(source.load_scans(&other).is_err());
    }
}
