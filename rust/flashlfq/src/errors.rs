use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    InvalidTolerance {
        name: &'static str,
        value: f64,
    },
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    OverlappingSpectraFiles {
        files: Vec<String>,
    },
    ThreadPool {
        msg: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidTolerance { name, value } => {
                write!(
                    f,
                    "Tolerance '{}' must be finite and positive, got {}",
                    name, value
                )
            }
            ConfigError::InvalidParameter {
                name,
                value,
                reason,
            } => write!(f, "Invalid value for '{}' ({}): {}", name, value, reason),
            ConfigError::OverlappingSpectraFiles { files } => write!(
                f,
                "Cannot merge results that share spectra files: {}",
                files.join(", ")
            ),
            ConfigError::ThreadPool { msg } => write!(f, "Unable to build thread pool: {}", msg),
        }
    }
}

#[derive(Debug)]
pub enum DataReadingError {
    FileReadingError {
        source: std::io::Error,
        context: &'static str,
        path: PathBuf,
    },
    ScanParsingError {
        source: serde_json::Error,
        line: usize,
        path: PathBuf,
    },
    TableParsingError {
        source: csv::Error,
        path: PathBuf,
    },
    MissingScanSource {
        file: String,
    },
    UnknownSpectraFile {
        file_name: String,
        path: PathBuf,
    },
}

impl std::fmt::Display for DataReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataReadingError::FileReadingError {
                source,
                context,
                path,
            } => write!(f, "{} {}: {}", context, path.display(), source),
            DataReadingError::ScanParsingError { source, line, path } => write!(
                f,
                "Malformed scan on line {} of {}: {}",
                line,
                path.display(),
                source
            ),
            DataReadingError::TableParsingError { source, path } => {
                write!(f, "Unable to parse table {}: {}", path.display(), source)
            }
            DataReadingError::MissingScanSource { file } => {
                write!(f, "No scans available for spectra file {}", file)
            }
            DataReadingError::UnknownSpectraFile { file_name, path } => write!(
                f,
                "Spectra file '{}' referenced in {} is not part of the experiment",
                file_name,
                path.display()
            ),
        }
    }
}

#[derive(Debug)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedFiniteNonNanData {
        context: String,
    },
}

impl DataProcessingError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        match &mut self {
            DataProcessingError::ExpectedSlicesSameLength {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::ExpectedFiniteNonNanData {
                context: owned_context,
            } => {
                owned_context.push_str(context);
            }
        }
        self
    }
}

#[derive(Debug)]
pub enum IsotopeError {
    UnknownElement { element: String, formula: String },
    MalformedFormula { formula: String },
}

impl std::fmt::Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataProcessingError::ExpectedSlicesSameLength {
                expected,
                other,
                context,
            } => write!(
                f,
                "Expected slices of the same length, got {} and {} in {}",
                expected, other, context
            ),
            DataProcessingError::ExpectedFiniteNonNanData { context } => {
                write!(f, "Expected finite, non-NaN data in {}", context)
            }
        }
    }
}

impl std::fmt::Display for IsotopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsotopeError::UnknownElement { element, formula } => {
                write!(f, "Unknown element '{}' in formula '{}'", element, formula)
            }
            IsotopeError::MalformedFormula { formula } => {
                write!(f, "Malformed chemical formula '{}'", formula)
            }
        }
    }
}

#[derive(Debug)]
pub enum FlashLfqError {
    Config(ConfigError),
    DataReading(DataReadingError),
    DataProcessing(DataProcessingError),
    Isotope(IsotopeError),
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    TableWriting {
        source: csv::Error,
        path: PathBuf,
    },
}

impl std::fmt::Display for FlashLfqError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashLfqError::Config(x) => write!(f, "Configuration error: {}", x),
            FlashLfqError::DataReading(x) => write!(f, "Data reading error: {}", x),
            FlashLfqError::DataProcessing(x) => write!(f, "Data processing error: {}", x),
            FlashLfqError::Isotope(x) => write!(f, "Isotope error: {}", x),
            FlashLfqError::Io { source, path } => match path {
                Some(path) => write!(f, "IO error on {}: {}", path.display(), source),
                None => write!(f, "IO error: {}", source),
            },
            FlashLfqError::TableWriting { source, path } => {
                write!(f, "Unable to write table {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FlashLfqError {}

pub type Result<T> = std::result::Result<T, FlashLfqError>;

impl From<ConfigError> for FlashLfqError {
    fn from(x: ConfigError) -> Self {
        Self::Config(x)
    }
}

impl From<DataReadingError> for FlashLfqError {
    fn from(x: DataReadingError) -> Self {
        Self::DataReading(x)
    }
}

impl From<DataProcessingError> for FlashLfqError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessing(x)
    }
}

impl From<IsotopeError> for FlashLfqError {
    fn from(x: IsotopeError) -> Self {
        Self::Isotope(x)
    }
}

impl From<std::io::Error> for FlashLfqError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}
