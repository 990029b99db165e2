use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use zip::ZipArchive;

/// Parsed rows of one feed file, with the CSV line each row came from.
#[derive(Debug, Clone)]
pub struct CsvTable<T> {
    pub headers: Vec<String>,
    pub rows: Vec<T>,
    pub row_numbers: Vec<u64>,
}

impl<T> Default for CsvTable<T> {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            row_numbers: Vec::new(),
        }
    }
}

impl<T> CsvTable<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        Self {
            headers: Vec::new(),
            rows,
            row_numbers: Vec::new(),
        }
    }

    /// 1-based CSV line of `index`; the header occupies line 1.
    pub fn row_number(&self, index: usize) -> u64 {
        self.row_numbers
            .get(index)
            .copied()
            .unwrap_or(index as u64 + 2)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GtfsInputError {
    #[error("input path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("input is neither a directory nor a .zip archive: {0}")]
    InvalidPath(PathBuf),
    #[error("required file {0} is missing")]
    MissingFile(String),
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open archive {file}: {source}")]
    ZipArchive {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to parse {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
}

/// Location of a feed: an unpacked directory or a zip archive.
#[derive(Debug, Clone)]
pub enum GtfsInput {
    Directory(PathBuf),
    Zip(PathBuf),
}

impl GtfsInput {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GtfsInputError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GtfsInputError::MissingPath(path.to_path_buf()));
        }
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        let is_zip = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"));
        if path.is_file() && is_zip {
            Ok(Self::Zip(path.to_path_buf()))
        } else {
            Err(GtfsInputError::InvalidPath(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Zip(path) => path,
        }
    }

    /// Raw bytes of `file_name`, `None` when the feed does not contain it.
    pub fn read_file(&self, file_name: &str) -> Result<Option<Vec<u8>>, GtfsInputError> {
        match self {
            Self::Directory(dir) => {
                let path = dir.join(file_name);
                if !path.is_file() {
                    return Ok(None);
                }
                std::fs::read(&path)
                    .map(Some)
                    .map_err(|source| GtfsInputError::Io {
                        file: file_name.to_string(),
                        source,
                    })
            }
            Self::Zip(path) => read_zip_entry(path, file_name),
        }
    }

    pub fn read_optional_csv<T: DeserializeOwned>(
        &self,
        file_name: &str,
    ) -> Result<Option<CsvTable<T>>, GtfsInputError> {
        match self.read_file(file_name)? {
            Some(data) => parse_csv_table(file_name, &data).map(Some),
            None => Ok(None),
        }
    }

    pub fn read_required_csv<T: DeserializeOwned>(
        &self,
        file_name: &str,
    ) -> Result<CsvTable<T>, GtfsInputError> {
        self.read_optional_csv(file_name)?
            .ok_or_else(|| GtfsInputError::MissingFile(file_name.to_string()))
    }
}

fn read_zip_entry(path: &Path, file_name: &str) -> Result<Option<Vec<u8>>, GtfsInputError> {
    let archive_name = path.display().to_string();
    let file = File::open(path).map_err(|source| GtfsInputError::Io {
        file: archive_name.clone(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|source| GtfsInputError::ZipArchive {
        file: archive_name.clone(),
        source,
    })?;

    // Feeds are sometimes zipped together with their parent directory.
    let entry_name = archive
        .file_names()
        .filter(|name| {
            Path::new(name)
                .file_name()
                .is_some_and(|base| base == file_name)
        })
        .min_by_key(|name| name.len())
        .map(str::to_string);
    let Some(entry_name) = entry_name else {
        return Ok(None);
    };

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|source| GtfsInputError::ZipArchive {
            file: archive_name,
            source,
        })?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut data)
        .map_err(|source| GtfsInputError::Io {
            file: file_name.to_string(),
            source,
        })?;
    Ok(Some(data))
}

pub fn parse_csv_table<T: DeserializeOwned>(
    file_name: &str,
    data: &[u8],
) -> Result<CsvTable<T>, GtfsInputError> {
    let csv_error = |source| GtfsInputError::Csv {
        file: file_name.to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(strip_utf8_bom(data));

    let header_record: StringRecord = reader.headers().map_err(csv_error)?.clone();
    let headers = header_record.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    let mut row_numbers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let row: T = record.deserialize(Some(&header_record)).map_err(csv_error)?;
        rows.push(row);
        row_numbers.push(line);
    }

    Ok(CsvTable {
        headers,
        rows,
        row_numbers,
    })
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
