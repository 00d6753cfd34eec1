// ABOUTME: Record loaders for isadoc: schema-shaped YAML/JSON documents and C macro headers.
// ABOUTME: Also provides batch conversion of a folder of inputs into emitted YAML files.

pub mod batch;
pub mod header;
pub mod source;

use std::path::{Path, PathBuf};

use isadoc_core::InstructionRecord;
use thiserror::Error;

pub use batch::{BatchError, BatchOptions, BatchReport, convert_dir};
pub use header::{HeaderError, export_header, load_header_file, parse_header, write_header};
pub use source::{SourceError, SourceFormat, load_source_file, load_source_str};

/// Errors from loading a record file of any supported kind.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error("{}: {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },

    #[error("unrecognized input file: {}", .0.display())]
    Unrecognized(PathBuf),
}

/// Which loader handles a given input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Document(SourceFormat),
    Header,
}

/// Classify an input path by extension.
pub fn record_kind(path: &Path) -> Option<RecordKind> {
    if let Some(format) = SourceFormat::from_path(path) {
        return Some(RecordKind::Document(format));
    }
    match path.extension()?.to_str()? {
        "h" => Some(RecordKind::Header),
        _ => None,
    }
}

/// Load a record from a `.yaml`/`.yml`/`.json` document or a `.h` header.
pub fn load_record_file(path: &Path) -> Result<InstructionRecord, LoadError> {
    match record_kind(path) {
        Some(RecordKind::Document(_)) => load_source_file(path).map_err(|source| LoadError::Source {
            path: path.to_path_buf(),
            source,
        }),
        Some(RecordKind::Header) => load_header_file(path).map_err(|source| LoadError::Header {
            path: path.to_path_buf(),
            source,
        }),
        None => Err(LoadError::Unrecognized(path.to_path_buf())),
    }
}
