use std::io;

use thiserror::Error;

/// Closed error taxonomy surfaced to callers, matching the Pack result
/// codes one-to-one so a CLI can print a fixed human string per kind.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to allocate")]
    FailedToAllocate,
    #[error("failed to create codec context")]
    FailedToCreateCodec,
    #[error("failed to create file: {0}")]
    FailedToCreateFile(std::path::PathBuf),
    #[error("failed to open file: {0}")]
    FailedToOpenFile(std::path::PathBuf),
    #[error("failed to write file")]
    FailedToWriteFile,
    #[error("failed to read file")]
    FailedToReadFile,
    #[error("failed to seek file")]
    FailedToSeekFile,
    #[error("failed to get resources directory")]
    FailedToGetDirectory,
    #[error("failed to decompress item data")]
    FailedToDecompress,
    #[error("item not found")]
    FailedToGetItem,
    #[error("bad data size")]
    BadDataSize,
    #[error("not a Pack archive (bad magic)")]
    BadFileType,
    #[error("unsupported Pack file version")]
    BadFileVersion,
    #[error("archive endianness does not match this host")]
    BadFileEndianness,
}

impl PackError {
    /// Fixed human string for the error kind, independent of any payload,
    /// mirroring `packResultToString` for CLI output.
    pub fn kind_str(&self) -> &'static str {
        match self {
            PackError::Io(_) => "I/O error",
            PackError::FailedToAllocate => "Failed to allocate",
            PackError::FailedToCreateCodec => "Failed to create codec",
            PackError::FailedToCreateFile(_) => "Failed to create file",
            PackError::FailedToOpenFile(_) => "Failed to open file",
            PackError::FailedToWriteFile => "Failed to write file",
            PackError::FailedToReadFile => "Failed to read file",
            PackError::FailedToSeekFile => "Failed to seek file",
            PackError::FailedToGetDirectory => "Failed to get directory",
            PackError::FailedToDecompress => "Failed to decompress",
            PackError::FailedToGetItem => "Failed to get item",
            PackError::BadDataSize => "Bad data size",
            PackError::BadFileType => "Bad file type",
            PackError::BadFileVersion => "Bad file version",
            PackError::BadFileEndianness => "Bad file endianness",
        }
    }
}
