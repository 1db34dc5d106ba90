//! `packfile` — random-access asset archives.
//!
//! A library for packing many input files into one compressed archive
//! (a "pack") and selectively reading individual items back at runtime.
//!
//! - [`writer::pack`] builds an archive from a list of `(source file, item
//!   path)` pairs, deduplicating identical payloads and compressing each
//!   one subject to a ratio threshold.
//! - [`reader::Reader`] opens an archive, loads its directory, and answers
//!   path lookups and item reads, safely from multiple threads given
//!   distinct thread slots.
//! - [`unpack::unpack_all`] extracts every item of a Reader to disk.

pub mod cli;
pub mod codec;
pub mod error;
pub mod format;
pub mod reader;
pub mod unpack;
pub mod writer;

pub use error::PackError;
pub use reader::{read_header, Reader, ReaderOptions};
pub use unpack::{sanitize_file_name, unpack_all, UnpackStats};
pub use writer::{pack, PackOptions, PackPair, PackStats};
