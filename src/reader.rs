//! The Reader engine: opens an archive, loads only its directory, answers
//! path→item lookups in logarithmic time, and decompresses items on demand
//! with support for concurrent reads from multiple threads.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
    sync::Mutex,
};

use log::{debug, info};

use crate::{
    codec::{CodecKind, Decoder},
    error::PackError,
    format::{path_key_cmp, FileHeader, ItemHeader},
};

struct Item {
    header: ItemHeader,
    path: Vec<u8>,
}

/// Options recognized by [`Reader::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Platform hint: resolve `path` relative to the app's resources
    /// directory. Outside macOS this is a documented no-op, matching
    /// `original_source/source/reader.c`'s `__APPLE__`-gated lookup.
    pub is_resources_directory: bool,
    /// Retained for API symmetry with [`crate::writer::PackOptions`]; an
    /// archive always carries its own codec-selector byte in the header,
    /// so that value wins over this hint regardless of what it is set to.
    pub prefer_speed: bool,
}

/// An opened Pack archive. Every metadata query is a pure read of the
/// already-loaded directory and is safe to call from any thread
/// concurrently. [`Reader::read_item`] additionally takes a
/// caller-partitioned `thread_slot`: each slot owns one file handle and
/// one decoder context, so two threads using distinct slots never
/// contend. The handle and decoder are still wrapped in a `Mutex` each,
/// because safe Rust has no way to hand out `&mut File` through a shared
/// `&self` without one; callers who respect the slot partitioning never
/// observe contention; the lock only guards against a caller sharing a
/// slot across threads by mistake.
pub struct Reader {
    items: Vec<Item>,
    codec_kind: CodecKind,
    files: Vec<Mutex<File>>,
    decoders: Vec<Mutex<Decoder<'static>>>,
}

impl Reader {
    /// Opens `path`, allocating `thread_count` file handles and decoder
    /// contexts, and loads the item directory.
    pub fn open(path: impl AsRef<Path>, thread_count: u32, options: &ReaderOptions) -> Result<Self, PackError> {
        let path = path.as_ref();
        if thread_count == 0 {
            return Err(PackError::BadDataSize);
        }
        if options.is_resources_directory && !cfg!(target_os = "macos") {
            debug!("is_resources_directory hint ignored on this platform");
        }

        let mut files = Vec::with_capacity(thread_count as usize);
        for _ in 0..thread_count {
            let file = File::open(path).map_err(|_| PackError::FailedToOpenFile(path.to_path_buf()))?;
            files.push(file);
        }

        let file_len = files[0].metadata().map_err(|_| PackError::FailedToReadFile)?.len();

        let header = FileHeader::read_from(&mut files[0])?;
        let codec_kind = CodecKind::from_prefer_speed(header.prefer_speed);

        validate_item_count(header.item_count, file_len)?;
        let items = read_directory(&mut files[0], header.item_count)?;

        let mut decoders = Vec::with_capacity(thread_count as usize);
        for _ in 0..thread_count {
            decoders.push(Mutex::new(Decoder::new(codec_kind)?));
        }

        info!("Opened archive {:?} with {} items, {} thread slot(s)", path, items.len(), thread_count);

        Ok(Reader {
            items,
            codec_kind,
            files: files.into_iter().map(Mutex::new).collect(),
            decoders,
        })
    }

    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn codec_kind(&self) -> CodecKind {
        self.codec_kind
    }

    pub fn thread_count(&self) -> u32 {
        self.files.len() as u32
    }

    /// Binary search by `(path_len, lex bytes)`, the order items were
    /// written in (invariant I1).
    pub fn find_index(&self, path: &[u8]) -> Option<u64> {
        self.items
            .binary_search_by(|item| path_key_cmp(&item.path, path))
            .ok()
            .map(|i| i as u64)
    }

    pub fn item_data_size(&self, index: u64) -> u32 {
        self.items[index as usize].header.data_size
    }

    pub fn item_zip_size(&self, index: u64) -> u32 {
        self.items[index as usize].header.zip_size
    }

    pub fn item_path(&self, index: u64) -> &[u8] {
        &self.items[index as usize].path
    }

    pub fn item_file_offset(&self, index: u64) -> u64 {
        self.items[index as usize].header.data_offset
    }

    pub fn is_item_reference(&self, index: u64) -> bool {
        self.items[index as usize].header.is_reference
    }

    /// Reads item `index`'s uncompressed bytes into `out`, using the file
    /// handle and decoder pinned to `thread_slot`. `out` must be at least
    /// `item_data_size(index)` bytes; only that many bytes are written.
    ///
    /// References read transparently: their `data_offset` already points
    /// at the shared payload, so no special-casing is needed here.
    pub fn read_item(&self, index: u64, out: &mut [u8], thread_slot: u32) -> Result<(), PackError> {
        let item = self
            .items
            .get(index as usize)
            .ok_or(PackError::FailedToGetItem)?;
        let header = item.header;
        if (out.len() as u64) < header.data_size as u64 {
            return Err(PackError::FailedToAllocate);
        }
        let mut file = self
            .files
            .get(thread_slot as usize)
            .ok_or(PackError::FailedToGetItem)?
            .lock()
            .expect("reader file mutex poisoned");
        let mut decoder = self
            .decoders
            .get(thread_slot as usize)
            .ok_or(PackError::FailedToGetItem)?
            .lock()
            .expect("reader decoder mutex poisoned");

        file.seek(SeekFrom::Start(header.data_offset)).map_err(|_| PackError::FailedToSeekFile)?;

        let dst = &mut out[..header.data_size as usize];
        if header.zip_size > 0 {
            let mut zip_buf = vec![0u8; header.zip_size as usize];
            file.read_exact(&mut zip_buf).map_err(|_| PackError::FailedToReadFile)?;
            decoder.decompress(&zip_buf, dst)?;
        } else {
            file.read_exact(dst).map_err(|_| PackError::FailedToReadFile)?;
        }
        Ok(())
    }

    /// Convenience variant that allocates its own output buffer. Not
    /// cheaper than [`Reader::read_item`], and only meant for
    /// single-threaded callers (the allocation itself is thread-safe, but
    /// callers wanting zero-allocation concurrent reads should prefer the
    /// borrowed-buffer form).
    pub fn read_item_owned(&self, index: u64, thread_slot: u32) -> Result<Vec<u8>, PackError> {
        let size = self.item_data_size(index) as usize;
        let mut buf = vec![0u8; size];
        self.read_item(index, &mut buf, thread_slot)?;
        Ok(buf)
    }
}

/// Reads and validates only the file header, without loading the
/// directory.
pub fn read_header(path: impl AsRef<Path>) -> Result<FileHeader, PackError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|_| PackError::FailedToOpenFile(path.to_path_buf()))?;
    FileHeader::read_from(&mut file)
}

/// Rejects an `item_count` read straight off disk that could not possibly
/// fit in the archive's actual size, before anything preallocates a
/// `Vec` sized from it. Every item occupies at least `ItemHeader::SIZE +
/// 1` bytes on disk (a header plus a one-byte path, for the smallest
/// possible reference item with no payload of its own); a count above
/// that bound is a corrupt or malicious header, not a valid archive that
/// merely needs a very large allocation. Mirrors
/// `original_source/source/reader.c`'s `createPackItems` checking its
/// `malloc` return value before trusting the count it was given.
fn validate_item_count(item_count: u64, file_len: u64) -> Result<(), PackError> {
    let remaining = file_len.saturating_sub(FileHeader::SIZE);
    let min_item_span = ItemHeader::SIZE + 1;
    let max_possible_items = remaining / min_item_span;
    if item_count > max_possible_items {
        return Err(PackError::BadDataSize);
    }
    Ok(())
}

fn read_directory(file: &mut File, item_count: u64) -> Result<Vec<Item>, PackError> {
    let mut items = Vec::with_capacity(item_count as usize);
    for _ in 0..item_count {
        let header = ItemHeader::read_from(file)?;
        if header.data_size == 0 || header.path_size == 0 || header.data_offset == 0 {
            return Err(PackError::BadDataSize);
        }

        let mut path = vec![0u8; header.path_size as usize];
        file.read_exact(&mut path).map_err(|_| PackError::FailedToReadFile)?;

        if !header.is_reference {
            let skip = header.stored_payload_size() as i64;
            file.seek(SeekFrom::Current(skip)).map_err(|_| PackError::FailedToSeekFile)?;
        }

        items.push(Item { header, path });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::writer::{pack, PackOptions, PackPair};

    fn build_archive(dir: &Path, items: &[(&str, &[u8])]) -> std::path::PathBuf {
        let mut pairs = Vec::new();
        for (name, contents) in items {
            let path = dir.join(format!("{name}.src"));
            fs::write(&path, contents).unwrap();
            pairs.push(PackPair::new(path, name.as_bytes().to_vec()));
        }
        let archive_path = dir.join("archive.pack");
        let mut options = PackOptions::default();
        pack(&archive_path, &pairs, 0.1, &mut options).unwrap();
        archive_path
    }

    #[test]
    fn find_index_is_idempotent_for_every_item() {
        let dir = tempdir().unwrap();
        let archive = build_archive(dir.path(), &[("a", b"1"), ("bb", b"22"), ("ccc", b"333")]);
        let reader = Reader::open(&archive, 1, &ReaderOptions::default()).unwrap();
        for i in 0..reader.item_count() {
            let path = reader.item_path(i).to_vec();
            assert_eq!(reader.find_index(&path), Some(i));
        }
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempdir().unwrap();
        let archive = build_archive(dir.path(), &[("a", b"1")]);
        let reader = Reader::open(&archive, 1, &ReaderOptions::default()).unwrap();
        assert_eq!(reader.find_index(b"does-not-exist"), None);
    }

    #[test]
    fn bad_magic_is_rejected_with_no_reader() {
        let dir = tempdir().unwrap();
        let archive = build_archive(dir.path(), &[("a", b"1")]);
        let mut bytes = fs::read(&archive).unwrap();
        bytes[0] = b'Q';
        fs::write(&archive, &bytes).unwrap();
        let err = Reader::open(&archive, 1, &ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, PackError::BadFileType));
    }

    #[test]
    fn item_count_too_large_for_file_is_rejected_without_allocating() {
        let dir = tempdir().unwrap();
        let archive = build_archive(dir.path(), &[("a", b"1")]);
        let mut bytes = fs::read(&archive).unwrap();
        // Overwrite item_count (the u64 at byte offset 16) with an
        // implausibly large value the file is far too small to back.
        bytes[16..24].copy_from_slice(&u64::MAX.to_ne_bytes());
        fs::write(&archive, &bytes).unwrap();
        let err = Reader::open(&archive, 1, &ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, PackError::BadDataSize));
    }

    #[test]
    fn validate_item_count_accepts_exact_fit_and_rejects_one_more() {
        let file_len = FileHeader::SIZE + (ItemHeader::SIZE + 1) * 3;
        assert!(validate_item_count(3, file_len).is_ok());
        assert!(validate_item_count(4, file_len).is_err());
    }

    #[test]
    fn concurrent_reads_across_thread_slots_round_robin() {
        let dir = tempdir().unwrap();
        let items: Vec<(String, Vec<u8>)> = (0..8)
            .map(|i| (format!("item{i}"), vec![i as u8; 1024 + i as usize]))
            .collect();
        let items_ref: Vec<(&str, &[u8])> = items.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
        let archive = build_archive(dir.path(), &items_ref);

        let reader = Reader::open(&archive, 4, &ReaderOptions::default()).unwrap();
        let reader = std::sync::Arc::new(reader);

        std::thread::scope(|scope| {
            for slot in 0..4u32 {
                let reader = reader.clone();
                let expected: Vec<(u64, Vec<u8>)> = (0..reader.item_count())
                    .filter(|i| i % 4 == slot as u64)
                    .map(|i| (i, items[i as usize].1.clone()))
                    .collect();
                scope.spawn(move || {
                    for (index, expected_bytes) in expected {
                        let data = reader.read_item_owned(index, slot).unwrap();
                        assert_eq!(data, expected_bytes);
                    }
                });
            }
        });
    }
}
