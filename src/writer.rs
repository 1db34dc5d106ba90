//! The Writer engine: turns an ordered list of `(source file, item path)`
//! pairs into one archive file, deduplicating identical payloads,
//! compressing each payload, and keeping the written order equal to the
//! sorted order the Reader engine expects.

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    codec::{CodecKind, Encoder},
    error::PackError,
    format::{path_key_cmp, FileHeader, ItemHeader, MAX_DATA_SIZE, MAX_PATH_SIZE},
};

/// One `(source file, item path)` pair to pack. `item_path` is an opaque
/// byte string (no directory hierarchy inside the archive, paths
/// are not required to be UTF-8).
#[derive(Debug, Clone)]
pub struct PackPair {
    pub file_path: PathBuf,
    pub item_path: Vec<u8>,
}

impl PackPair {
    pub fn new(file_path: impl Into<PathBuf>, item_path: impl Into<Vec<u8>>) -> Self {
        PackPair { file_path: file_path.into(), item_path: item_path.into() }
    }
}

/// Options recognized by [`pack`].
pub struct PackOptions<'a> {
    /// Use the fast codec instead of the high-ratio one.
    pub prefer_speed: bool,
    /// Print per-item and summary progress to stdout.
    pub print_progress: bool,
    /// Invoked with the index of each item right before it is processed.
    pub on_item: Option<Box<dyn FnMut(u64) + 'a>>,
}

impl<'a> Default for PackOptions<'a> {
    fn default() -> Self {
        PackOptions { prefer_speed: false, print_progress: false, on_item: None }
    }
}

/// Summary returned by a successful [`pack`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub item_count: u64,
    /// Total archive bytes (header + item headers + paths + payloads).
    pub stored_bytes: u64,
    /// Sum of uncompressed item sizes.
    pub raw_bytes: u64,
}

/// Packs `pairs` into `archive_path`. Runs the full write pipeline;
/// on any error the partially written archive file is removed.
pub fn pack(
    archive_path: impl AsRef<Path>,
    pairs: &[PackPair],
    zip_threshold: f32,
    options: &mut PackOptions,
) -> Result<PackStats, PackError> {
    let archive_path = archive_path.as_ref();
    match pack_inner(archive_path, pairs, zip_threshold, options) {
        Ok(stats) => Ok(stats),
        Err(err) => {
            let _ = fs::remove_file(archive_path);
            Err(err)
        }
    }
}

fn pack_inner(
    archive_path: &Path,
    pairs: &[PackPair],
    zip_threshold: f32,
    options: &mut PackOptions,
) -> Result<PackStats, PackError> {
    // 1. De-duplicate input pairs by file_path equality, first occurrence wins.
    let mut deduped: Vec<&PackPair> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if !deduped.iter().any(|p: &&PackPair| p.file_path == pair.file_path) {
            deduped.push(pair);
        }
    }

    if deduped.is_empty() {
        return Err(PackError::BadDataSize);
    }

    // 2. Sort by item path under the (path_size, lex bytes) comparator.
    deduped.sort_by(|a, b| path_key_cmp(&a.item_path, &b.item_path));

    let item_count = deduped.len() as u64;
    info!("Packing {} items into {:?}", item_count, archive_path);

    let codec_kind = CodecKind::from_prefer_speed(options.prefer_speed);

    // 3. Create the archive, write the header.
    let mut archive = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(archive_path)
        .map_err(|_| PackError::FailedToCreateFile(archive_path.to_path_buf()))?;

    let header = FileHeader::new(item_count, options.prefer_speed);
    header.write_to(&mut archive).map_err(|_| PackError::FailedToWriteFile)?;

    let mut encoder = Encoder::new(codec_kind)?;
    let mut item_data: Vec<u8> = Vec::new();
    let mut zip_data: Vec<u8> = Vec::new();
    let mut scratch: Vec<u8> = Vec::new();
    let mut written_headers: Vec<ItemHeader> = Vec::with_capacity(deduped.len());

    let mut file_offset = FileHeader::SIZE;
    let mut raw_bytes = 0u64;

    for (i, pair) in deduped.iter().enumerate() {
        if let Some(on_item) = options.on_item.as_mut() {
            on_item(i as u64);
        }

        let path_size = pair.item_path.len();
        if path_size == 0 || path_size > MAX_PATH_SIZE {
            return Err(PackError::BadDataSize);
        }

        let mut source = File::open(&pair.file_path)
            .map_err(|_| PackError::FailedToOpenFile(pair.file_path.clone()))?;
        let file_size = source.seek(SeekFrom::End(0)).map_err(|_| PackError::FailedToSeekFile)?;
        if file_size == 0 || file_size > MAX_DATA_SIZE {
            // The reader rejects any item whose data_size is 0, so the
            // writer never produces one.
            return Err(PackError::BadDataSize);
        }
        let file_size = file_size as usize;

        if item_data.len() < file_size {
            item_data.resize(file_size, 0);
        }
        if zip_data.len() < file_size {
            zip_data.resize(file_size, 0);
        }

        let mut zip_size = 0u32;
        {
            source.seek(SeekFrom::Start(0)).map_err(|_| PackError::FailedToSeekFile)?;
            source
                .read_exact(&mut item_data[..file_size])
                .map_err(|_| PackError::FailedToReadFile)?;
            drop(source);

            match encoder.compress(&item_data[..file_size], &mut zip_data[..file_size - 1]) {
                Ok(compressed_size) => {
                    let ratio = compressed_size as f64 / file_size as f64;
                    if zip_threshold as f64 + ratio <= 1.0 {
                        zip_size = compressed_size as u32;
                    } else {
                        debug!(
                            "item {} compressed {} -> {} bytes, below threshold; storing raw",
                            i, file_size, compressed_size
                        );
                    }
                }
                Err(_) => {
                    debug!("item {} did not compress (too small or incompressible); storing raw", i);
                }
            }
        }

        let data_size = file_size as u32;
        let stored_is_zip = zip_size > 0;
        let stored_size = if stored_is_zip { zip_size as u64 } else { data_size as u64 };

        // Dedup lookup: compare against every earlier item with a matching
        // (zip_size, data_size) pair.
        let mut same_data_offset: Option<u64> = None;
        if file_size > 0 {
            for earlier in &written_headers {
                if earlier.zip_size != zip_size || earlier.data_size != data_size {
                    continue;
                }
                if scratch.len() < stored_size as usize {
                    scratch.resize(stored_size as usize, 0);
                }
                archive
                    .seek(SeekFrom::Start(earlier.data_offset))
                    .map_err(|_| PackError::FailedToSeekFile)?;
                archive
                    .read_exact(&mut scratch[..stored_size as usize])
                    .map_err(|_| PackError::FailedToReadFile)?;
                let candidate =
                    if stored_is_zip { &zip_data[..stored_size as usize] } else { &item_data[..stored_size as usize] };
                if &scratch[..stored_size as usize] == candidate {
                    same_data_offset = Some(earlier.data_offset);
                    break;
                }
            }
        }

        archive.seek(SeekFrom::Start(file_offset)).map_err(|_| PackError::FailedToSeekFile)?;

        let is_reference = same_data_offset.is_some();
        let data_offset = same_data_offset
            .unwrap_or(file_offset + ItemHeader::SIZE + path_size as u64);

        let item_header = ItemHeader {
            zip_size,
            data_size,
            path_size: path_size as u8,
            is_reference,
            data_offset,
        };

        item_header.write_to(&mut archive).map_err(|_| PackError::FailedToWriteFile)?;
        archive.write_all(&pair.item_path).map_err(|_| PackError::FailedToWriteFile)?;
        file_offset += ItemHeader::SIZE + path_size as u64;

        if !is_reference && data_size > 0 {
            let payload = if stored_is_zip { &zip_data[..stored_size as usize] } else { &item_data[..data_size as usize] };
            archive.write_all(payload).map_err(|_| PackError::FailedToWriteFile)?;
            file_offset += stored_size;
        }

        if options.print_progress {
            let percent = ((i + 1) as f32 / item_count as f32 * 100.0) as u32;
            println!(
                "[{:3}%] Packing file {} ({}/{} bytes)",
                percent,
                String::from_utf8_lossy(&pair.item_path),
                if is_reference { 0 } else { stored_size },
                data_size
            );
        }

        raw_bytes += data_size as u64;
        written_headers.push(item_header);
    }

    archive.flush().map_err(|_| PackError::FailedToWriteFile)?;

    if options.print_progress {
        let saved = if raw_bytes > 0 {
            (1.0 - file_offset as f64 / raw_bytes as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Packed {} files. ({}/{} bytes, {:.0}% saved)",
            item_count, file_offset, raw_bytes, saved
        );
    }

    if raw_bytes == 0 {
        warn!("all packed items were empty files");
    }

    Ok(PackStats { item_count, stored_bytes: file_offset, raw_bytes })
}
