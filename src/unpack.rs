//! The unpack driver: iterates every item of an opened [`Reader`], writes
//! each to a file under an output directory, and flattens path separators
//! in the item path into a single safe file name.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::info;
use rayon::prelude::*;

use crate::{
    error::PackError,
    reader::{Reader, ReaderOptions},
};

/// Summary of an [`unpack_all`] call, mirroring [`crate::writer::PackStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnpackStats {
    pub item_count: u64,
    pub stored_bytes: u64,
    pub raw_bytes: u64,
}

/// Replaces `/` and `\` in an item path with `-`. A deliberately flat
/// rename; nested directory creation is out of scope. Two item paths that
/// differ only in separators collide under this rule — "last write wins"
/// matching the original tool's unconditional
/// overwrite-on-create semantics.
///
/// Item paths are opaque bytes, not required to be valid UTF-8, so the
/// replacement runs on raw bytes rather than routing through `String`
/// (which would lossily mangle any non-UTF-8 path before the separator
/// substitution ever saw it).
pub fn sanitize_file_name(item_path: &[u8]) -> Vec<u8> {
    item_path
        .iter()
        .map(|&b| if b == b'/' || b == b'\\' { b'-' } else { b })
        .collect()
}

/// Builds an `OsString` from sanitized path bytes. On Unix, `OsStr` is a
/// thin wrapper over arbitrary bytes, so this is lossless; elsewhere
/// (`OsStr` is UTF-16-based) this falls back to a lossy UTF-8 decode,
/// matching what the corpus's own non-Unix fallbacks do.
#[cfg(unix)]
fn file_name_from_bytes(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

#[cfg(not(unix))]
fn file_name_from_bytes(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Opens `archive_path` and extracts every item into `output_dir`. Uses
/// `thread_count` Reader thread slots and unpacks items in parallel across
/// them (generalizing the common "reopen a file handle per rayon task"
/// idiom to the Reader's own per-slot handles). On any error, every file
/// already written is deleted and the error is returned.
pub fn unpack_all(
    archive_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    thread_count: u32,
    print_progress: bool,
) -> Result<UnpackStats, PackError> {
    let archive_path = archive_path.as_ref();
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let reader = Reader::open(archive_path, thread_count.max(1), &ReaderOptions::default())?;
    info!("Unpacking {:?} into {:?}", archive_path, output_dir);

    let item_count = reader.item_count();
    let written: Mutex<Vec<PathBuf>> = Mutex::new(Vec::with_capacity(item_count as usize));
    let raw_bytes = Mutex::new(0u64);
    let stored_bytes = Mutex::new(0u64);

    let result: Result<(), PackError> = (0..item_count).into_par_iter().try_for_each(|index| {
        let slot = (index % reader.thread_count() as u64) as u32;
        let data = reader.read_item_owned(index, slot)?;

        let file_name_bytes = sanitize_file_name(reader.item_path(index));
        let file_name = file_name_from_bytes(file_name_bytes);
        let out_path = output_dir.join(&file_name);
        let mut out_file = File::create(&out_path).map_err(|_| PackError::FailedToOpenFile(out_path.clone()))?;
        out_file.write_all(&data).map_err(|_| PackError::FailedToWriteFile)?;

        written.lock().expect("unpack tracking mutex poisoned").push(out_path);
        *raw_bytes.lock().expect("unpack tracking mutex poisoned") += data.len() as u64;
        if !reader.is_item_reference(index) {
            let zip_size = reader.item_zip_size(index);
            let contribution = if zip_size > 0 { zip_size } else { reader.item_data_size(index) };
            *stored_bytes.lock().expect("unpack tracking mutex poisoned") += contribution as u64;
        }

        if print_progress {
            let percent = ((index + 1) as f32 / item_count as f32 * 100.0) as u32;
            println!("[{percent:3}%] Unpacking file {}", file_name.to_string_lossy());
        }
        Ok(())
    });

    if let Err(err) = result {
        for path in written.into_inner().expect("unpack tracking mutex poisoned") {
            let _ = fs::remove_file(path);
        }
        return Err(err);
    }

    let stats = UnpackStats {
        item_count,
        stored_bytes: stored_bytes.into_inner().expect("unpack tracking mutex poisoned"),
        raw_bytes: raw_bytes.into_inner().expect("unpack tracking mutex poisoned"),
    };

    if print_progress {
        let saved = if stats.raw_bytes > 0 {
            (1.0 - stats.stored_bytes as f64 / stats.raw_bytes as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Unpacked {} files. ({}/{} bytes, {:.0}% saved)",
            stats.item_count, stats.stored_bytes, stats.raw_bytes, saved
        );
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::writer::{pack, PackOptions, PackPair};

    #[test]
    fn round_trip_preserves_bytes_and_renames_separators() {
        let dir = tempdir().unwrap();
        let src_a = dir.path().join("a.src");
        let src_b = dir.path().join("b.src");
        fs::write(&src_a, b"alpha contents").unwrap();
        fs::write(&src_b, b"beta contents").unwrap();

        let archive_path = dir.path().join("archive.pack");
        let pairs = vec![
            PackPair::new(&src_a, b"dir/alpha.txt".to_vec()),
            PackPair::new(&src_b, b"beta.txt".to_vec()),
        ];
        let mut options = PackOptions::default();
        pack(&archive_path, &pairs, 0.1, &mut options).unwrap();

        let out_dir = dir.path().join("out");
        let stats = unpack_all(&archive_path, &out_dir, 2, false).unwrap();
        assert_eq!(stats.item_count, 2);

        assert_eq!(fs::read(out_dir.join("dir-alpha.txt")).unwrap(), b"alpha contents");
        assert_eq!(fs::read(out_dir.join("beta.txt")).unwrap(), b"beta contents");
    }

    #[test]
    fn sanitize_replaces_both_separators() {
        assert_eq!(sanitize_file_name(b"a/b\\c"), b"a-b-c".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_item_path_round_trips_through_unpack() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload bytes").unwrap();

        // 0xFF is not valid UTF-8 in any position; a lossy conversion
        // would replace it with U+FFFD before the separator substitution
        // ran, producing a different file name than the raw bytes demand.
        let item_path = vec![b'a', 0xFF, b'/', b'b'];
        let archive_path = dir.path().join("archive.pack");
        let pairs = vec![PackPair::new(&src, item_path.clone())];
        let mut options = PackOptions::default();
        pack(&archive_path, &pairs, 0.1, &mut options).unwrap();

        let out_dir = dir.path().join("out");
        unpack_all(&archive_path, &out_dir, 1, false).unwrap();

        let expected_name = sanitize_file_name(&item_path);
        let expected_path = out_dir.join(file_name_from_bytes(expected_name.clone()));
        assert_eq!(
            expected_path.file_name().unwrap().as_bytes(),
            expected_name.as_slice()
        );
        assert_eq!(fs::read(&expected_path).unwrap(), b"payload bytes");
    }
}
