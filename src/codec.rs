//! Thin adapter over the two interchangeable compression strategies a Pack
//! archive can use: a high-ratio codec (zstd, at its maximum level) and a
//! fast codec (LZ4). The reader only ever needs to know which one a given
//! archive was written with, carried in `FileHeader::prefer_speed`,
//! never the codec's internals.

use crate::error::PackError;

/// Which compression strategy an archive uses. Selected once, at pack
/// time, and recorded in the file header so later opens never need an
/// out-of-band hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// zstd at its maximum compression level: best ratio, slower to encode.
    HighRatio,
    /// LZ4: fast to encode and decode, lower ratio.
    Fast,
}

impl CodecKind {
    pub fn from_prefer_speed(prefer_speed: bool) -> Self {
        if prefer_speed { CodecKind::Fast } else { CodecKind::HighRatio }
    }

    pub fn prefer_speed(self) -> bool {
        matches!(self, CodecKind::Fast)
    }
}

/// Per-call (writer side) or per-thread-slot (reader side) encoder state.
/// zstd's `Compressor` owns a reusable `ZSTD_CCtx`; LZ4 is stateless so
/// `Fast` carries no context at all.
pub enum Encoder<'a> {
    HighRatio(zstd::bulk::Compressor<'a>),
    Fast,
}

impl Encoder<'static> {
    pub fn new(kind: CodecKind) -> Result<Self, PackError> {
        match kind {
            CodecKind::HighRatio => {
                let level = zstd::compression_level_range().last().unwrap_or(19);
                let compressor =
                    zstd::bulk::Compressor::new(level).map_err(|_| PackError::FailedToCreateCodec)?;
                Ok(Encoder::HighRatio(compressor))
            }
            CodecKind::Fast => Ok(Encoder::Fast),
        }
    }

    /// Attempts to encode `src` into `dst`, whose capacity is expected to
    /// be strictly less than `src.len()` (anything that would
    /// not fit in that smaller capacity is simply "not worth compressing").
    /// Returns the number of bytes written, or an error the caller treats
    /// identically to "didn't fit".
    pub fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, PackError> {
        match self {
            Encoder::HighRatio(compressor) => compressor
                .compress_to_buffer(src, &mut &mut dst[..])
                .map_err(|_| PackError::FailedToDecompress),
            Encoder::Fast => {
                lz4_flex::block::compress_into(src, dst).map_err(|_| PackError::FailedToDecompress)
            }
        }
    }
}

/// Per-thread-slot decoder state (one decoder context per
/// reader thread slot, never shared).
pub enum Decoder<'a> {
    HighRatio(zstd::bulk::Decompressor<'a>),
    Fast,
}

impl Decoder<'static> {
    pub fn new(kind: CodecKind) -> Result<Self, PackError> {
        match kind {
            CodecKind::HighRatio => {
                let decompressor =
                    zstd::bulk::Decompressor::new().map_err(|_| PackError::FailedToCreateCodec)?;
                Ok(Decoder::HighRatio(decompressor))
            }
            CodecKind::Fast => Ok(Decoder::Fast),
        }
    }

    /// Decompresses `src` into `dst`; any outcome other than filling
    /// exactly `dst.len()` bytes is `FailedToDecompress`.
    pub fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), PackError> {
        let written = match self {
            Decoder::HighRatio(decompressor) => decompressor
                .decompress_to_buffer(src, &mut &mut dst[..])
                .map_err(|_| PackError::FailedToDecompress)?,
            Decoder::Fast => {
                lz4_flex::block::decompress_into(src, dst).map_err(|_| PackError::FailedToDecompress)?
            }
        };
        if written != dst.len() {
            return Err(PackError::FailedToDecompress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_ratio_round_trips_compressible_text() {
        let src = "the quick brown fox ".repeat(64);
        let src = src.as_bytes();
        let mut enc = Encoder::new(CodecKind::HighRatio).unwrap();
        let mut dst = vec![0u8; src.len() - 1];
        let n = enc.compress(src, &mut dst).unwrap();
        dst.truncate(n);
        assert!(dst.len() < src.len());

        let mut dec = Decoder::new(CodecKind::HighRatio).unwrap();
        let mut out = vec![0u8; src.len()];
        dec.decompress(&dst, &mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn fast_round_trips_compressible_text() {
        let src = "lorem ipsum dolor sit amet ".repeat(64);
        let src = src.as_bytes();
        let mut enc = Encoder::new(CodecKind::Fast).unwrap();
        let mut dst = vec![0u8; src.len() - 1];
        let n = enc.compress(src, &mut dst).unwrap();
        dst.truncate(n);
        assert!(dst.len() < src.len());

        let mut dec = Decoder::new(CodecKind::Fast).unwrap();
        let mut out = vec![0u8; src.len()];
        dec.decompress(&dst, &mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn high_ratio_rejects_tiny_incompressible_input() {
        let src = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let mut enc = Encoder::new(CodecKind::HighRatio).unwrap();
        let mut dst = vec![0u8; src.len() - 1];
        assert!(enc.compress(&src, &mut dst).is_err());
    }
}
