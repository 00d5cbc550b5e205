//! Output encoding selection.
//!
//! Maps probed sample format facts onto the PCM encoding used for every mono
//! output of a file, so outputs keep the source bit depth.

use std::fmt;

/// PCM encoding of the mono outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodingSpec {
    PcmS16,
    PcmS24,
    #[default]
    PcmS32,
    PcmF32,
    PcmF64,
}

impl EncodingSpec {
    /// ffmpeg audio codec name for this encoding.
    pub fn codec_name(&self) -> &'static str {
        match self {
            EncodingSpec::PcmS16 => "pcm_s16le",
            EncodingSpec::PcmS24 => "pcm_s24le",
            EncodingSpec::PcmS32 => "pcm_s32le",
            EncodingSpec::PcmF32 => "pcm_f32le",
            EncodingSpec::PcmF64 => "pcm_f64le",
        }
    }
}

impl fmt::Display for EncodingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_name())
    }
}

fn is_float_format(sample_format: &str) -> bool {
    sample_format.starts_with("flt") || sample_format.starts_with("dbl")
}

/// Selects the output encoding from probed facts.
///
/// A known bit depth decides first; a float sample format only changes the
/// outcome for 32 and 64 bit streams. Without a usable bit depth the sample
/// format name decides, and anything unrecognised yields [`EncodingSpec::PcmS32`].
pub fn select_encoding(sample_format: Option<&str>, bits_per_sample: Option<u32>) -> EncodingSpec {
    let format = sample_format
        .map(|f| f.trim().to_lowercase())
        .unwrap_or_default();
    let float = is_float_format(&format);

    match bits_per_sample {
        Some(16) => return EncodingSpec::PcmS16,
        Some(24) => return EncodingSpec::PcmS24,
        Some(32) if float => return EncodingSpec::PcmF32,
        Some(32) => return EncodingSpec::PcmS32,
        Some(64) if float => return EncodingSpec::PcmF64,
        _ => {}
    }

    if format.starts_with("s16") {
        EncodingSpec::PcmS16
    } else if format.starts_with("s24") {
        EncodingSpec::PcmS24
    } else if format.starts_with("s32") {
        EncodingSpec::PcmS32
    } else if format.starts_with("flt") {
        EncodingSpec::PcmF32
    } else if format.starts_with("dbl") {
        EncodingSpec::PcmF64
    } else {
        EncodingSpec::default()
    }
}
