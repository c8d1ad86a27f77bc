//! Input classification and output naming

use crate::jobs::OutputSpec;

/// Format value that picks `aac` for audio inputs and `mp4` otherwise
pub const DEFAULT_FORMAT: &str = "_default_";
pub const DEFAULT_FORMAT_AUDIO: &str = "aac";
pub const DEFAULT_FORMAT_VIDEO: &str = "mp4";

/// Output formats the harness can request
pub const SUPPORTED_FORMATS: &[&str] = &["aac", "mp3", "mp4", "ogg", "webm", DEFAULT_FORMAT];

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "wav", "m4a"];

/// Whether a file name or format denotes audio-only media
pub fn is_audio(name: &str) -> bool {
    let lower = name.to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// An input object resolved from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputObject {
    pub name: String,
    pub size: u64,
    /// Lowercased extension of the object name
    pub input_format: String,
    /// Output format requested for this input
    pub format: String,
    pub audio_only: bool,
}

impl InputObject {
    /// Classify `name`, resolving the default format against the input type
    pub fn new(name: impl Into<String>, size: u64, format: &str) -> Self {
        let name = name.into();
        let format = if format == DEFAULT_FORMAT {
            if is_audio(&name) {
                DEFAULT_FORMAT_AUDIO
            } else {
                DEFAULT_FORMAT_VIDEO
            }
        } else {
            format
        }
        .to_string();
        let input_format = name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let audio_only = is_audio(&name) || is_audio(&format);
        Self {
            name,
            size,
            input_format,
            format,
            audio_only,
        }
    }

    /// Base name with the input extension removed
    pub fn stem(&self) -> String {
        let base = self.name.rsplit('/').next().unwrap_or_default();
        base.replace(&format!(".{}", self.input_format), "")
            .replace(&format!(".{}", self.input_format.to_uppercase()), "")
    }
}

/// Requested bitrates applied to every output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bitrates {
    pub audio: Option<u32>,
    pub video: Option<u32>,
}

/// Output specs for one input, written under `prefix`.
///
/// Names follow `<prefix>/<stem>_a<abr>[_v<vbr>]_<n>.<format>` with `-def`
/// standing in for a provider default bitrate; audio-only outputs carry no
/// video part and no video bitrate.
pub fn output_specs(prefix: &str, input: &InputObject, bitrates: Bitrates) -> Vec<OutputSpec> {
    let video_bitrate = if input.audio_only { None } else { bitrates.video };
    let abr = bitrates
        .audio
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-def".to_string());
    let video_part = if input.audio_only {
        String::new()
    } else {
        format!(
            "_v{}",
            video_bitrate
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-def".to_string())
        )
    };
    let name = format!(
        "{}/{}_a{}{}_{}.{}",
        prefix,
        input.stem(),
        abr,
        video_part,
        1,
        input.format
    );
    vec![OutputSpec {
        name,
        format: input.format.clone(),
        audio_bitrate: bitrates.audio,
        video_bitrate,
    }]
}

/// Random prefix grouping the outputs of one job
pub fn output_prefix() -> String {
    format!("ch{}", rand::random::<u32>())
}
