//! Audio and video formats handled through ffmpeg.

use serde::{Deserialize, Serialize};

const LOSSLESS_RATES: &[u32] = &[8000, 16000, 22050, 44100, 48000, 88200, 96000, 192000];

/// Audio format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding in an MPEG-4 container
    Aac,
    /// WAVE (uncompressed)
    Wav,
    /// Free Lossless Audio Codec
    Flac,
    /// Audio Interchange File Format (uncompressed)
    Aiff,
    /// Ogg Vorbis
    Vorbis,
    /// Opus
    Opus,
    /// Apple Lossless
    Alac,
    /// Windows Media Audio (read only)
    Wma,
}

impl AudioFormat {
    pub const ALL: &'static [AudioFormat] = &[
        Self::Mp3,
        Self::Aac,
        Self::Wav,
        Self::Flac,
        Self::Aiff,
        Self::Vorbis,
        Self::Opus,
        Self::Alac,
        Self::Wma,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aiff => "aiff",
            Self::Vorbis => "vorbis",
            Self::Opus => "opus",
            Self::Alac => "alac",
            Self::Wma => "wma",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Aac => "AAC (M4A)",
            Self::Wav => "WAV",
            Self::Flac => "FLAC",
            Self::Aiff => "AIFF",
            Self::Vorbis => "Ogg Vorbis",
            Self::Opus => "Opus",
            Self::Alac => "Apple Lossless (M4A)",
            Self::Wma => "Windows Media Audio",
        }
    }

    /// Returns the file extensions for this format, preferred first.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Mp3 => &["mp3"],
            Self::Aac => &["m4a", "aac"],
            Self::Wav => &["wav"],
            Self::Flac => &["flac"],
            Self::Aiff => &["aiff", "aif"],
            Self::Vorbis => &["ogg", "oga"],
            Self::Opus => &["opus"],
            Self::Alac => &["m4a"],
            Self::Wma => &["wma"],
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Wma)
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav | Self::Aiff | Self::Alac)
    }

    pub fn is_lossy(&self) -> bool {
        !self.is_lossless()
    }

    /// Sample rates the encoder accepts, in Hz.
    pub fn sample_rates(&self) -> &'static [u32] {
        match self {
            Self::Mp3 => &[32000, 44100, 48000],
            Self::Aac | Self::Vorbis => &[22050, 32000, 44100, 48000],
            Self::Opus => &[8000, 12000, 16000, 24000, 48000],
            Self::Wav | Self::Aiff | Self::Flac | Self::Alac => LOSSLESS_RATES,
            Self::Wma => &[],
        }
    }

    /// Bits per sample, only meaningful for lossless formats.
    pub fn sample_sizes(&self) -> &'static [u8] {
        match self {
            Self::Wav | Self::Aiff => &[16, 24, 32],
            Self::Flac | Self::Alac => &[16, 24],
            _ => &[],
        }
    }

    /// Constant bitrates in kbps, only meaningful for lossy formats.
    pub fn bitrates(&self) -> &'static [u32] {
        match self {
            Self::Mp3 => &[64, 96, 128, 160, 192, 224, 256, 320],
            Self::Aac | Self::Vorbis => &[64, 96, 128, 160, 192, 256, 320],
            Self::Opus => &[32, 48, 64, 96, 128, 160, 192, 256],
            _ => &[],
        }
    }

    pub fn supports_vbr(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Vorbis | Self::Opus)
    }

    /// Returns the ffmpeg codec name for this format at the given sample size.
    pub fn ffmpeg_codec(&self, sample_size: Option<u8>) -> &'static str {
        match (self, sample_size.unwrap_or(16)) {
            (Self::Mp3, _) => "libmp3lame",
            (Self::Aac, _) => "aac",
            (Self::Wav, 24) => "pcm_s24le",
            (Self::Wav, 32) => "pcm_s32le",
            (Self::Wav, _) => "pcm_s16le",
            (Self::Aiff, 24) => "pcm_s24be",
            (Self::Aiff, 32) => "pcm_s32be",
            (Self::Aiff, _) => "pcm_s16be",
            (Self::Flac, _) => "flac",
            (Self::Vorbis, _) => "libvorbis",
            (Self::Opus, _) => "libopus",
            (Self::Alac, _) => "alac",
            (Self::Wma, _) => "wmav2",
        }
    }

    pub fn writable() -> impl Iterator<Item = AudioFormat> {
        Self::ALL.iter().copied().filter(|f| f.is_writable())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

/// Video encoders the media backend can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    H264,
    Hevc,
    Vp9,
    Av1,
    ProRes,
    Mpeg4,
}

impl VideoEncoder {
    /// Returns the ffmpeg codec name for this encoder.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
            Self::ProRes => "prores_ks",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// Whether the encoder can run a statistics pass.
    pub fn supports_two_pass(&self) -> bool {
        matches!(self, Self::H264 | Self::Hevc | Self::Vp9 | Self::Av1 | Self::Mpeg4)
    }
}

/// Container formats for video output (plus animated GIF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Mp4,
    Mov,
    Mkv,
    Webm,
    Avi,
    Gif,
    Wmv,
    Flv,
    Mpeg,
    MpegTs,
}

impl VideoFormat {
    pub const ALL: &'static [VideoFormat] = &[
        Self::Mp4,
        Self::Mov,
        Self::Mkv,
        Self::Webm,
        Self::Avi,
        Self::Gif,
        Self::Wmv,
        Self::Flv,
        Self::Mpeg,
        Self::MpegTs,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Avi => "avi",
            Self::Gif => "gif",
            Self::Wmv => "wmv",
            Self::Flv => "flv",
            Self::Mpeg => "mpeg",
            Self::MpegTs => "mpegts",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mp4 => "MP4",
            Self::Mov => "QuickTime (MOV)",
            Self::Mkv => "Matroska (MKV)",
            Self::Webm => "WebM",
            Self::Avi => "AVI",
            Self::Gif => "Animated GIF",
            Self::Wmv => "Windows Media Video",
            Self::Flv => "Flash Video",
            Self::Mpeg => "MPEG",
            Self::MpegTs => "MPEG-TS",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v"],
            Self::Mov => &["mov", "qt"],
            Self::Mkv => &["mkv"],
            Self::Webm => &["webm"],
            Self::Avi => &["avi"],
            Self::Gif => &["gif"],
            Self::Wmv => &["wmv"],
            Self::Flv => &["flv"],
            Self::Mpeg => &["mpg", "mpeg"],
            Self::MpegTs => &["ts", "m2ts"],
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::Mp4 | Self::Mov | Self::Mkv | Self::Webm | Self::Avi | Self::Gif
        )
    }

    /// Encoders the container accepts.
    pub fn encoders(&self) -> &'static [VideoEncoder] {
        match self {
            Self::Mp4 => &[
                VideoEncoder::H264,
                VideoEncoder::Hevc,
                VideoEncoder::Av1,
                VideoEncoder::Mpeg4,
            ],
            Self::Mov => &[
                VideoEncoder::H264,
                VideoEncoder::Hevc,
                VideoEncoder::ProRes,
                VideoEncoder::Mpeg4,
            ],
            Self::Mkv => &[
                VideoEncoder::H264,
                VideoEncoder::Hevc,
                VideoEncoder::Vp9,
                VideoEncoder::Av1,
                VideoEncoder::Mpeg4,
            ],
            Self::Webm => &[VideoEncoder::Vp9, VideoEncoder::Av1],
            Self::Avi => &[VideoEncoder::Mpeg4, VideoEncoder::H264],
            _ => &[],
        }
    }

    pub fn default_encoder(&self) -> Option<VideoEncoder> {
        match self {
            Self::Mp4 | Self::Mov | Self::Mkv => Some(VideoEncoder::H264),
            Self::Webm => Some(VideoEncoder::Vp9),
            Self::Avi => Some(VideoEncoder::Mpeg4),
            _ => None,
        }
    }

    /// Audio codec paired with the video stream in this container.
    pub fn audio_codec(&self) -> Option<&'static str> {
        match self {
            Self::Mp4 | Self::Mov | Self::Mkv => Some("aac"),
            Self::Webm => Some("libopus"),
            Self::Avi => Some("libmp3lame"),
            _ => None,
        }
    }

    pub fn writable() -> impl Iterator<Item = VideoFormat> {
        Self::ALL.iter().copied().filter(|f| f.is_writable())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::Flac.extensions()[0], "flac");
        assert_eq!(AudioFormat::Mp3.extensions()[0], "mp3");
        assert_eq!(AudioFormat::Vorbis.extensions()[0], "ogg");
        assert_eq!(AudioFormat::Aac.extensions()[0], "m4a");
    }

    #[test]
    fn test_audio_format_codec() {
        assert_eq!(AudioFormat::Flac.ffmpeg_codec(None), "flac");
        assert_eq!(AudioFormat::Mp3.ffmpeg_codec(None), "libmp3lame");
        assert_eq!(AudioFormat::Wav.ffmpeg_codec(Some(24)), "pcm_s24le");
        assert_eq!(AudioFormat::Aiff.ffmpeg_codec(None), "pcm_s16be");
    }

    #[test]
    fn test_audio_format_lossless() {
        assert!(AudioFormat::Flac.is_lossless());
        assert!(AudioFormat::Wav.is_lossless());
        assert!(AudioFormat::Alac.is_lossless());
        assert!(!AudioFormat::Mp3.is_lossless());
        assert!(!AudioFormat::Vorbis.is_lossless());
        assert!(AudioFormat::Mp3.sample_sizes().is_empty());
        assert!(AudioFormat::Flac.bitrates().is_empty());
    }

    #[test]
    fn test_video_encoder_codec() {
        assert_eq!(VideoEncoder::H264.ffmpeg_codec(), "libx264");
        assert_eq!(VideoEncoder::Hevc.ffmpeg_codec(), "libx265");
        assert!(!VideoEncoder::ProRes.supports_two_pass());
    }

    #[test]
    fn test_container_encoders() {
        assert!(VideoFormat::Webm.encoders().contains(&VideoEncoder::Vp9));
        assert!(!VideoFormat::Webm.encoders().contains(&VideoEncoder::H264));
        assert_eq!(VideoFormat::Webm.default_encoder(), Some(VideoEncoder::Vp9));
        assert_eq!(VideoFormat::Gif.default_encoder(), None);
    }
}
