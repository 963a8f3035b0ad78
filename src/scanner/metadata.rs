use lofty::prelude::*;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioReadError {
    #[error("Cannot read audio file {path}: {message}")]
    Unreadable { path: String, message: String },
    #[error("Audio file {path} does not report its {field}")]
    MissingProperty { path: String, field: &'static str },
}

/// Technical properties of an audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub channels: u16,
    pub sample_rate: u32,
    /// Frame count, when the container reports one exactly.
    pub frames: Option<u64>,
    pub duration_secs: f64,
}

impl AudioInfo {
    pub fn frequency_khz(&self) -> f64 {
        self.sample_rate as f64 / 1000.0
    }
}

/// Read channel count, sample rate and duration. WAV headers are read with
/// hound; everything else goes through lofty.
pub fn read_audio_info(path: &Path) -> Result<AudioInfo, AudioReadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if ext == "wav" {
        read_wav(path)
    } else {
        read_with_lofty(path)
    }
}

fn unreadable(path: &Path, e: impl std::fmt::Display) -> AudioReadError {
    AudioReadError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn read_wav(path: &Path) -> Result<AudioInfo, AudioReadError> {
    let reader = hound::WavReader::open(path).map_err(|e| unreadable(path, e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AudioReadError::MissingProperty {
            path: path.display().to_string(),
            field: "sample rate",
        });
    }
    let frames = reader.duration() as u64;
    Ok(AudioInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        frames: Some(frames),
        duration_secs: frames as f64 / spec.sample_rate as f64,
    })
}

fn read_with_lofty(path: &Path) -> Result<AudioInfo, AudioReadError> {
    let tagged_file = lofty::read_from_path(path).map_err(|e| unreadable(path, e))?;
    let props = tagged_file.properties();

    let missing = |field| AudioReadError::MissingProperty {
        path: path.display().to_string(),
        field,
    };
    let sample_rate = props.sample_rate().ok_or_else(|| missing("sample rate"))?;
    let channels = props.channels().ok_or_else(|| missing("channel count"))?;

    Ok(AudioInfo {
        channels: channels as u16,
        sample_rate,
        frames: None,
        duration_secs: props.duration().as_secs_f64(),
    })
}
