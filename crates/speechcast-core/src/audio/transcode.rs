//! Transcoding through an external ffmpeg process

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::wav::PcmSpec;
use crate::error::{Error, Result};

/// Target container for [`Transcoder::transcode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Wav,
    Mp3,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Wav => "wav",
            TargetFormat::Mp3 => "mp3",
        }
    }

    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            TargetFormat::Wav => &["-f", "wav", "-acodec", "pcm_s16le"],
            TargetFormat::Mp3 => &["-f", "mp3", "-codec:a", "libmp3lame", "-qscale:a", "2"],
        }
    }
}

/// Converts raw s16le PCM by piping it through ffmpeg
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    spec: PcmSpec,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder {
    pub fn new(ffmpeg: impl AsRef<Path>) -> Self {
        Self {
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
            spec: PcmSpec::default(),
        }
    }

    /// Shape of the PCM handed to ffmpeg
    pub fn with_spec(mut self, spec: PcmSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Re-encode PCM as WAV through ffmpeg.
    ///
    /// Library API for callers that want ffmpeg's container output. The
    /// server frames WAV itself with [`super::wav::wrap_pcm`] and only
    /// shells out for MP3.
    pub async fn pcm_to_wav(&self, pcm: &[u8]) -> Result<Vec<u8>> {
        self.transcode(pcm, TargetFormat::Wav).await
    }

    pub async fn pcm_to_mp3(&self, pcm: &[u8]) -> Result<Vec<u8>> {
        self.transcode(pcm, TargetFormat::Mp3).await
    }

    pub async fn transcode(&self, pcm: &[u8], target: TargetFormat) -> Result<Vec<u8>> {
        let args = self.args(target);
        debug!("Running {} {}", self.ffmpeg.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::TranscodeError(format!(
                    "Failed to start {}: {}",
                    self.ffmpeg.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::TranscodeError("ffmpeg stdin unavailable".to_string()))?;
        let input = pcm.to_vec();
        let feeder = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::TranscodeError(format!("ffmpeg did not finish: {}", e)))?;

        match feeder.await {
            Ok(Err(e)) => warn!("Writing PCM to ffmpeg failed: {}", e),
            Err(e) => warn!("ffmpeg feeder task failed: {}", e),
            Ok(Ok(())) => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::TranscodeError(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        debug!(
            "Transcoded {} PCM bytes to {} {} bytes",
            pcm.len(),
            output.stdout.len(),
            target.extension()
        );
        Ok(output.stdout)
    }

    fn args(&self, target: TargetFormat) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-f".into(),
            format!("s{}le", self.spec.bits_per_sample()),
            "-ar".into(),
            self.spec.sample_rate.to_string(),
            "-ac".into(),
            self.spec.channels.to_string(),
            "-i".into(),
            "pipe:0".into(),
        ];
        args.extend(target.codec_args().iter().map(|s| s.to_string()));
        args.push("pipe:1".into());
        args
    }
}
