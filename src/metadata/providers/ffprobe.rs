//! Technical probe provider backed by `ffprobe`.
//!
//! Contributes container, duration and stream details as extension fields.
//! It never names anything, so it only applies to items that point at a
//! concrete media file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelname_common::{MediaKind, ProviderError, ProviderKind, Result};
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderOptions;
use crate::metadata::provider::{Capabilities, LookupRequest, MetadataProvider, EXTRA_PATH};
use crate::metadata::record::MediaMetadata;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// ffprobe-backed technical probe.
#[derive(Debug, Default)]
pub struct FfprobeProvider {
    binary: Option<PathBuf>,
}

impl FfprobeProvider {
    pub fn new() -> Self {
        Self { binary: None }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    async fn probe(
        &self,
        binary: &Path,
        path: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<FfprobeOutput, ProviderError> {
        debug!(path = %path.display(), "Running ffprobe");

        let mut command = Command::new(binary);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            output = command.output() => {
                output.map_err(|e| ProviderError::tool("ffprobe", e.to_string()))?
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::tool(
                "ffprobe",
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::Parse(format!("invalid ffprobe output: {e}")))
    }
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
    }
    rate_str.parse().ok()
}

fn into_metadata(output: FfprobeOutput) -> MediaMetadata {
    let mut meta = MediaMetadata::default();
    let ext = &mut meta.extensions;

    ext.insert("container".into(), output.format.format_name);
    if let Some(secs) = output
        .format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
    {
        ext.insert("duration".into(), format!("{}", secs.round() as u64));
    }

    let video = output.streams.iter().find(|s| s.codec_type == "video");
    if let Some(v) = video {
        if let Some(codec) = &v.codec_name {
            ext.insert("video_codec".into(), codec.clone());
        }
        if let (Some(w), Some(h)) = (v.width, v.height) {
            ext.insert("resolution".into(), format!("{w}x{h}"));
        }
        if let Some(fps) = v.r_frame_rate.as_deref().and_then(parse_frame_rate) {
            ext.insert("frame_rate".into(), format!("{fps:.3}"));
        }
    }

    let audio = output.streams.iter().find(|s| s.codec_type == "audio");
    if let Some(a) = audio {
        if let Some(codec) = &a.codec_name {
            ext.insert("audio_codec".into(), codec.clone());
        }
        if let Some(ch) = a.channels {
            ext.insert("audio_channels".into(), ch.to_string());
        }
        meta.language = a.tags.language.clone().filter(|l| l != "und");
    }

    meta.with_source("ffprobe", "ffprobe")
}

#[async_trait]
impl MetadataProvider for FfprobeProvider {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Probe
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<()> {
        self.binary = if !options.enabled {
            None
        } else {
            options
                .binary
                .clone()
                .or_else(|| which::which("ffprobe").ok())
        };
        if options.enabled && self.binary.is_none() {
            debug!("ffprobe not found on PATH; probe provider disabled");
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            media_kinds: &[MediaKind::Movie, MediaKind::Episode],
        }
    }

    async fn fetch(
        &self,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<MediaMetadata>, ProviderError> {
        let Some(binary) = &self.binary else {
            return Ok(None);
        };
        let Some(path) = request.extra(EXTRA_PATH).map(Path::new) else {
            return Ok(None);
        };

        let file = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::not_found(format!("{} does not exist", path.display())));
            }
            Err(e) => return Err(ProviderError::tool("ffprobe", e.to_string())),
        };
        if file.is_dir() {
            return Ok(None);
        }

        let output = self.probe(binary, path, cancel).await?;
        Ok(Some(into_metadata(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"{
        "streams": [
            { "index": 0, "codec_type": "video", "codec_name": "hevc",
              "width": 3840, "height": 2160, "r_frame_rate": "24000/1001" },
            { "index": 1, "codec_type": "audio", "codec_name": "eac3",
              "channels": 6, "tags": { "language": "eng" } },
            { "index": 2, "codec_type": "subtitle", "codec_name": "subrip" }
        ],
        "format": { "filename": "movie.mkv", "format_name": "matroska,webm",
                    "duration": "8880.512000", "size": "1000" }
    }"#;

    fn request(path: Option<&Path>) -> LookupRequest {
        let mut extra = HashMap::new();
        if let Some(p) = path {
            extra.insert(EXTRA_PATH.to_string(), p.to_string_lossy().into_owned());
        }
        LookupRequest {
            media_kind: MediaKind::Movie,
            name: "Movie".into(),
            year: None,
            season: None,
            episode: None,
            extra,
        }
    }

    #[test]
    fn parses_probe_output() {
        let output: FfprobeOutput = serde_json::from_str(SAMPLE).unwrap();
        let meta = into_metadata(output);

        assert_eq!(meta.extensions["container"], "matroska,webm");
        assert_eq!(meta.extensions["duration"], "8881");
        assert_eq!(meta.extensions["video_codec"], "hevc");
        assert_eq!(meta.extensions["resolution"], "3840x2160");
        assert_eq!(meta.extensions["frame_rate"], "23.976");
        assert_eq!(meta.extensions["audio_codec"], "eac3");
        assert_eq!(meta.extensions["audio_channels"], "6");
        assert_eq!(meta.language.as_deref(), Some("eng"));
        assert_eq!(meta.title, None);
        assert_eq!(meta.sources["ffprobe"], "ffprobe");
    }

    #[test]
    fn frame_rates() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("1/0"), None);
    }

    #[test]
    fn disabled_provider_is_unavailable() {
        let mut provider = FfprobeProvider::new();
        provider
            .configure(&ProviderOptions {
                enabled: false,
                binary: Some("/usr/bin/ffprobe".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(!provider.is_available());

        provider
            .configure(&ProviderOptions {
                enabled: true,
                binary: Some("/opt/ffprobe".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(provider.is_available());
        assert!(!provider.capabilities().supports(MediaKind::Show));
    }

    #[tokio::test]
    async fn directories_and_missing_paths() {
        let provider = FfprobeProvider::with_binary("/nonexistent/ffprobe");
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();

        assert!(provider.fetch(&request(None), &cancel).await.unwrap().is_none());
        assert!(provider
            .fetch(&request(Some(dir.path())), &cancel)
            .await
            .unwrap()
            .is_none());

        let missing = dir.path().join("gone.mkv");
        let result = provider.fetch(&request(Some(&missing)), &cancel).await;
        assert_matches!(result, Err(ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_tool_error() {
        let provider = FfprobeProvider::with_binary("/nonexistent/ffprobe");
        let file = tempfile::NamedTempFile::new().unwrap();

        let result = provider
            .fetch(&request(Some(file.path())), &CancellationToken::new())
            .await;
        assert_matches!(result, Err(ProviderError::Tool { .. }));
    }
}
