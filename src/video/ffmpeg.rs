use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, VideoError};
use crate::video::source::FrameSource;
use crate::video::types::{ClipMetadata, Frame};

/// Whether both `ffmpeg` and `ffprobe` can be executed
pub fn check_ffmpeg_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|binary| {
        Command::new(binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    })
}

/// Run ffmpeg to completion, returning its stderr on failure
pub fn run_ffmpeg(args: &[String]) -> std::result::Result<(), String> {
    debug!(?args, "Running ffmpeg");
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("FFmpeg execution failed: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("FFmpeg failed ({}): {}", output.status, stderr.trim()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read clip metadata with ffprobe
pub fn probe(path: &Path) -> Result<ClipMetadata> {
    let unavailable = |reason: String| VideoError::SourceUnavailable {
        path: path.display().to_string(),
        reason,
    };

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| unavailable(format!("ffprobe could not run: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(unavailable(format!("ffprobe failed: {}", stderr.trim())).into());
    }

    let json = String::from_utf8(output.stdout)
        .map_err(|_| unavailable("invalid ffprobe output".to_string()))?;
    parse_probe(&json).map_err(|reason| unavailable(reason).into())
}

/// Turn ffprobe JSON into clip metadata
fn parse_probe(json: &str) -> std::result::Result<ClipMetadata, String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.avg_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| "video stream has no frame rate".to_string())?;

    let duration = video
        .duration
        .as_deref()
        .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    let frame_count = match video.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let estimate = duration.map(|d| (d * frame_rate).round() as u64).unwrap_or(0);
            warn!("Container reports no frame count, estimated {} frames", estimate);
            estimate
        }
    };

    Ok(ClipMetadata {
        frame_count,
        frame_rate,
        width,
        height,
        has_audio,
    })
}

/// Parse an ffprobe rational such as `30000/1001`
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0 && value.is_finite()).then_some(value)
}

/// Clip decoded by an ffmpeg child process streaming raw RGB frames
pub struct FfmpegClip {
    path: PathBuf,
    metadata: ClipMetadata,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    decoded: u64,
}

impl FfmpegClip {
    /// Probe the clip and start decoding from its first frame
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = probe(path)?;

        let mut child = Command::new("ffmpeg")
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::SourceUnavailable {
                path: path.display().to_string(),
                reason: format!("failed to start ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take();
        // Drain stderr so a chatty decoder never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            })
        });

        let frame_len = metadata.width as usize * metadata.height as usize * 3;

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            child: Some(child),
            stdout,
            stderr_task,
            frame_len,
            decoded: 0,
        })
    }

    /// Stop the decoder and collect its diagnostics
    fn reap(&mut self, kill: bool) -> Option<String> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if kill {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        self.stderr_task.take().and_then(|task| task.join().ok())
    }
}

impl FrameSource for FfmpegClip {
    fn metadata(&self) -> &ClipMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut data = vec![0u8; self.frame_len];
        let filled = read_full(stdout, &mut data).map_err(|e| VideoError::DecodingFailed {
            reason: format!("{}: {}", self.path.display(), e),
        })?;

        if filled == 0 {
            debug!("{:?} exhausted after {} frames", self.path, self.decoded);
            if let Some(stderr) = self.reap(false).filter(|s| !s.trim().is_empty()) {
                warn!("ffmpeg reported while decoding {:?}: {}", self.path, stderr.trim());
            }
            return Ok(None);
        }

        if filled < self.frame_len {
            let stderr = self.reap(true).unwrap_or_default();
            return Err(VideoError::DecodingFailed {
                reason: format!(
                    "{}: truncated frame {} ({} of {} bytes) {}",
                    self.path.display(),
                    self.decoded,
                    filled,
                    self.frame_len,
                    stderr.trim()
                ),
            }
            .into());
        }

        self.decoded += 1;
        let frame = Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, data)
            .ok_or_else(|| VideoError::DecodingFailed {
                reason: "frame buffer size mismatch".to_string(),
            })?;
        Ok(Some(frame))
    }

    fn close(&mut self) -> Result<()> {
        self.reap(true);
        Ok(())
    }
}

impl Drop for FfmpegClip {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Raw RGB decode of the first video stream to stdout
///
/// Autorotation stays off so decoded frames keep the stored dimensions
/// ffprobe reported; otherwise rotated phone footage would arrive transposed.
fn decode_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
        "-noautorotate".to_string(),
        "-i".to_string(),
        path.display().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-".to_string(),
    ]
}

/// Fill `buf` as far as the reader allows; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "nb_frames": "250",
                "duration": "8.341667"
            },
            { "index": 1, "codec_type": "audio", "r_frame_rate": "0/0" }
        ],
        "format": { "duration": "8.400000" }
    }"#;

    #[test]
    fn test_parse_probe_reads_stream() {
        let meta = parse_probe(PROBE_JSON).unwrap();

        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert!((meta.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(meta.frame_count, 250);
        assert!(meta.has_audio);
    }

    #[test]
    fn test_parse_probe_estimates_missing_count() {
        let json = r#"{
            "streams": [
                { "codec_type": "video", "width": 640, "height": 360,
                  "r_frame_rate": "25/1" }
            ],
            "format": { "duration": "4.0" }
        }"#;
        let meta = parse_probe(json).unwrap();

        assert_eq!(meta.frame_count, 100);
        assert!(!meta.has_audio);
    }

    #[test]
    fn test_parse_probe_requires_video() {
        let json = r#"{ "streams": [ { "codec_type": "audio" } ] }"#;
        assert_eq!(parse_probe(json).unwrap_err(), "no video stream");
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25/1"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("24"), Some(24.0));
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_decode_keeps_stored_orientation() {
        let args = decode_args(Path::new("clips/phone.mov"));

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        // Input option, so it must precede -i.
        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], "clips/phone.mov");
        assert_eq!(args[pos("-pix_fmt") + 1], "rgb24");
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_read_full_reports_short_read() {
        let mut reader: &[u8] = &[1, 2, 3, 4, 5];
        let mut buf = [0u8; 3];

        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 0);
    }
}
