use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{PipelineError, Result},
    keying::ChromaKeyCompositor,
    pipeline::cancel::CancelSignal,
    pipeline::driver::{drive, DriveReport, PipelineState},
    video::{ClipMetadata, FfmpegBackend, FrameSource, MediaBackend, StagedFrames, StagingDir},
};

/// Inputs and outputs of one compositing run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Background clip and audio donor
    pub reference: PathBuf,

    /// Greenscreen clip
    pub filmed: PathBuf,

    /// Assembled video without audio
    pub output: PathBuf,

    /// Video with the reference audio attached; derived from `output` if unset
    pub muxed: Option<PathBuf>,
}

impl RunRequest {
    pub fn new<P: Into<PathBuf>>(reference: P, filmed: P, output: P) -> Self {
        Self {
            reference: reference.into(),
            filmed: filmed.into(),
            output: output.into(),
            muxed: None,
        }
    }

    pub fn muxed_path(&self) -> PathBuf {
        self.muxed
            .clone()
            .unwrap_or_else(|| default_muxed_path(&self.output))
    }
}

/// `output.avi` -> `output.mp4`; an `.mp4` output gets an `_audio` suffix instead
pub fn default_muxed_path(output: &Path) -> PathBuf {
    let candidate = output.with_extension("mp4");
    if candidate != output {
        return candidate;
    }

    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output.with_file_name(format!("{}_audio.mp4", stem))
}

/// What a run left behind
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// `Complete` or `Cancelled`
    pub state: PipelineState,

    /// Number of frames written to the staging directory
    pub frames_staged: u64,

    /// Where the staged frames are
    pub staging_dir: PathBuf,

    /// Assembled video, if finalization ran
    pub video: Option<PathBuf>,

    /// Video with audio, if the reference had an audio track
    pub muxed: Option<PathBuf>,
}

/// Orchestrates a full greenscreen replacement run
///
/// The engine follows a fixed pipeline:
/// 1. Open both clips
/// 2. Extract the reference audio
/// 3. Composite and stage frame pairs until a clip runs out or the user cancels
/// 4. Encode the staged frames and attach the audio (skipped on cancel)
pub struct ChromaKeyEngine {
    config: Config,
    backend: Arc<dyn MediaBackend>,
}

impl ChromaKeyEngine {
    /// Create an engine backed by the ffmpeg executables
    pub fn new(config: Config) -> Self {
        let backend = FfmpegBackend::new(config.video.clone(), config.audio.clone());
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn MediaBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline for `request`
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: Box<dyn CancelSignal>,
    ) -> Result<RunOutcome> {
        info!("Starting greenscreen composition");
        info!("   Reference: {:?}", request.reference);
        info!("   Filmed: {:?}", request.filmed);
        info!("   Output: {:?}", request.output);

        self.config.validate()?;
        self.backend.check_available()?;
        debug!("Using {} media backend", self.backend.name());

        // Step 1: both clips must open before anything touches the disk
        let (filmed, reference) = self.open_sources(request).await?;
        let reference_meta = reference.metadata().clone();

        // Step 2: reference audio
        let audio = self.extract_audio(request, &reference_meta).await?;

        // Step 3: frame loop
        let staging = StagingDir::create(
            &self.config.staging.directory,
            reference_meta.index_width(),
            &self.config.staging.extension,
        )?;
        let staging_dir = staging.dir().to_path_buf();
        let (report, staged) = self
            .stage_frames(filmed, reference, staging, cancel, &reference_meta)
            .await?;

        let mut outcome = RunOutcome {
            state: report.state,
            frames_staged: report.frames,
            staging_dir,
            video: None,
            muxed: None,
        };

        if !report.state.needs_finalize() {
            warn!(
                "Run cancelled after {} frames; staged frames left in {:?}, no video assembled",
                report.frames, outcome.staging_dir
            );
            return Ok(outcome);
        }

        // Step 4: assemble output
        let (video, muxed) = self
            .finalize(request, staged, reference_meta.frame_rate, audio)
            .await?;
        outcome.state = PipelineState::Complete;
        outcome.video = Some(video);
        outcome.muxed = muxed;

        info!(
            "Composition complete: {} frames -> {:?}",
            outcome.frames_staged, request.output
        );
        Ok(outcome)
    }

    async fn open_sources(
        &self,
        request: &RunRequest,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn FrameSource>)> {
        let backend = Arc::clone(&self.backend);
        let filmed_path = request.filmed.clone();
        let reference_path = request.reference.clone();

        blocking(move || {
            let filmed = backend.open_clip(&filmed_path)?;
            let reference = backend.open_clip(&reference_path)?;
            Ok((filmed, reference))
        })
        .await
    }

    async fn extract_audio(
        &self,
        request: &RunRequest,
        reference_meta: &ClipMetadata,
    ) -> Result<Option<PathBuf>> {
        if !reference_meta.has_audio {
            warn!(
                "Reference {:?} has no audio track; output will be silent",
                request.reference
            );
            return Ok(None);
        }

        let backend = Arc::clone(&self.backend);
        let source = request.reference.clone();
        let artifact = self.config.audio.artifact.clone();

        blocking(move || {
            backend.extract_audio(&source, &artifact)?;
            Ok(Some(artifact))
        })
        .await
    }

    async fn stage_frames(
        &self,
        mut filmed: Box<dyn FrameSource>,
        mut reference: Box<dyn FrameSource>,
        mut staging: StagingDir,
        mut cancel: Box<dyn CancelSignal>,
        reference_meta: &ClipMetadata,
    ) -> Result<(DriveReport, StagedFrames)> {
        let compositor = ChromaKeyCompositor::new(self.config.keying.clone());
        let poll_wait = self.config.pipeline.poll_wait(reference_meta.frame_rate);
        debug!("Polling for cancel every {:?}", poll_wait);

        blocking(move || {
            let report = drive(
                &compositor,
                filmed.as_mut(),
                reference.as_mut(),
                &mut staging,
                cancel.as_mut(),
                poll_wait,
            );
            // Both sources are closed whatever the loop returned.
            let closed = filmed.close().and(reference.close());
            let report = report?;
            closed?;
            Ok((report, staging.staged()))
        })
        .await
    }

    async fn finalize(
        &self,
        request: &RunRequest,
        staged: StagedFrames,
        frame_rate: f64,
        audio: Option<PathBuf>,
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        if staged.count == 0 {
            return Err(PipelineError::NothingToFinalize.into());
        }

        let backend = Arc::clone(&self.backend);
        let output = request.output.clone();
        {
            let output = output.clone();
            blocking(move || backend.encode(&staged, frame_rate, &output)).await?;
        }

        let Some(audio) = audio else {
            return Ok((output, None));
        };

        let backend = Arc::clone(&self.backend);
        let muxed = request.muxed_path();
        {
            let (video, audio, muxed) = (output.clone(), audio.clone(), muxed.clone());
            blocking(move || backend.attach_audio(&video, &audio, &muxed)).await?;
        }

        tokio::fs::remove_file(&audio).await?;
        debug!("Removed audio artifact {:?}", audio);

        Ok((output, Some(muxed)))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Join {
            reason: e.to_string(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompositorError, StagingError, VideoError};
    use crate::keying::KeyParams;
    use crate::pipeline::cancel::{InterruptSignal, NeverCancel};
    use crate::video::{Frame, MemoryClip};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct Released {
        closed: AtomicBool,
        dropped: AtomicBool,
    }

    /// Memory clip that reports when it is closed or dropped
    struct TrackedClip {
        inner: MemoryClip,
        released: Arc<Released>,
    }

    impl FrameSource for TrackedClip {
        fn metadata(&self) -> &ClipMetadata {
            self.inner.metadata()
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            self.inner.next_frame()
        }

        fn close(&mut self) -> Result<()> {
            self.released.closed.store(true, Ordering::SeqCst);
            self.inner.close()
        }
    }

    impl Drop for TrackedClip {
        fn drop(&mut self) {
            self.released.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// Backend serving in-memory clips and recording container operations
    #[derive(Default)]
    struct FakeBackend {
        clips: HashMap<PathBuf, (Vec<Frame>, bool)>,
        calls: Mutex<Vec<String>>,
        opened: Mutex<HashMap<PathBuf, Arc<Released>>>,
    }

    impl FakeBackend {
        fn with_clip(mut self, path: &str, frames: Vec<Frame>, has_audio: bool) -> Self {
            self.clips.insert(PathBuf::from(path), (frames, has_audio));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        /// `(closed, dropped)` for a clip opened during the run
        fn released(&self, path: &str) -> (bool, bool) {
            let opened = self.opened.lock().unwrap();
            let released = opened.get(Path::new(path)).expect("clip was never opened");
            (
                released.closed.load(Ordering::SeqCst),
                released.dropped.load(Ordering::SeqCst),
            )
        }
    }

    impl MediaBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn check_available(&self) -> Result<()> {
            Ok(())
        }

        fn open_clip(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
            let (frames, has_audio) =
                self.clips
                    .get(path)
                    .cloned()
                    .ok_or_else(|| VideoError::SourceUnavailable {
                        path: path.display().to_string(),
                        reason: "unknown clip".to_string(),
                    })?;
            let released = Arc::new(Released::default());
            self.opened
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), Arc::clone(&released));
            Ok(Box::new(TrackedClip {
                inner: MemoryClip::new(frames, 25.0).with_audio(has_audio),
                released,
            }))
        }

        fn extract_audio(&self, source: &Path, artifact: &Path) -> Result<()> {
            std::fs::write(artifact, b"mp3")?;
            self.record(format!("extract {}", source.display()));
            Ok(())
        }

        fn encode(&self, frames: &StagedFrames, frame_rate: f64, output: &Path) -> Result<()> {
            std::fs::write(output, b"video")?;
            self.record(format!("encode {} @ {}", frames.count, frame_rate));
            Ok(())
        }

        fn attach_audio(&self, _video: &Path, _audio: &Path, muxed: &Path) -> Result<()> {
            std::fs::write(muxed, b"muxed")?;
            self.record(format!("attach {}", muxed.display()));
            Ok(())
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.keying = KeyParams {
            resolution: (2, 2),
            ..KeyParams::default()
        };
        config.staging.directory = dir.path().join("img_stream");
        config.audio.artifact = dir.path().join("ref_audio.mp3");
        config.pipeline.poll_wait_ms = Some(0);
        config
    }

    fn frames(count: usize, color: [u8; 3]) -> Vec<Frame> {
        vec![Frame::new_filled(2, 2, color); count]
    }

    fn request(dir: &TempDir) -> RunRequest {
        RunRequest::new(
            PathBuf::from("reference.mp4"),
            PathBuf::from("filmed.mp4"),
            dir.path().join("output.avi"),
        )
    }

    fn staged_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("img_stream")).unwrap().count()
    }

    #[tokio::test]
    async fn test_full_run_finalizes_with_audio() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default()
                .with_clip("filmed.mp4", frames(12, [0, 255, 0]), false)
                .with_clip("reference.mp4", frames(12, [0, 0, 255]), true),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let outcome = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap();

        assert_eq!(outcome.state, PipelineState::Complete);
        assert_eq!(outcome.frames_staged, 12);
        assert_eq!(outcome.video, Some(dir.path().join("output.avi")));
        assert_eq!(outcome.muxed, Some(dir.path().join("output.mp4")));
        assert_eq!(backend.released("filmed.mp4"), (true, true));
        assert_eq!(backend.released("reference.mp4"), (true, true));
        assert_eq!(staged_files(&dir), 12);
        // Reference has 12 frames, so names are two digits wide.
        assert!(dir.path().join("img_stream/11.png").exists());
        assert!(!dir.path().join("ref_audio.mp3").exists());

        let staged = image::open(dir.path().join("img_stream/00.png")).unwrap().to_rgb8();
        assert_eq!(Frame::new(staged), Frame::new_filled(2, 2, [0, 0, 255]));

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("extract reference.mp4"));
        assert_eq!(calls[1], "encode 12 @ 25");
        assert!(calls[2].starts_with("attach"));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_finalize() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default()
                .with_clip("filmed.mp4", frames(8, [0, 255, 0]), false)
                .with_clip("reference.mp4", frames(8, [0, 0, 255]), true),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let (trigger, signal) = InterruptSignal::channel();
        trigger.cancel();

        let outcome = engine.run(&request(&dir), Box::new(signal)).await.unwrap();

        assert_eq!(outcome.state, PipelineState::Cancelled);
        assert_eq!(outcome.frames_staged, 1);
        assert_eq!(outcome.video, None);
        assert_eq!(staged_files(&dir), 1);
        assert!(!dir.path().join("output.avi").exists());
        // The artifact is only removed after a successful finalize.
        assert!(dir.path().join("ref_audio.mp3").exists());
        assert_eq!(backend.calls().len(), 1);

        assert_eq!(backend.released("filmed.mp4"), (true, true));
        assert_eq!(backend.released("reference.mp4"), (true, true));
    }

    #[tokio::test]
    async fn test_staging_failure_releases_both_clips() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default()
                .with_clip("filmed.mp4", frames(3, [0, 255, 0]), false)
                .with_clip("reference.mp4", frames(3, [0, 0, 255]), false),
        );
        // A directory squatting on the first frame's name makes the write fail.
        std::fs::create_dir_all(dir.path().join("img_stream/0.png")).unwrap();
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let err = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CompositorError::Staging(StagingError::WriteFailed { .. })
        ));
        assert!(backend.calls().is_empty());
        assert_eq!(backend.released("filmed.mp4"), (true, true));
        assert_eq!(backend.released("reference.mp4"), (true, true));
    }

    #[tokio::test]
    async fn test_reference_open_failure_releases_filmed_clip() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default().with_clip("filmed.mp4", frames(3, [0, 255, 0]), false),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let err = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CompositorError::Video(VideoError::SourceUnavailable { .. })
        ));
        let (_, dropped) = backend.released("filmed.mp4");
        assert!(dropped);
        assert!(!dir.path().join("img_stream").exists());
    }

    #[tokio::test]
    async fn test_unavailable_source_aborts_before_work() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default().with_clip("reference.mp4", frames(3, [0, 0, 255]), true),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let err = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CompositorError::Video(VideoError::SourceUnavailable { .. })
        ));
        assert!(backend.calls().is_empty());
        assert!(!dir.path().join("img_stream").exists());
    }

    #[tokio::test]
    async fn test_silent_reference_skips_audio() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default()
                .with_clip("filmed.mp4", frames(5, [200, 30, 30]), false)
                .with_clip("reference.mp4", frames(3, [0, 0, 255]), false),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend.clone());

        let outcome = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap();

        assert_eq!(outcome.state, PipelineState::Complete);
        assert_eq!(outcome.frames_staged, 3);
        assert_eq!(outcome.muxed, None);
        assert_eq!(backend.calls(), vec!["encode 3 @ 25".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_clip_has_nothing_to_finalize() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::default()
                .with_clip("filmed.mp4", Vec::new(), false)
                .with_clip("reference.mp4", frames(3, [0, 0, 255]), false),
        );
        let engine = ChromaKeyEngine::with_backend(test_config(&dir), backend);

        let err = engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Pipeline(PipelineError::NothingToFinalize)
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.keying.kernel_size = (0, 0);
        let engine = ChromaKeyEngine::with_backend(config, Arc::new(FakeBackend::default()));

        assert!(engine
            .run(&request(&dir), Box::new(NeverCancel))
            .await
            .is_err());
    }

    #[test]
    fn test_default_muxed_path() {
        assert_eq!(default_muxed_path(Path::new("output.avi")), PathBuf::from("output.mp4"));
        assert_eq!(
            default_muxed_path(Path::new("out/final.mp4")),
            PathBuf::from("out/final_audio.mp4")
        );

        let mut request = RunRequest::new("a.mp4", "b.mp4", "c.avi");
        request.muxed = Some(PathBuf::from("custom.mkv"));
        assert_eq!(request.muxed_path(), PathBuf::from("custom.mkv"));
    }

    #[test]
    fn test_poll_wait_default_tracks_reference_rate() {
        let config = Config::default();
        assert_eq!(config.pipeline.poll_wait(25.0), Duration::from_millis(25));
    }
}
