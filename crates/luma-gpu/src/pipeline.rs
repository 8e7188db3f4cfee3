//! Per-image pipeline orchestrator.
//!
//! Each image walks
//! `Pending -> Loaded -> InputStaged -> OutputAllocated -> Dispatched -> Retrieved -> Saved`.
//! A failure at any step ends that image only: its buffers drop with the
//! stack frame, the failure is recorded with the last state reached, and the
//! batch moves on.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use luma_core::{GrayImage, RgbaImage};

use crate::backend::ComputeBackend;
use crate::{ImageError, ImageResult};

/// Progress of one image through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    /// Not yet decoded.
    Pending,
    Loaded,
    InputStaged,
    OutputAllocated,
    Dispatched,
    Retrieved,
    Saved,
}

/// One entry handed over by the decoder.
#[derive(Debug)]
pub struct SourceImage {
    pub path: PathBuf,
    /// Decoded pixels, or the decode failure.
    pub image: ImageResult<RgbaImage>,
}

impl SourceImage {
    pub fn new(path: impl Into<PathBuf>, image: ImageResult<RgbaImage>) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }
}

/// Receives converted images (the encoder side).
pub trait ImageSink {
    /// Persist `image` converted from `source`; returns where it went.
    fn save(&mut self, source: &Path, image: &GrayImage) -> ImageResult<PathBuf>;
}

impl<F> ImageSink for F
where
    F: FnMut(&Path, &GrayImage) -> ImageResult<PathBuf>,
{
    fn save(&mut self, source: &Path, image: &GrayImage) -> ImageResult<PathBuf> {
        self(source, image)
    }
}

/// A successfully converted image.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// An image the batch skipped.
#[derive(Debug)]
pub struct SkippedImage {
    pub path: PathBuf,
    /// Last state reached before the failure.
    pub state: PipelineState,
    pub error: ImageError,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<ConvertedImage>,
    pub skipped: Vec<SkippedImage>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.converted.len()
    }

    pub fn failed(&self) -> usize {
        self.skipped.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// True when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {} converted, {} skipped",
            self.succeeded(),
            self.failed()
        )?;
        for skip in &self.skipped {
            write!(
                f,
                "\n  {}: {} after {:?}: {}",
                skip.path.display(),
                skip.error.kind(),
                skip.state,
                skip.error
            )?;
        }
        Ok(())
    }
}

/// Runs images through a [`ComputeBackend`] one at a time.
pub struct Converter<B: ComputeBackend> {
    backend: B,
}

impl<B: ComputeBackend> Converter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Convert one decoded image.
    pub fn process_image(&self, image: &RgbaImage) -> ImageResult<GrayImage> {
        let mut state = PipelineState::Loaded;
        self.convert(image, &mut state)
    }

    /// Stage, dispatch and retrieve. `state` tracks the last step that
    /// completed; both buffers are released when this returns.
    fn convert(&self, image: &RgbaImage, state: &mut PipelineState) -> ImageResult<GrayImage> {
        let (width, height) = (image.width(), image.height());

        let input = self.backend.stage_input(image)?;
        *state = PipelineState::InputStaged;
        trace!(width, height, "input staged");

        let mut output = self.backend.stage_output(width, height)?;
        *state = PipelineState::OutputAllocated;

        self.backend.dispatch(&input, &mut output, width, height)?;
        *state = PipelineState::Dispatched;

        let pixels = self.backend.retrieve(&output, width, height)?;
        *state = PipelineState::Retrieved;
        trace!(width, height, "output retrieved");

        drop(output);
        drop(input);

        Ok(GrayImage::new(width, height, pixels)?)
    }

    fn process_source(
        &self,
        source: SourceImage,
        sink: &mut impl ImageSink,
        state: &mut PipelineState,
    ) -> ImageResult<PathBuf> {
        let image = source.image?;
        *state = PipelineState::Loaded;

        let gray = self.convert(&image, state)?;
        let output = sink.save(&source.path, &gray)?;
        *state = PipelineState::Saved;
        Ok(output)
    }

    /// Convert every source, isolating per-image failures.
    pub fn run_batch<I, S>(&self, sources: I, sink: &mut S) -> BatchReport
    where
        I: IntoIterator<Item = SourceImage>,
        S: ImageSink,
    {
        let mut report = BatchReport::default();
        info!(backend = self.backend.name(), "Starting batch");

        for source in sources {
            let path = source.path.clone();
            let mut state = PipelineState::Pending;

            match self.process_source(source, sink, &mut state) {
                Ok(output) => {
                    debug!(input = %path.display(), output = %output.display(), "Converted");
                    report.converted.push(ConvertedImage { source: path, output });
                }
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        kind = error.kind(),
                        state = ?state,
                        error = %error,
                        "Skipping image"
                    );
                    report.skipped.push(SkippedImage { path, state, error });
                }
            }
        }

        info!(
            success = report.succeeded(),
            failed = report.failed(),
            "Batch processing complete"
        );
        report
    }
}
