//! Orchestrator tests: buffer lifetime, failure isolation, output shape.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use luma_core::{rgba_to_gray, GrayImage, RgbaImage};
use luma_gpu::{
    ComputeBackend, Converter, CpuBackend, CpuBuffer, ImageError, ImageResult, PipelineState,
    SourceImage,
};

/// Stage at which the tracking backend should fail.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FailAt {
    Never,
    StageInput,
    StageOutput,
    Dispatch,
    Retrieve,
}

/// Buffer that decrements the live counter when dropped.
struct TrackedBuffer {
    inner: CpuBuffer,
    live: Rc<Cell<usize>>,
}

impl Drop for TrackedBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// CPU backend wrapper that counts live buffers and injects failures for
/// images of a given width.
struct TrackingBackend {
    cpu: CpuBackend,
    live: Rc<Cell<usize>>,
    peak: Cell<usize>,
    fail_at: FailAt,
    fail_width: u32,
}

impl TrackingBackend {
    fn new(fail_at: FailAt, fail_width: u32) -> Self {
        Self {
            cpu: CpuBackend::new(),
            live: Rc::new(Cell::new(0)),
            peak: Cell::new(0),
            fail_at,
            fail_width,
        }
    }

    fn track(&self, inner: CpuBuffer) -> TrackedBuffer {
        self.live.set(self.live.get() + 1);
        self.peak.set(self.peak.get().max(self.live.get()));
        TrackedBuffer {
            inner,
            live: Rc::clone(&self.live),
        }
    }

    fn fails(&self, stage: FailAt, width: u32) -> bool {
        self.fail_at == stage && width == self.fail_width
    }
}

impl ComputeBackend for TrackingBackend {
    type Buffer = TrackedBuffer;

    fn name(&self) -> &str {
        "tracking"
    }

    fn stage_input(&self, image: &RgbaImage) -> ImageResult<TrackedBuffer> {
        if self.fails(FailAt::StageInput, image.width()) {
            return Err(ImageError::Alloc("injected".into()));
        }
        Ok(self.track(self.cpu.stage_input(image)?))
    }

    fn stage_output(&self, width: u32, height: u32) -> ImageResult<TrackedBuffer> {
        if self.fails(FailAt::StageOutput, width) {
            return Err(ImageError::Alloc("injected".into()));
        }
        Ok(self.track(self.cpu.stage_output(width, height)?))
    }

    fn dispatch(
        &self,
        input: &TrackedBuffer,
        output: &mut TrackedBuffer,
        width: u32,
        height: u32,
    ) -> ImageResult<()> {
        if self.fails(FailAt::Dispatch, width) {
            return Err(ImageError::Dispatch("injected".into()));
        }
        self.cpu.dispatch(&input.inner, &mut output.inner, width, height)
    }

    fn retrieve(&self, output: &TrackedBuffer, width: u32, height: u32) -> ImageResult<Vec<u8>> {
        if self.fails(FailAt::Retrieve, width) {
            return Err(ImageError::Read("injected".into()));
        }
        self.cpu.retrieve(&output.inner, width, height)
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    let data = (0..width * height)
        .flat_map(|i| {
            let v = (i % 256) as u8;
            [v, v.wrapping_mul(3), 255 - v, 255]
        })
        .collect();
    RgbaImage::new(width, height, data).unwrap()
}

fn sources(widths: &[u32]) -> Vec<SourceImage> {
    widths
        .iter()
        .map(|&w| SourceImage::new(format!("img_{w}.png"), Ok(gradient(w, 3))))
        .collect()
}

fn path_sink(path: &Path, _: &GrayImage) -> ImageResult<PathBuf> {
    Ok(Path::new("out").join(path))
}

#[test]
fn test_red_2x2_is_76() {
    let converter = Converter::new(CpuBackend::new());
    let red = RgbaImage::filled(2, 2, [255, 0, 0, 255]).unwrap();
    let gray = converter.process_image(&red).unwrap();
    assert_eq!((gray.width(), gray.height()), (2, 2));
    assert_eq!(gray.data(), &[76; 4]);
}

#[test]
fn test_output_dimensions_match_input() {
    let converter = Converter::new(CpuBackend::new());
    for (w, h) in [(17, 5), (1, 1), (1920, 1081)] {
        let gray = converter.process_image(&gradient(w, h)).unwrap();
        assert_eq!((gray.width(), gray.height()), (w, h));
        assert_eq!(gray.data().len(), (w * h) as usize);
    }
}

#[test]
fn test_matches_host_reference() {
    let converter = Converter::new(CpuBackend::new());
    let image = gradient(33, 9);
    let gray = converter.process_image(&image).unwrap();
    assert_eq!(gray, rgba_to_gray(&image));
}

#[test]
fn test_gray_is_fixed_point() {
    let converter = Converter::new(CpuBackend::new());
    let data = (0..=255u8)
        .flat_map(|v| [v, v, v, 255 - v])
        .collect();
    let image = RgbaImage::new(256, 1, data).unwrap();
    let gray = converter.process_image(&image).unwrap();
    let expected: Vec<u8> = (0..=255).collect();
    assert_eq!(gray.data(), expected.as_slice());
}

#[test]
fn test_buffers_released_after_success() {
    let backend = TrackingBackend::new(FailAt::Never, 0);
    let converter = Converter::new(backend);
    let report = converter.run_batch(sources(&[4, 5, 6]), &mut path_sink);

    assert_eq!(report.succeeded(), 3);
    assert_eq!(converter.backend().live.get(), 0);
    assert_eq!(converter.backend().peak.get(), 2);
}

#[test]
fn test_buffers_released_on_every_failure_stage() {
    let cases = [
        (FailAt::StageInput, PipelineState::Loaded),
        (FailAt::StageOutput, PipelineState::InputStaged),
        (FailAt::Dispatch, PipelineState::OutputAllocated),
        (FailAt::Retrieve, PipelineState::Dispatched),
    ];

    for (fail_at, expected_state) in cases {
        let converter = Converter::new(TrackingBackend::new(fail_at, 5));
        let report = converter.run_batch(sources(&[4, 5, 6]), &mut path_sink);

        assert_eq!(report.succeeded(), 2, "{fail_at:?}");
        assert_eq!(report.failed(), 1, "{fail_at:?}");
        let skipped = &report.skipped[0];
        assert_eq!(skipped.path, PathBuf::from("img_5.png"));
        assert_eq!(skipped.state, expected_state, "{fail_at:?}");
        assert_eq!(converter.backend().live.get(), 0, "leak after {fail_at:?}");
    }
}

#[test]
fn test_failure_does_not_affect_neighbours() {
    let converter = Converter::new(TrackingBackend::new(FailAt::Dispatch, 5));
    let mut saved: Vec<(PathBuf, GrayImage)> = Vec::new();
    let mut sink = |path: &Path, image: &GrayImage| -> ImageResult<PathBuf> {
        saved.push((path.to_path_buf(), image.clone()));
        Ok(path.to_path_buf())
    };
    let report = converter.run_batch(sources(&[4, 5, 6]), &mut sink);
    assert_eq!(report.failed(), 1);

    let names: Vec<_> = saved.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(names, vec![PathBuf::from("img_4.png"), PathBuf::from("img_6.png")]);
    for (path, gray) in &saved {
        let w = if path.ends_with("img_4.png") { 4 } else { 6 };
        assert_eq!(gray, &rgba_to_gray(&gradient(w, 3)));
    }
}

#[test]
fn test_batch_of_n_with_one_corrupt() {
    let converter = Converter::new(CpuBackend::new());
    let mut input = sources(&[2, 3, 4, 5]);
    input.insert(2, SourceImage::new("broken.png", Err(ImageError::Decode("bad".into()))));

    let report = converter.run_batch(input, &mut path_sink);
    assert_eq!(report.total(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.skipped[0].error.kind(), "DecodeError");
    assert_eq!(report.skipped[0].state, PipelineState::Pending);
}

#[test]
fn test_empty_batch() {
    let converter = Converter::new(CpuBackend::new());
    let report = converter.run_batch(Vec::<SourceImage>::new(), &mut path_sink);
    assert_eq!(report.total(), 0);
    assert!(report.is_clean());
}
