//! End-to-end tests for the luma crates.
//!
//! Directory in, directory out: fixtures are written to a temp directory,
//! decoded with `luma-io`, converted through the orchestrator and read back.
//! The CPU backend runs everywhere; the wgpu variants skip without a device.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use luma_core::{rgba_to_gray, GrayImage, RgbaImage};
    use luma_gpu::{
        BatchReport, ComputeBackend, Converter, ConverterConfig, CpuBackend, ImageError,
        ImageResult, SourceImage, WgpuBackend,
    };
    use tempfile::tempdir;

    fn write_rgba_png(path: &Path, image: &RgbaImage) {
        let file = fs::File::create(path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(image.data()).unwrap();
        writer.finish().unwrap();
    }

    fn read_gray_png(path: &Path) -> (u32, u32, Vec<u8>) {
        let decoder = png::Decoder::new(std::io::BufReader::new(fs::File::open(path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size().unwrap()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!(info.color_type, png::ColorType::Grayscale);
        buf.truncate(info.buffer_size());
        (info.width, info.height, buf)
    }

    /// Same wiring as `luma convert`.
    fn convert_dir<B: ComputeBackend>(backend: B, input: &Path, output: &Path) -> BatchReport {
        let converter = Converter::new(backend);
        let sources = luma_io::scan_dir(input).unwrap().into_iter().map(|path| {
            let image = luma_io::read(&path).map_err(|e| ImageError::Decode(e.to_string()));
            SourceImage::new(path, image)
        });
        let mut sink = |source: &Path, image: &GrayImage| -> ImageResult<PathBuf> {
            let out = luma_io::output_path(source, output)
                .map_err(|e| ImageError::Encode(e.to_string()))?;
            luma_io::write(&out, image).map_err(|e| ImageError::Encode(e.to_string()))?;
            Ok(out)
        };
        converter.run_batch(sources, &mut sink)
    }

    fn pattern(width: u32, height: u32, seed: u8) -> RgbaImage {
        let data = (0..width * height)
            .flat_map(|i| {
                let v = (i as u8).wrapping_mul(seed);
                [v, v.wrapping_add(85), v.wrapping_add(170), 255]
            })
            .collect();
        RgbaImage::new(width, height, data).unwrap()
    }

    #[test]
    fn test_red_2x2_end_to_end() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let red = RgbaImage::filled(2, 2, [255, 0, 0, 255]).unwrap();
        write_rgba_png(&input.path().join("red.png"), &red);

        let report = convert_dir(CpuBackend::new(), input.path(), output.path());
        assert!(report.is_clean());
        assert_eq!(report.succeeded(), 1);

        let (w, h, pixels) = read_gray_png(&output.path().join("red.png"));
        assert_eq!((w, h), (2, 2));
        assert_eq!(pixels, vec![76; 4]);
    }

    #[test]
    fn test_one_corrupt_file_is_isolated() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        let images: Vec<(String, RgbaImage)> = (1..=4)
            .map(|i| (format!("frame_{i}.png"), pattern(7 * i, 3 + i, i as u8 * 17)))
            .collect();
        for (name, image) in &images {
            write_rgba_png(&input.path().join(name), image);
        }
        fs::write(input.path().join("frame_2b.png"), b"\x89PNG\r\n\x1a\nnot really").unwrap();
        fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

        let report = convert_dir(CpuBackend::new(), input.path(), output.path());
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped[0].path, input.path().join("frame_2b.png"));
        assert_eq!(report.skipped[0].error.kind(), "DecodeError");

        for (name, image) in &images {
            let (w, h, pixels) = read_gray_png(&output.path().join(name));
            assert_eq!((w, h), (image.width(), image.height()));
            assert_eq!(pixels, rgba_to_gray(image).into_raw(), "{name}");
        }
        assert!(!output.path().join("frame_2b.png").exists());
        assert!(!output.path().join("notes.txt").exists());
    }

    #[test]
    fn test_jpeg_input_keeps_name() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        let gray = GrayImage::new(8, 8, vec![120; 64]).unwrap();
        luma_io::write(input.path().join("photo.jpg"), &gray).unwrap();

        let report = convert_dir(CpuBackend::new(), input.path(), output.path());
        assert!(report.is_clean());

        let out = output.path().join("photo.jpg");
        let back = luma_io::read(&out).unwrap();
        assert_eq!((back.width(), back.height()), (8, 8));
        let [r, _, _, a] = back.pixel(4, 4).unwrap();
        assert!(r.abs_diff(120) <= 3);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_empty_directory() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let report = convert_dir(CpuBackend::new(), input.path(), output.path());
        assert_eq!(report.total(), 0);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_gpu_matches_cpu_end_to_end() {
        if luma_gpu::list_devices().is_empty() {
            println!("No compute device, skipping");
            return;
        }
        let backend = match WgpuBackend::new(&ConverterConfig::default()) {
            Ok(backend) => backend,
            Err(e) => {
                println!("Device unavailable ({e}), skipping");
                return;
            }
        };

        let input = tempdir().unwrap();
        let gpu_out = tempdir().unwrap();
        let cpu_out = tempdir().unwrap();
        for (i, (w, h)) in [(17, 5), (1, 1), (64, 33)].into_iter().enumerate() {
            write_rgba_png(&input.path().join(format!("{i}.png")), &pattern(w, h, 31));
        }

        let gpu = convert_dir(backend, input.path(), gpu_out.path());
        let cpu = convert_dir(CpuBackend::new(), input.path(), cpu_out.path());
        assert!(gpu.is_clean() && cpu.is_clean());

        for i in 0..3 {
            let name = format!("{i}.png");
            assert_eq!(
                read_gray_png(&gpu_out.path().join(&name)),
                read_gray_png(&cpu_out.path().join(&name))
            );
        }
    }
}
