//! One-shot OCR test with preview images.
//!
//! Captures the configured region once, saves what the OCR engine sees next
//! to the logs and reports the recognised text. Never types anything.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{capture, CaptureRegion, ScreenSource};
use crate::ocr::{preprocess, CodeMatcher, RecognitionResult, TextRecognizer};

/// Result of one OCR test.
#[derive(Debug)]
pub struct OcrTestReport {
    pub result: RecognitionResult,
    /// Raw capture as PNG
    pub capture_path: PathBuf,
    /// Black/white image handed to the OCR engine
    pub binary_path: PathBuf,
}

impl OcrTestReport {
    /// Lines for the application log.
    pub fn log_lines(&self) -> Vec<String> {
        let code_line = match &self.result.code {
            Some(code) => format!("Test OCR -> code found: {}", code),
            None => "Test OCR -> code NOT found.".to_string(),
        };
        vec![
            format!("Test OCR -> text: {}", self.result.raw_text.trim()),
            code_line,
            format!("Preview saved: {}", self.capture_path.display()),
            format!("Preview saved: {}", self.binary_path.display()),
        ]
    }
}

/// Captures `region`, writes both preview images to `debug_dir` and runs
/// recognition on the binary image.
pub fn run_ocr_test(
    screen: &mut dyn ScreenSource,
    recognizer: &dyn TextRecognizer,
    region: &CaptureRegion,
    debug_dir: &Path,
) -> Result<OcrTestReport> {
    let frame = capture(screen, region).context("Failed to capture region")?;
    let binary = preprocess(&frame);

    fs::create_dir_all(debug_dir)
        .with_context(|| format!("Failed to create {}", debug_dir.display()))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let capture_path = debug_dir.join(format!("ocr_test_{}_capture.png", stamp));
    let binary_path = debug_dir.join(format!("ocr_test_{}_binary.png", stamp));

    frame
        .save(&capture_path)
        .with_context(|| format!("Failed to save {}", capture_path.display()))?;
    binary
        .save(&binary_path)
        .with_context(|| format!("Failed to save {}", binary_path.display()))?;

    let result = CodeMatcher::new()?.extract(recognizer, &binary)?;

    Ok(OcrTestReport {
        result,
        capture_path,
        binary_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::{GrayImage, Rgb, RgbImage};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct StripedScreen;

    impl ScreenSource for StripedScreen {
        fn grab(&mut self, region: &CaptureRegion) -> Result<RgbImage> {
            Ok(RgbImage::from_fn(
                region.width as u32,
                region.height as u32,
                |x, _| if x % 8 < 4 { Rgb([250, 250, 250]) } else { Rgb([5, 5, 5]) },
            ))
        }
    }

    struct BrokenScreen;

    impl ScreenSource for BrokenScreen {
        fn grab(&mut self, _region: &CaptureRegion) -> Result<RgbImage> {
            Err(anyhow!("no desktop"))
        }
    }

    /// Remembers the size of the image it was given.
    struct SizeCheckingText {
        text: &'static str,
        seen: Mutex<Option<(u32, u32)>>,
    }

    impl SizeCheckingText {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                seen: Mutex::new(None),
            }
        }

        fn seen(&self) -> Option<(u32, u32)> {
            *self.seen.lock().unwrap()
        }
    }

    impl TextRecognizer for SizeCheckingText {
        fn recognize(&self, img: &GrayImage) -> Result<String> {
            *self.seen.lock().unwrap() = Some(img.dimensions());
            Ok(self.text.to_string())
        }
    }

    #[test]
    fn test_ocr_test_saves_previews_and_reports_code() {
        let dir = tempdir().unwrap();
        let recognizer = SizeCheckingText::new("/verify 7315\n");

        let report = run_ocr_test(
            &mut StripedScreen,
            &recognizer,
            &CaptureRegion::new(0, 0, 64, 24),
            &dir.path().join("debug"),
        )
        .unwrap();

        assert_eq!(report.result.code, Some("7315".to_string()));
        assert_eq!(recognizer.seen(), Some((64, 24)));
        assert!(report.capture_path.exists());
        assert!(report.binary_path.exists());

        let saved = image::open(&report.binary_path).unwrap().to_luma8();
        assert_eq!(saved.dimensions(), (64, 24));
        assert!(saved.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));

        let lines = report.log_lines();
        assert_eq!(lines[0], "Test OCR -> text: /verify 7315");
        assert_eq!(lines[1], "Test OCR -> code found: 7315");
    }

    #[test]
    fn test_ocr_test_reports_missing_code() {
        let dir = tempdir().unwrap();
        let recognizer = SizeCheckingText::new("just chatting");

        let report = run_ocr_test(
            &mut StripedScreen,
            &recognizer,
            &CaptureRegion::new(0, 0, 16, 16),
            dir.path(),
        )
        .unwrap();

        assert_eq!(report.log_lines()[1], "Test OCR -> code NOT found.");
    }

    #[test]
    fn test_ocr_test_capture_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let debug_dir = dir.path().join("debug");
        let recognizer = SizeCheckingText::new("");

        let result = run_ocr_test(
            &mut BrokenScreen,
            &recognizer,
            &CaptureRegion::new(0, 0, 16, 16),
            &debug_dir,
        );

        assert!(result.is_err());
        assert!(!debug_dir.exists());
        assert_eq!(recognizer.seen(), None);
    }
}
