pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{TesseractCli, TextRecognizer};
pub use extract::{build_command, CodeMatcher, RecognitionResult};
pub use preprocess::preprocess;
pub use setup::locate_tesseract;

use anyhow::Result;
use image::RgbImage;

/// High-level function: captured region → recognition result.
///
/// Preprocesses the color image to black/white, runs OCR on it and
/// extracts the verification code.
pub fn recognize_code(
    img: &RgbImage,
    recognizer: &dyn TextRecognizer,
    matcher: &CodeMatcher,
) -> Result<RecognitionResult> {
    let binary = preprocess(img);
    matcher.extract(recognizer, &binary)
}
