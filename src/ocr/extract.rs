use anyhow::Result;
use image::GrayImage;
use regex::Regex;

use super::engine::TextRecognizer;

/// The chat command the game expects, without the code.
pub const COMMAND_PREFIX: &str = "/verify";

/// Pattern for the verification command: slash, optional whitespace, the
/// keyword, any non-digit filler, then 3 or 4 digits.
///
/// The keyword's `i` also accepts `1`: glyph normalisation turns a
/// recognised `I` or `l` into `1`, and that must not break the keyword.
const VERIFY_PATTERN: &str = r"(?i)/\s*ver[i1]fy\D*?(\d{3,4})";

/// Output of one recognition pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Full OCR text after glyph normalisation, kept for diagnostics.
    pub raw_text: String,
    /// The 3-4 digit code, when the command was found.
    pub code: Option<String>,
}

/// Maps characters Tesseract commonly confuses with digits to those digits.
///
/// Applied to the whole string; characters outside the table pass through.
pub fn normalize_glyphs(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'I' | 'l' | '|' => '1',
            'S' => '5',
            'B' => '8',
            'Z' => '2',
            other => other,
        })
        .collect()
}

/// Builds the reply typed into chat for `code`.
pub fn build_command(code: &str) -> String {
    format!("{} {}", COMMAND_PREFIX, code)
}

/// Finds the verification code in normalised OCR text.
pub struct CodeMatcher {
    regex: Regex,
}

impl CodeMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(VERIFY_PATTERN)?,
        })
    }

    /// Returns the digits of the first command in `text`.
    pub fn find_code(&self, text: &str) -> Option<String> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Normalises raw OCR output and looks for a code in it.
    pub fn parse(&self, ocr_text: &str) -> RecognitionResult {
        let raw_text = normalize_glyphs(ocr_text);
        let code = self.find_code(&raw_text);
        RecognitionResult { raw_text, code }
    }

    /// Runs OCR over a preprocessed image and extracts the code.
    pub fn extract(
        &self,
        recognizer: &dyn TextRecognizer,
        binary: &GrayImage,
    ) -> Result<RecognitionResult> {
        let text = recognizer.recognize(binary)?;
        Ok(self.parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _img: &GrayImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenEngine;

    impl TextRecognizer for BrokenEngine {
        fn recognize(&self, _img: &GrayImage) -> Result<String> {
            Err(anyhow!("engine unavailable"))
        }
    }

    fn matcher() -> CodeMatcher {
        CodeMatcher::new().unwrap()
    }

    #[test]
    fn test_find_code_with_and_without_space() {
        let m = matcher();
        assert_eq!(m.find_code("/verify 1234"), Some("1234".to_string()));
        assert_eq!(m.find_code("/verify123"), Some("123".to_string()));
        assert_eq!(m.find_code("/ verify 0420"), Some("0420".to_string()));
        assert_eq!(m.find_code("/VERIFY 987"), Some("987".to_string()));
    }

    #[test]
    fn test_find_code_skips_filler_before_digits() {
        let m = matcher();
        assert_eq!(m.find_code("/verify: #5521"), Some("5521".to_string()));
        assert_eq!(m.find_code("[Server] type /verify -- 321 now"), Some("321".to_string()));
    }

    #[test]
    fn test_find_code_requires_three_digits() {
        let m = matcher();
        assert_eq!(m.find_code("/verify 12"), None);
        assert_eq!(m.find_code("/verify"), None);
        assert_eq!(m.find_code("1234"), None);
    }

    #[test]
    fn test_find_code_takes_first_four_of_longer_run() {
        assert_eq!(matcher().find_code("/verify 123456"), Some("1234".to_string()));
    }

    #[test]
    fn test_find_code_returns_first_match() {
        assert_eq!(
            matcher().find_code("/verify 111 /verify 2222"),
            Some("111".to_string())
        );
    }

    #[test]
    fn test_every_code_length_round_trips_through_command() {
        let m = matcher();
        let codes = (0..=999)
            .map(|n| format!("{:03}", n))
            .chain((0..=9999).map(|n| format!("{:04}", n)));

        for code in codes {
            let expected = Some(code.clone());
            assert_eq!(m.find_code(&build_command(&code)), expected);
            assert_eq!(m.parse(&build_command(&code)).code, expected);
            assert_eq!(m.find_code(&format!("{}{}", COMMAND_PREFIX, code)), expected);
            assert_eq!(
                m.find_code(&format!("{} ~~{}", COMMAND_PREFIX, code)),
                expected
            );
        }
    }

    #[test]
    fn test_normalize_glyphs_table() {
        assert_eq!(normalize_glyphs("OoIl|SBZ"), "00111582");
        assert_eq!(normalize_glyphs("/verify 12"), "/verify 12");
    }

    #[test]
    fn test_normalize_glyphs_is_idempotent() {
        let samples = ["OoIl|SBZ", "/VERIFY S4O2", "/uer1fy O123", "plain text", ""];
        for s in samples {
            let once = normalize_glyphs(s);
            assert_eq!(normalize_glyphs(&once), once);
        }
    }

    #[test]
    fn test_uppercase_keyword_survives_normalisation() {
        // "VERIFY" normalises to "VER1FY"
        let result = matcher().parse("/VERIFY 4O2O");
        assert_eq!(result.raw_text, "/VER1FY 4020");
        assert_eq!(result.code, Some("4020".to_string()));
    }

    #[test]
    fn test_malformed_keyword_is_not_corrected() {
        let result = matcher().parse("/uer1fy O123");
        assert_eq!(result.raw_text, "/uer1fy 0123");
        assert_eq!(result.code, None);
    }

    #[test]
    fn test_confused_digit_is_recovered() {
        let result = matcher().parse("/verify  S482");
        assert_eq!(result.raw_text, "/verify  5482");
        assert_eq!(result.code, Some("5482".to_string()));
    }

    #[test]
    fn test_extract_keeps_raw_text_without_match() {
        let img = GrayImage::new(2, 2);
        let result = matcher()
            .extract(&FixedText("hello world\n"), &img)
            .unwrap();
        assert_eq!(result.raw_text, "he110 w0r1d\n");
        assert_eq!(result.code, None);
    }

    #[test]
    fn test_extract_propagates_engine_error() {
        let img = GrayImage::new(2, 2);
        assert!(matcher().extract(&BrokenEngine, &img).is_err());
    }
}
