use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::paths::get_tesseract_dir;

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

/// Standard install locations of the UB-Mannheim Windows build.
const COMMON_INSTALL_DIRS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];

#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract use its compiled-in default.
    pub tessdata: Option<PathBuf>,
}

/// Locates Tesseract: explicit override first, then the app-local dir,
/// then PATH, then the common install locations.
pub fn locate_tesseract(override_path: Option<&Path>) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(override_path)?;
    let tessdata = find_tessdata_dir(&executable);
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable.
pub fn find_tesseract_executable(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "Configured tesseract_path does not exist: {}",
            path.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in &COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join(TESSERACT_EXE);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR (https://github.com/UB-Mannheim/tesseract/releases), \
         add it to PATH, or set tesseract_path in config.json"
    ))
}

/// Finds a directory containing `eng.traineddata`, if any.
pub fn find_tessdata_dir(executable: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    // Next to the executable (portable installs)
    if let Some(parent) = executable.parent() {
        candidates.push(parent.join("tessdata"));
    }
    candidates.push(get_tesseract_dir().join("tessdata"));

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates.extend(COMMON_INSTALL_DIRS.iter().map(|d| Path::new(d).join("tessdata")));

    candidates
        .into_iter()
        .find(|dir| dir.join("eng.traineddata").exists())
}
