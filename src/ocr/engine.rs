use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;

/// Characters Tesseract is allowed to emit: the command keyword in both
/// cases, the slash and the digits.
pub const CHAR_WHITELIST: &str = "/verifyVERIFY0123456789";

/// Turns a preprocessed image into text.
pub trait TextRecognizer: Send {
    fn recognize(&self, img: &GrayImage) -> Result<String>;
}

/// Runs the Tesseract executable once per image.
pub struct TesseractCli {
    paths: TesseractPaths,
    timeout: Option<Duration>,
}

impl TesseractCli {
    /// `timeout` bounds each Tesseract run; `None` waits forever.
    pub fn new(paths: TesseractPaths, timeout: Option<Duration>) -> Self {
        Self { paths, timeout }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, img: &GrayImage) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let mut command = Command::new(&self.paths.executable);
        command.args(tesseract_args(temp_input.path(), self.paths.tessdata.as_deref()));
        hide_console_window(&mut command);

        let output = run_with_timeout(command, self.timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Builds the command line: stdout output, LSTM engine, single uniform
/// block of text, English model, restricted character set.
fn tesseract_args(input: &Path, tessdata: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];

    if let Some(dir) = tessdata {
        args.push("--tessdata-dir".into());
        args.push(dir.into());
    }

    args.extend(
        [
            "-l",
            "eng",
            "--oem",
            "3",
            "--psm",
            "6",
            "-c",
        ]
        .map(OsString::from),
    );
    args.push(format!("tessedit_char_whitelist={}", CHAR_WHITELIST).into());
    args
}

#[cfg(windows)]
fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut Command) {}

/// Runs `command` to completion, killing it if it outlives `timeout`.
///
/// Both pipes are read on their own threads while the child runs, so a
/// child that writes more than the pipe buffer never stalls on a write.
fn run_with_timeout(mut command: Command, timeout: Option<Duration>) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().context("Failed to start Tesseract")?;
    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());

    let status = match timeout {
        Some(timeout) => {
            let start = Instant::now();
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers are left detached: a grandchild may still hold the pipes
                    return Err(anyhow!(
                        "Tesseract timed out after {}ms",
                        timeout.as_millis()
                    ));
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
        None => child.wait()?,
    };

    Ok(Output {
        status,
        stdout: join_pipe(stdout)?,
        stderr: join_pipe(stderr)?,
    })
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_pipe(reader: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| anyhow!("Tesseract output reader panicked"))?
        .context("Failed to read Tesseract output")
}
