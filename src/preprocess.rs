// ABOUTME: Markdown preprocessing for the mdslides application
// ABOUTME: Pipes a slideshow body through the external command configured as preprocess_script

use crate::errors::{Result, SlidesError};
use log::debug;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Run `script` with `markdown` on stdin and return what it writes to stdout.
///
/// A non-zero exit status or output that is not UTF-8 is a `PreprocessError`.
pub fn run_preprocess_script(script: &Path, markdown: &str) -> Result<String> {
    let mut child = Command::new(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| preprocess_error(script, format!("failed to start: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| preprocess_error(script, "failed to capture stdin".to_string()))?;

    // Fed from another thread; the script may fill stdout before reading all input
    let input = markdown.to_string();
    let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

    let output = child.wait_with_output()?;

    match writer.join() {
        Ok(Ok(())) => {}
        // The script is free to stop reading early
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(preprocess_error(
                script,
                "writing to stdin panicked".to_string(),
            ))
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(preprocess_error(
            script,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let processed = String::from_utf8(output.stdout)
        .map_err(|e| preprocess_error(script, format!("output is not UTF-8: {}", e)))?;
    debug!(
        "Preprocessed {} bytes into {} bytes with {:?}",
        markdown.len(),
        processed.len(),
        script
    );
    Ok(processed)
}

fn preprocess_error(script: &Path, message: String) -> SlidesError {
    SlidesError::PreprocessError {
        script: script.to_path_buf(),
        message,
    }
}
