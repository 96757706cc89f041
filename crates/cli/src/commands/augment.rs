//! Augment command - Add a header extension to an SDP read from a file or stdin

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use loopcall_sdp_core::add_header_extension_with_report;
use tracing::{info, warn};

/// Execute augment command
pub fn execute(uri: &str, input: Option<&Path>) -> Result<()> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SDP from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read SDP from stdin")?;
            buf
        }
    };

    let output = augment_text(&raw, uri);

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write SDP to stdout")?;
    Ok(())
}

/// Normalize line endings, augment, and log what changed
fn augment_text(raw: &str, uri: &str) -> String {
    let sdp = normalize_line_endings(raw);
    let (output, report) = add_header_extension_with_report(&sdp, uri);

    if report.is_empty() {
        warn!("No audio or video section with extmap lines, SDP unchanged");
    }
    for added in &report {
        info!(
            "{} section: added extmap {} for {}{}",
            added.kind,
            added.assigned_id,
            uri,
            if added.allow_mixed_inserted {
                " (with a=extmap-allow-mixed)"
            } else {
                ""
            }
        );
    }
    output
}

/// Convert bare `\n` line endings to `\r\n`
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}
