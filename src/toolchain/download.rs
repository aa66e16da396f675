//! Resumable HTTP downloads with progress reporting
//!
//! Downloads go to a `.part` file adjacent to the destination and resume via
//! HTTP Range requests. Stalled transfers hit a per-read idle timeout and are
//! retried with exponential back-off before reporting `DownloadFailed`.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::error::ToolchainKitError;
use crate::toolchain::provider::{ProgressCallback, ProgressInfo, ProgressPhase};

/// Seconds without any received bytes before a transfer counts as stalled
const IDLE_TIMEOUT_SECS: u64 = 30;

/// Maximum download attempts before giving up
const MAX_ATTEMPTS: u32 = 3;

/// Download `url` to `dest`, resuming a partial `.part` file if present
///
/// Progress frames are emitted at least once per second while bytes are
/// flowing. On success the `.part` file is renamed onto `dest`. The `.part`
/// file is intentionally left behind between retries so a later attempt can
/// resume; callers remove it when abandoning the download for good.
pub fn download_with_resume(
    url: &str,
    dest: &Path,
    expected_size: Option<u64>,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut part = dest.as_os_str().to_os_string();
    part.push(".part");
    let part_path = Path::new(&part).to_path_buf();

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(IDLE_TIMEOUT_SECS))
        .timeout_read(Duration::from_secs(IDLE_TIMEOUT_SECS))
        .build();

    let mut last_error: Option<anyhow::Error> = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let backoff = Duration::from_secs(1 << attempt);
            log::debug!(
                "Retrying download of {} in {:?} (attempt {}/{})",
                url,
                backoff,
                attempt + 1,
                MAX_ATTEMPTS
            );
            std::thread::sleep(backoff);
        }

        match try_download(&agent, url, &part_path, expected_size, progress) {
            Ok(()) => {
                std::fs::rename(&part_path, dest).with_context(|| {
                    format!("Failed to finalize download at {}", dest.display())
                })?;
                return Ok(());
            }
            Err(e) => {
                log::warn!("Download attempt {} failed: {}", attempt + 1, e);
                last_error = Some(e);
            }
        }
    }

    Err(ToolchainKitError::DownloadFailed {
        url: url.to_string(),
        message: format!("giving up after {} attempts", MAX_ATTEMPTS),
        source: last_error,
    }
    .into())
}

fn try_download(
    agent: &ureq::Agent,
    url: &str,
    part_path: &Path,
    expected_size: Option<u64>,
    progress: Option<ProgressCallback<'_>>,
) -> Result<()> {
    let offset = std::fs::metadata(part_path).map(|m| m.len()).unwrap_or(0);

    let mut request = agent.get(url);
    if offset > 0 {
        request = request.set("Range", &format!("bytes={}-", offset));
    }

    let response = request
        .call()
        .with_context(|| format!("GET {} failed", url))?;

    // A server that ignores the Range header restarts from the beginning
    let (mut file, mut received) = if offset > 0 && response.status() == 206 {
        let file = OpenOptions::new()
            .append(true)
            .open(part_path)
            .with_context(|| format!("Failed to reopen {}", part_path.display()))?;
        (file, offset)
    } else {
        let file = std::fs::File::create(part_path)
            .with_context(|| format!("Failed to create {}", part_path.display()))?;
        (file, 0)
    };

    let total = expected_size.or_else(|| {
        response
            .header("Content-Length")
            .and_then(|l| l.parse::<u64>().ok())
            .map(|len| len + if response.status() == 206 { offset } else { 0 })
    });

    let mut reader = response.into_reader();
    let mut buffer = [0u8; 64 * 1024];
    let started = Instant::now();
    let start_bytes = received;
    let mut last_emit = Instant::now();

    loop {
        let read = reader.read(&mut buffer).context("Read from remote failed")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .with_context(|| format!("Write to {} failed", part_path.display()))?;
        received += read as u64;

        if last_emit.elapsed() >= Duration::from_secs(1) {
            emit_download_frame(progress, received, total, started, start_bytes);
            last_emit = Instant::now();
        }
    }
    file.flush().context("Flush of download failed")?;

    // One final frame so short downloads still report completion of the phase
    emit_download_frame(progress, received, total, started, start_bytes);

    if let Some(expected) = total {
        if received < expected {
            anyhow::bail!(
                "Transfer ended early: {} of {} bytes received",
                received,
                expected
            );
        }
    }

    Ok(())
}

fn emit_download_frame(
    progress: Option<ProgressCallback<'_>>,
    bytes: u64,
    total: Option<u64>,
    started: Instant,
    start_bytes: u64,
) {
    let Some(cb) = progress else {
        return;
    };

    let elapsed = started.elapsed().as_secs_f64().max(0.001);
    let speed_bps = (bytes - start_bytes) as f64 / elapsed;
    let percentage = total
        .filter(|t| *t > 0)
        .map(|t| (bytes as f64 / t as f64 * 100.0).min(100.0))
        .unwrap_or(0.0);
    let eta_seconds = total.and_then(|t| {
        if speed_bps > 0.0 && t > bytes {
            Some(((t - bytes) as f64 / speed_bps) as u64)
        } else {
            None
        }
    });

    cb(&ProgressInfo {
        phase: ProgressPhase::Downloading,
        bytes,
        total,
        percentage,
        speed_bps,
        eta_seconds,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_url_reports_download_failed() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("artifact.tar.gz");

        let err = download_with_resume(
            "http://127.0.0.1:1/toolchain.tar.gz",
            &dest,
            Some(10),
            None,
        )
        .unwrap_err();

        let tk = err.downcast_ref::<ToolchainKitError>().unwrap();
        assert!(matches!(tk, ToolchainKitError::DownloadFailed { .. }));
        assert!(!dest.exists());
    }
}
