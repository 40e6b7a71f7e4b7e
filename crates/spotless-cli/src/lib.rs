//! Helpers shared by the `spotless` binary: tracing setup, reading files from
//! disk into a selection, and rendering reports.

use anyhow::Context;
use spotless_core::models::{PhotoCategory, SelectedFile};
use spotless_worker::PipelineReport;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "warn,spotless=info";

/// Initialize tracing for the CLI. Logs go to stderr; `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(Format::default().compact().with_target(false))
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// MIME type from the file extension, empty when unknown.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "dng" => "image/x-adobe-dng",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "",
    }
}

/// Read `paths` into a selection, in order.
pub async fn load_selection(paths: &[PathBuf]) -> anyhow::Result<Vec<SelectedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        files.push(SelectedFile::new(name, content_type_for(path), data));
    }
    Ok(files)
}

pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

/// Human-readable lines for a finished submission.
pub fn render_report(report: &PipelineReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Uploaded {} of {} files",
        report.result.uploaded_count, report.result.total_count
    )];

    for category in PhotoCategory::ALL {
        if let Some(batch) = report.per_category.get(&category) {
            lines.push(format!(
                "  {:<10} {}/{}",
                category.as_str(),
                batch.uploaded_count,
                batch.total_count
            ));
        }
    }

    for (category, skipped) in &report.skipped {
        for file in skipped {
            lines.push(format!(
                "Skipped {} ({}): {}",
                truncate_string(&file.name, 48),
                category,
                file.reason
            ));
        }
    }

    for category in &report.no_compatible_files {
        lines.push(format!("No compatible files selected for {}", category));
    }

    for advisory in &report.advisories {
        lines.push(format!("Note: {} {}", advisory.name, advisory.message));
    }

    if let Some(summary) = report.summary_error() {
        lines.push(summary.to_string());
    }

    lines
}
