//! The compose pipeline: validate inputs, compute geometry, render the
//! background, merge the source page and write `{label}.pdf`.
//!
//! Any failure aborts the run and leaves no output file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::config::{load_source_pdf, load_top_text, LayoutConfig};
use crate::error::{ComposeError, IoResultExt, Result};
use crate::layout::{geometry_for, Geometry};
use crate::pdf::{compose_pages, render_background, BackgroundStats, SourceDocument};
use crate::sanitize::output_file_name;

/// Inputs of one compose run
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub source_pdf: PathBuf,
    pub text_file: PathBuf,
    pub label: String,
    /// Defaults to the source PDF's directory
    pub out_dir: Option<PathBuf>,
}

/// What a successful run produced
#[derive(Debug, Clone, Serialize)]
pub struct ComposeReport {
    pub output_path: PathBuf,
    pub geometry: Geometry,
    pub text_lines_drawn: usize,
    pub text_lines_dropped: usize,
}

/// A finished page held in memory
pub struct ComposedPage {
    pub bytes: Vec<u8>,
    pub geometry: Geometry,
    pub stats: BackgroundStats,
}

/// Build the final page from an already loaded source document.
pub fn compose_page(
    source: &SourceDocument,
    top_text: &str,
    label: &str,
    config: &LayoutConfig,
) -> Result<ComposedPage> {
    let geometry = geometry_for(source, config);
    debug!(
        "Geometry: scale {:.4}, placed {:.2}x{:.2} at ({:.2}, {:.2}), label at ({:.2}, {:.2})",
        geometry.scale,
        geometry.placed_width,
        geometry.placed_height,
        geometry.origin_x,
        geometry.origin_y,
        geometry.label_anchor_x,
        geometry.label_anchor_y
    );

    let background = render_background(top_text, label, &geometry, config)?;
    let bytes = compose_pages(&background.bytes, source, &geometry)?;

    Ok(ComposedPage {
        bytes,
        geometry,
        stats: background.stats,
    })
}

/// Compose with the fixed A4 layout and write `{out_dir}/{sanitize(label)}.pdf`.
pub fn compose_final_pdf(
    source_pdf: &Path,
    text_file: &Path,
    label: &str,
    out_dir: Option<&Path>,
) -> Result<ComposeReport> {
    let request = ComposeRequest {
        source_pdf: source_pdf.to_path_buf(),
        text_file: text_file.to_path_buf(),
        label: label.to_string(),
        out_dir: out_dir.map(Path::to_path_buf),
    };
    compose_with_config(&request, &LayoutConfig::default())
}

pub fn compose_with_config(request: &ComposeRequest, config: &LayoutConfig) -> Result<ComposeReport> {
    let out_dir = validate_request(request)?;
    config.validate()?;

    info!("Loading source PDF {:?}...", request.source_pdf);
    let source = SourceDocument::load_mem(&load_source_pdf(&request.source_pdf)?)?;
    let top_text = load_top_text(&request.text_file)?;
    let label = request.label.trim();

    info!("Composing page for label {:?}...", label);
    let page = compose_page(&source, &top_text, label, config)?;
    if page.stats.lines_dropped > 0 {
        info!(
            "Top text overflowed: {} line(s) did not fit and were dropped",
            page.stats.lines_dropped
        );
    }

    let output_path = out_dir.join(output_file_name(label));
    write_atomically(&output_path, &page.bytes)?;
    info!("Saved {:?}", output_path);

    Ok(ComposeReport {
        output_path,
        geometry: page.geometry,
        text_lines_drawn: page.stats.lines_drawn,
        text_lines_dropped: page.stats.lines_dropped,
    })
}

/// Check the request before anything is read or rendered; returns the
/// output directory to use.
fn validate_request(request: &ComposeRequest) -> Result<PathBuf> {
    if !request.source_pdf.is_file() {
        return Err(ComposeError::validation(format!(
            "Source PDF not found: {:?}",
            request.source_pdf
        )));
    }
    if !request.text_file.is_file() {
        return Err(ComposeError::validation(format!(
            "Text file not found: {:?}",
            request.text_file
        )));
    }
    if request.label.trim().is_empty() {
        return Err(ComposeError::validation("Label must not be empty"));
    }

    let out_dir = match &request.out_dir {
        Some(dir) => dir.clone(),
        None => default_out_dir(&request.source_pdf),
    };
    if !out_dir.is_dir() {
        return Err(ComposeError::validation(format!(
            "Output directory not found: {:?}",
            out_dir
        )));
    }
    Ok(out_dir)
}

fn default_out_dir(source_pdf: &Path) -> PathBuf {
    match source_pdf.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write through a temporary file in the same directory, then rename, so a
/// failed write never leaves a partial file at `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .io_context(|| format!("Failed to create temporary file in {:?}", dir))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .io_context(|| format!("Failed to write {:?}", tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .io_context(|| format!("Failed to save {:?}", path))?;
    Ok(())
}
