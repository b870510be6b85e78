// Ingest module
// Turns files on disk into raw text for the chunker

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw text extracted from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub text: String,
    /// Pages that contributed text (1 for plain-text files)
    pub pages: usize,
    /// Pages whose text could not be extracted
    pub skipped_pages: usize,
}

impl LoadedDocument {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Load every file in `paths`, skipping the ones that cannot be read at all
#[inline]
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Vec<LoadedDocument> {
    let documents: Vec<LoadedDocument> = paths
        .iter()
        .filter_map(|path| match load_document(path.as_ref()) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Error reading {}: {:#}", path.as_ref().display(), e);
                None
            }
        })
        .collect();

    info!(
        "Loaded {} of {} documents ({} characters)",
        documents.len(),
        paths.len(),
        documents.iter().map(|d| d.text.len()).sum::<usize>()
    );

    documents
}

/// Load a single file; PDFs are extracted page by page, anything else is read as UTF-8
#[inline]
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    if is_pdf(path) {
        load_pdf(path)
    } else {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {}", path.display()))?;
        Ok(LoadedDocument {
            path: path.to_path_buf(),
            text,
            pages: 1,
            skipped_pages: 0,
        })
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn load_pdf(path: &Path) -> Result<LoadedDocument> {
    let pdf = lopdf::Document::load(path)
        .with_context(|| format!("Failed to open PDF: {}", path.display()))?;

    let mut text = String::new();
    let mut pages = 0;
    let mut skipped_pages = 0;

    for page_number in pdf.get_pages().into_keys() {
        match pdf.extract_text(&[page_number]) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                text.push_str(&page_text);
                text.push('\n');
                pages += 1;
            }
            Ok(_) => {
                debug!("Page {} of {} has no text", page_number, path.display());
            }
            Err(e) => {
                warn!(
                    "Skipping page {} of {}: {}",
                    page_number,
                    path.display(),
                    e
                );
                skipped_pages += 1;
            }
        }
    }

    debug!(
        "Extracted {} characters from {} pages of {}",
        text.len(),
        pages,
        path.display()
    );

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        text,
        pages,
        skipped_pages,
    })
}
