// src/resume.rs
//! Resume text fed to the answer resolver.
//!
//! Turning a PDF into text is someone else's job; this module only owns
//! the boundary and a plain-text implementation for resumes already
//! exported as text.

use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Anything shorter than this is treated as a failed extraction.
const MIN_EXTRACTED_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read resume file: {0}")]
    Io(#[from] std::io::Error),
    #[error("document yielded only {0} characters of text")]
    TooLittleText(usize),
}

pub trait ResumeExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor for resumes already saved as plain text.
pub struct PlainTextExtractor;

impl ResumeExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        let chars = text.chars().count();
        if chars < MIN_EXTRACTED_CHARS {
            return Err(ExtractionError::TooLittleText(chars));
        }
        Ok(text)
    }
}

pub fn load_resume_text(
    path: &Path,
    extractor: &dyn ResumeExtractor,
) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let text = extractor.extract_text(&bytes)?;
    info!(
        "resume text loaded: {} characters from {}",
        text.chars().count(),
        path.display()
    );
    Ok(text)
}
