//! Extracts plain text from binary document formats, dispatching on extension.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("unsupported-format: {0}")]
  UnsupportedFormat(String),

  #[error("empty extraction result for {0}")]
  EmptyResult(String),

  #[error("pdf extraction failed: {0}")]
  Pdf(String),

  #[error("docx extraction failed: {0}")]
  Docx(String),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

/// Extract text from `path`'s content based on its extension.
///
/// `.pdf` requires the `pdf` feature; with it disabled (matching hosts that lack
/// the instruction set `pdf-extract`'s decoder needs), `.pdf` reports unsupported.
pub fn extract_document(path: &str, bytes: &[u8]) -> Result<String, ExtractError> {
  let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
  match ext.as_str() {
    "pdf" => extract_pdf(path, bytes),
    "docx" => extract_docx(path, bytes),
    other => Err(ExtractError::UnsupportedFormat(other.to_string())),
  }
}

#[cfg(feature = "pdf")]
fn extract_pdf(path: &str, bytes: &[u8]) -> Result<String, ExtractError> {
  let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Err(ExtractError::EmptyResult(path.to_string()));
  }
  Ok(trimmed.to_string())
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_path: &str, _bytes: &[u8]) -> Result<String, ExtractError> {
  Err(ExtractError::UnsupportedFormat("pdf".to_string()))
}

fn extract_docx(path: &str, bytes: &[u8]) -> Result<String, ExtractError> {
  let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractError::Docx(e.to_string()))?;
  let text = docx_plain_text(&docx);
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Err(ExtractError::EmptyResult(path.to_string()));
  }
  Ok(trimmed.to_string())
}

/// Walk the document body, concatenating run text and logging (not failing on)
/// anything that isn't a plain paragraph/run.
fn docx_plain_text(docx: &docx_rs::Docx) -> String {
  use docx_rs::DocumentChild;

  let mut out = String::new();
  for child in &docx.document.children {
    match child {
      DocumentChild::Paragraph(paragraph) => {
        for run_text in paragraph_run_text(paragraph) {
          out.push_str(&run_text);
        }
        out.push('\n');
      }
      DocumentChild::Table(_) => {
        tracing::warn!("docx extraction: skipping embedded table, text-only extraction");
      }
      _ => {
        tracing::debug!("docx extraction: skipping non-paragraph document child");
      }
    }
  }
  out
}

fn paragraph_run_text(paragraph: &docx_rs::Paragraph) -> Vec<String> {
  use docx_rs::ParagraphChild;

  paragraph
    .children
    .iter()
    .filter_map(|child| match child {
      ParagraphChild::Run(run) => Some(run_text(run)),
      _ => None,
    })
    .collect()
}

fn run_text(run: &docx_rs::Run) -> String {
  use docx_rs::RunChild;

  run
    .children
    .iter()
    .filter_map(|child| match child {
      RunChild::Text(t) => Some(t.text.clone()),
      _ => None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unsupported_extension_fails() {
    let result = extract_document("notes.rtf", b"anything");
    assert!(matches!(result, Err(ExtractError::UnsupportedFormat(_))));
  }

  #[test]
  #[cfg(not(feature = "pdf"))]
  fn pdf_reports_unsupported_without_feature() {
    let result = extract_document("report.pdf", b"%PDF-1.4");
    assert!(matches!(result, Err(ExtractError::UnsupportedFormat(ext)) if ext == "pdf"));
  }

  #[test]
  fn docx_without_valid_zip_fails() {
    let result = extract_document("notes.docx", b"not a zip file");
    assert!(result.is_err());
  }
}
