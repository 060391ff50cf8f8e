use serde::{Deserialize, Serialize};

/// A caller-supplied document, one string of text per page.
///
/// `contents` is treated as the authoritative page sequence, `pages` is carried
/// through as metadata and never checked against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    pub file_size: u64,
    pub pages: usize,
    pub contents: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, contents: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            created_at: String::new(),
            file_size: contents.iter().map(|c| c.len() as u64).sum(),
            pages: contents.len(),
            contents,
        }
    }

    /// True when there is no page with any non-whitespace text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(|page| page.trim().is_empty())
    }

    /// Builds a document from raw PDF bytes, one entry in `contents` per page.
    #[cfg(feature = "pdf")]
    pub fn from_pdf(
        id: impl Into<String>,
        title: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, pdf_extract::OutputError> {
        let contents = pdf_extract::extract_text_from_mem_by_pages(bytes)?;
        let mut document = Self::new(id, title, contents);
        document.file_size = bytes.len() as u64;
        Ok(document)
    }
}

/// A contiguous slice of one page's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    /// 1-based page number the text was taken from.
    pub page: usize,
    /// Offset of the first character of `text` within the page, in characters.
    pub start_offset: usize,
}

impl Fragment {
    pub fn new(text: impl Into<String>, page: usize, start_offset: usize) -> Self {
        Self {
            text: text.into(),
            page,
            start_offset,
        }
    }

    /// Length of the fragment in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
