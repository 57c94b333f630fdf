//! Access to PDF structure and page text.
//!
//! The extractor only needs a table of contents and per-page text, so both
//! live behind [`PdfSource`]. [`LopdfLoader`] is the production backend;
//! tests plug in in-memory documents through [`DocumentLoader`].

use crate::error::RankingError;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use lopdf::{decode_text_string, Destination, Document, ObjectId, Outline};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// One native table-of-contents entry: (level, title, page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u32,
    pub title: String,
    /// 1-based target page, 0 when the bookmark could not be resolved.
    pub page: u32,
}

impl TocEntry {
    pub fn new(level: u32, title: impl Into<String>, page: u32) -> Self {
        TocEntry {
            level,
            title: title.into(),
            page,
        }
    }
}

pub trait PdfSource {
    /// Native outline, empty when the document carries no bookmarks.
    fn toc(&self) -> Vec<TocEntry>;

    fn page_count(&self) -> u32;

    /// Extracted text of a 1-based page.
    fn page_text(&self, page: u32) -> Result<String>;
}

pub trait DocumentLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfSource>>;
}

/// `lopdf` backed document
pub struct LopdfSource {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::load(path)
            .map_err(|e| RankingError::Pdf(format!("{}: {}", path.display(), e)))?;
        let pages = document.get_pages();
        debug!("Opened {:?} with {} pages", path, pages.len());
        Ok(LopdfSource { document, pages })
    }

    /// Flattens the bookmark tree in document order; nested bookmarks sit
    /// one level below their parent.
    fn collect_toc(
        &self,
        outlines: &[Outline],
        level: u32,
        page_numbers: &HashMap<ObjectId, u32>,
        entries: &mut Vec<TocEntry>,
    ) {
        for outline in outlines {
            match outline {
                Outline::Destination(destination) => {
                    let Some(title) = self.bookmark_title(destination) else {
                        debug!("Skipping bookmark with unreadable title");
                        continue;
                    };
                    // 0 marks a target that is not a page of this document
                    let page = destination
                        .page()
                        .and_then(|target| target.as_reference().ok())
                        .and_then(|id| page_numbers.get(&id).copied())
                        .unwrap_or(0);
                    entries.push(TocEntry::new(level, title, page));
                }
                Outline::SubOutlines(children) => {
                    self.collect_toc(children, level + 1, page_numbers, entries)
                }
            }
        }
    }

    fn bookmark_title(&self, destination: &Destination) -> Option<String> {
        let mut title = destination.title()?;
        if let Ok(id) = title.as_reference() {
            title = self.document.get_object(id).ok()?;
        }
        decode_text_string(title).ok()
    }
}

impl PdfSource for LopdfSource {
    fn toc(&self) -> Vec<TocEntry> {
        let mut named_destinations = IndexMap::new();
        let outlines = match self.document.get_outlines(None, None, &mut named_destinations) {
            Ok(Some(outlines)) => outlines,
            Ok(None) => return Vec::new(),
            Err(e) => {
                debug!("No usable outline: {}", e);
                return Vec::new();
            }
        };

        let page_numbers: HashMap<ObjectId, u32> =
            self.pages.iter().map(|(number, id)| (*id, *number)).collect();
        let mut entries = Vec::new();
        self.collect_toc(&outlines, 1, &page_numbers, &mut entries);
        entries
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        if !self.pages.contains_key(&page) {
            return Err(RankingError::Pdf(format!("page {} out of range", page)).into());
        }
        self.document
            .extract_text(&[page])
            .map_err(|e| RankingError::Pdf(e.to_string()))
            .with_context(|| format!("Failed to extract text of page {}", page))
    }
}

pub struct LopdfLoader;

impl DocumentLoader for LopdfLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfSource>> {
        Ok(Box::new(LopdfSource::open(path)?))
    }
}

/// Document held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPdf {
    pub toc: Vec<TocEntry>,
    pub pages: Vec<String>,
}

impl InMemoryPdf {
    pub fn new(toc: Vec<TocEntry>, pages: Vec<&str>) -> Self {
        InMemoryPdf {
            toc,
            pages: pages.into_iter().map(str::to_string).collect(),
        }
    }
}

impl PdfSource for InMemoryPdf {
    fn toc(&self) -> Vec<TocEntry> {
        self.toc.clone()
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .cloned()
            .ok_or_else(|| RankingError::Pdf(format!("page {} out of range", page)).into())
    }
}

/// Loader serving [`InMemoryPdf`] documents by file name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    documents: BTreeMap<String, InMemoryPdf>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, file_name: &str, document: InMemoryPdf) -> Self {
        self.documents.insert(file_name.to_string(), document);
        self
    }
}

impl DocumentLoader for InMemoryLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfSource>> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let document = self
            .documents
            .get(name)
            .cloned()
            .ok_or_else(|| RankingError::Pdf(format!("unknown document {:?}", path)))?;
        Ok(Box::new(document))
    }
}
