use crate::models::{DocumentStructure, HeadingLevel, OutlineEntry, SectionSpan};
use crate::pdf_source::{PdfSource, TocEntry};
use anyhow::Result;
use tracing::{debug, warn};

/// Builds the outline of a document and the raw text of each entry.
///
/// A native table of contents is used when present; otherwise the whole
/// document becomes one synthetic `H1` entry named after the file. A
/// document without pages yields an empty structure.
pub fn extract_structure(
    source: &dyn PdfSource,
    file_name: &str,
    span: SectionSpan,
) -> Result<DocumentStructure> {
    let page_count = source.page_count();
    let mut structure = DocumentStructure {
        title: file_name.to_string(),
        ..Default::default()
    };

    if page_count == 0 {
        debug!("{} has no pages", file_name);
        return Ok(structure);
    }

    let toc = source.toc();
    if toc.is_empty() {
        let (entry, content) = whole_document_entry(source, file_name, page_count);
        structure.outline.push(entry);
        structure.contents.push(content);
        return Ok(structure);
    }

    let entries: Vec<TocEntry> = toc
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.trim();
            (!title.is_empty()).then(|| TocEntry::new(entry.level, title, entry.page))
        })
        .collect();

    for (index, entry) in entries.iter().enumerate() {
        let last_page = match span {
            SectionSpan::SinglePage => entry.page,
            SectionSpan::UntilNextHeading => entries[index + 1..]
                .iter()
                .find(|next| next.page > entry.page)
                .map(|next| next.page - 1)
                .unwrap_or(page_count),
        };

        let content = if entry.page >= 1 && entry.page <= page_count {
            pages_text(source, entry.page, last_page.min(page_count))
        } else {
            warn!(
                "{}: outline entry {:?} points at page {} outside 1..={}",
                file_name, entry.title, entry.page, page_count
            );
            String::new()
        };

        structure.outline.push(OutlineEntry {
            level: HeadingLevel::new(entry.level),
            text: entry.title.clone(),
            page: entry.page.max(1),
        });
        structure.contents.push(content);
    }

    debug!(
        "{}: {} outline entries from table of contents",
        file_name,
        structure.outline.len()
    );
    Ok(structure)
}

fn whole_document_entry(
    source: &dyn PdfSource,
    file_name: &str,
    page_count: u32,
) -> (OutlineEntry, String) {
    // every ".pdf" is dropped, not just the extension
    let title = match file_name.replace(".pdf", "") {
        stem if stem.trim().is_empty() => file_name.to_string(),
        stem => stem,
    };
    debug!("{} has no table of contents, using whole document", file_name);

    let entry = OutlineEntry {
        level: HeadingLevel::TOP,
        text: title,
        page: 1,
    };
    (entry, pages_text(source, 1, page_count))
}

/// Text of pages `first..=last` joined with line breaks.
fn pages_text(source: &dyn PdfSource, first: u32, last: u32) -> String {
    (first..=last.max(first))
        .map(|page| match source.page_text(page) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not extract text of page {}: {:#}", page, e);
                String::new()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_source::InMemoryPdf;

    fn toc_pdf() -> InMemoryPdf {
        InMemoryPdf::new(
            vec![
                TocEntry::new(1, "  Intro ", 1),
                TocEntry::new(2, "   ", 2),
                TocEntry::new(1, "Methods", 3),
                TocEntry::new(2, "Setup", 3),
            ],
            vec!["intro text", "more intro", "methods text", "results"],
        )
    }

    #[test]
    fn toc_entries_become_outline() {
        let structure = extract_structure(&toc_pdf(), "paper.pdf", SectionSpan::SinglePage).unwrap();
        assert_eq!(structure.title, "paper.pdf");
        let titles: Vec<_> = structure.outline.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "Methods", "Setup"]);
        assert_eq!(structure.outline[2].level, HeadingLevel(2));
        assert_eq!(structure.contents, vec!["intro text", "methods text", "methods text"]);
    }

    #[test]
    fn sections_can_span_until_next_heading() {
        let structure =
            extract_structure(&toc_pdf(), "paper.pdf", SectionSpan::UntilNextHeading).unwrap();
        assert_eq!(structure.contents[0], "intro text\nmore intro");
        // "Setup" starts on the same page, so "Methods" runs to the end too
        assert_eq!(structure.contents[1], "methods text\nresults");
        assert_eq!(structure.contents[2], "methods text\nresults");
    }

    #[test]
    fn missing_toc_falls_back_to_whole_document() {
        let pdf = InMemoryPdf::new(Vec::new(), vec!["page one", "page two", "page three"]);
        let structure = extract_structure(&pdf, "report.pdf", SectionSpan::SinglePage).unwrap();
        assert_eq!(
            structure.outline,
            vec![OutlineEntry { level: HeadingLevel::TOP, text: "report".to_string(), page: 1 }]
        );
        assert_eq!(structure.contents, vec!["page one\npage two\npage three"]);
    }

    #[test]
    fn fallback_title_drops_every_pdf_marker() {
        let pdf = InMemoryPdf::new(Vec::new(), vec!["text"]);
        let title = |name: &str| {
            extract_structure(&pdf, name, SectionSpan::SinglePage).unwrap().outline[0]
                .text
                .clone()
        };
        assert_eq!(title("a.pdf_notes.pdf"), "a_notes");
        assert_eq!(title("scan"), "scan");
        assert_eq!(title(".pdf"), ".pdf");
    }

    #[test]
    fn empty_document_has_empty_outline() {
        let pdf = InMemoryPdf::new(vec![TocEntry::new(1, "Ghost", 1)], Vec::new());
        let structure = extract_structure(&pdf, "empty.pdf", SectionSpan::SinglePage).unwrap();
        assert!(structure.is_empty());
    }

    #[test]
    fn unresolved_page_keeps_entry_without_content() {
        let pdf = InMemoryPdf::new(
            vec![TocEntry::new(1, "Lost", 0), TocEntry::new(1, "Beyond", 9)],
            vec!["only page"],
        );
        let structure = extract_structure(&pdf, "x.pdf", SectionSpan::SinglePage).unwrap();
        assert_eq!(structure.outline.len(), 2);
        assert_eq!(structure.outline[0].page, 1);
        assert_eq!(structure.outline[1].page, 9);
        assert!(structure.contents.iter().all(String::is_empty));
    }
}
