use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Substituted for refined text that is empty after normalization.
pub const UNAVAILABLE_CONTENT: &str = "Content for this section is not available.";

pub const DEFAULT_PERSONA: &str = "Unknown Persona";
pub const DEFAULT_TASK: &str = "Unknown Task";

/// Heading depth of an outline entry, rendered as `H1`, `H2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeadingLevel(pub u32);

impl HeadingLevel {
    /// Level used for the synthetic whole-document entry.
    pub const TOP: HeadingLevel = HeadingLevel(1);

    pub fn new(depth: u32) -> Self {
        HeadingLevel(depth.max(1))
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

impl Serialize for HeadingLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One header of a document outline
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OutlineEntry {
    pub level: HeadingLevel,
    pub text: String,
    /// 1-based page the heading points at.
    pub page: u32,
}

/// Outline of a single document plus the raw text mapped to each entry.
///
/// `contents[i]` belongs to `outline[i]`; content is keyed by position so
/// that two entries sharing a title keep their own text.
#[derive(Debug, Serialize, Clone, Default)]
pub struct DocumentStructure {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
    #[serde(skip)]
    pub contents: Vec<String>,
}

impl DocumentStructure {
    pub fn is_empty(&self) -> bool {
        self.outline.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&OutlineEntry, &str)> {
        self.outline
            .iter()
            .zip(self.contents.iter().map(String::as_str))
    }

    /// Title-keyed view of the content. Duplicate titles resolve to the
    /// content of the last entry carrying that title.
    pub fn content_by_title(&self) -> HashMap<&str, &str> {
        self.entries()
            .map(|(entry, content)| (entry.text.as_str(), content))
            .collect()
    }

    /// Builds the scoring candidates for this document, in outline order.
    pub fn into_sections(self, document: &str) -> Vec<Section> {
        self.outline
            .into_iter()
            .zip(self.contents)
            .map(|(entry, content)| Section {
                document: document.to_string(),
                title: entry.text,
                level: entry.level,
                page: entry.page,
                content,
                score: None,
            })
            .collect()
    }
}

/// A heading with its text and, once scored, its relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub document: String,
    pub title: String,
    pub level: HeadingLevel,
    pub page: u32,
    pub content: String,
    pub score: Option<f32>,
}

impl Section {
    /// Text submitted to the embedder: heading and body separated by a space.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// Request file as found in the input directory
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RankingRequest {
    pub persona: PersonaField,
    pub job_to_be_done: JobField,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PersonaField {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct JobField {
    pub task: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DocumentEntry {
    pub filename: Option<String>,
    pub title: Option<String>,
}

impl RankingRequest {
    /// Base names of the declared documents, in declaration order.
    pub fn input_documents(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|doc| {
                let filename = doc.filename.as_deref().unwrap_or_default();
                Path::new(filename)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Persona and task combined into the single query of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProfile {
    pub persona: String,
    pub task: String,
}

impl QueryProfile {
    pub fn from_request(request: &RankingRequest) -> Self {
        QueryProfile {
            persona: request
                .persona
                .role
                .clone()
                .unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
            task: request
                .job_to_be_done
                .task
                .clone()
                .unwrap_or_else(|| DEFAULT_TASK.to_string()),
        }
    }

    pub fn query_text(&self) -> String {
        format!("Persona: {}. Task: {}", self.persona, self.task)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportMetadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubSectionAnalysis {
    pub document: String,
    pub refined_text: String,
    pub page_number: u32,
}

/// Result artifact of one run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedReport {
    pub metadata: ReportMetadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub sub_section_analysis: Vec<SubSectionAnalysis>,
}

/// How much of the document a table-of-contents entry covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SectionSpan {
    /// Only the page the entry points at.
    #[default]
    SinglePage,
    /// From the entry's page up to the page before the next entry that starts later.
    UntilNextHeading,
}

/// Configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub request_file: String,
    pub output_file: String,
    pub top_n: usize,
    pub section_span: SectionSpan,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            request_file: "challenge1b_input.json".to_string(),
            output_file: "challenge1b_output.json".to_string(),
            top_n: 5,
            section_span: SectionSpan::SinglePage,
        }
    }
}

impl Config {
    pub fn request_path(&self) -> PathBuf {
        self.input_dir.join(&self.request_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_level_renders_with_prefix() {
        assert_eq!(HeadingLevel::new(2).to_string(), "H2");
        assert_eq!(HeadingLevel::new(0), HeadingLevel::TOP);
    }

    #[test]
    fn request_defaults_fill_missing_fields() {
        let request: RankingRequest = serde_json::from_str("{}").unwrap();
        let profile = QueryProfile::from_request(&request);
        assert_eq!(profile.persona, DEFAULT_PERSONA);
        assert_eq!(profile.task, DEFAULT_TASK);
        assert_eq!(
            profile.query_text(),
            "Persona: Unknown Persona. Task: Unknown Task"
        );
        assert!(request.input_documents().is_empty());
    }

    #[test]
    fn input_documents_are_base_names() {
        let request: RankingRequest = serde_json::from_str(
            r#"{
                "persona": {"role": "Researcher"},
                "job_to_be_done": {"task": "find methods"},
                "documents": [
                    {"filename": "docs/paper.pdf", "title": "Paper"},
                    {"filename": "notes.pdf"},
                    {}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            request.input_documents(),
            vec!["paper.pdf".to_string(), "notes.pdf".to_string(), String::new()]
        );
        assert_eq!(
            QueryProfile::from_request(&request).query_text(),
            "Persona: Researcher. Task: find methods"
        );
    }

    #[test]
    fn duplicate_titles_keep_positional_content() {
        let structure = DocumentStructure {
            title: "a.pdf".to_string(),
            outline: vec![
                OutlineEntry { level: HeadingLevel(1), text: "Intro".to_string(), page: 1 },
                OutlineEntry { level: HeadingLevel(1), text: "Intro".to_string(), page: 2 },
            ],
            contents: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(structure.content_by_title()["Intro"], "second");

        let sections = structure.into_sections("a.pdf");
        assert_eq!(sections[0].content, "first");
        assert_eq!(sections[1].content, "second");
        assert_eq!(sections[0].embedding_text(), "Intro first");
    }
}
