use crate::models::{
    ExtractedSection, QueryProfile, RankedReport, RankingRequest, ReportMetadata, Section,
    SubSectionAnalysis, UNAVAILABLE_CONTENT,
};
use chrono::{DateTime, Utc};
use tracing::debug;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Orders sections by descending score. The sort is stable, so equal
/// scores keep their enumeration order; unscored sections sink to the end.
pub fn rank_sections(mut sections: Vec<Section>) -> Vec<Section> {
    sections.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));
    sections
}

fn sort_key(section: &Section) -> f32 {
    section.score.unwrap_or(f32::NEG_INFINITY)
}

/// Trims the text and turns line breaks into spaces.
pub fn refine_text(raw: &str) -> String {
    let refined: String = raw
        .trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if refined.is_empty() {
        UNAVAILABLE_CONTENT.to_string()
    } else {
        refined
    }
}

/// Merges scored sections of every document into the final report.
pub fn aggregate(
    sections: Vec<Section>,
    top_n: usize,
    request: &RankingRequest,
    profile: &QueryProfile,
    completed_at: DateTime<Utc>,
) -> RankedReport {
    let candidates = sections.len();
    let ranked = rank_sections(sections);

    let mut extracted_sections = Vec::new();
    let mut sub_section_analysis = Vec::new();
    for (i, section) in ranked.into_iter().take(top_n).enumerate() {
        debug!(
            "#{} {} / {:?} (score: {:?})",
            i + 1,
            section.document,
            section.title,
            section.score
        );
        extracted_sections.push(ExtractedSection {
            document: section.document.clone(),
            section_title: section.title,
            importance_rank: i + 1,
            page_number: section.page,
        });
        sub_section_analysis.push(SubSectionAnalysis {
            document: section.document,
            refined_text: refine_text(&section.content),
            page_number: section.page,
        });
    }
    debug!(
        "Selected {} of {} candidate sections",
        extracted_sections.len(),
        candidates
    );

    RankedReport {
        metadata: ReportMetadata {
            input_documents: request.input_documents(),
            persona: profile.persona.clone(),
            job_to_be_done: profile.task.clone(),
            processing_timestamp: completed_at.format(TIMESTAMP_FORMAT).to_string(),
        },
        extracted_sections,
        sub_section_analysis,
    }
}
