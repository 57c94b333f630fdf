use crate::embedding_service::Embedder;
use crate::models::{Config, QueryProfile, RankedReport, RankingRequest, Section};
use crate::pdf_source::DocumentLoader;
use crate::ranking::aggregate;
use crate::similarity_search::score;
use crate::structure_extractor::extract_structure;
use crate::error::RankingError;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Runs extraction, scoring and ranking over one input directory.
pub struct SectionRanker {
    config: Config,
    embedder: Box<dyn Embedder>,
    loader: Box<dyn DocumentLoader>,
}

impl SectionRanker {
    pub fn new(config: Config, embedder: Box<dyn Embedder>, loader: Box<dyn DocumentLoader>) -> Self {
        info!(
            "Initializing SectionRanker (top {}, {:?}, embedding dimension {})",
            config.top_n,
            config.section_span,
            embedder.dimension()
        );
        SectionRanker {
            config,
            embedder,
            loader,
        }
    }

    /// Builds the report and writes it to the output directory.
    ///
    /// Returns `Ok(None)` without writing anything when the request file
    /// is missing.
    pub fn run(&self) -> Result<Option<RankedReport>> {
        let Some(report) = self.rank()? else {
            return Ok(None);
        };
        let output_path = self.save_report(&report)?;
        info!("Processing complete. Output written to {:?}", output_path);
        Ok(Some(report))
    }

    /// Builds the report without touching the output directory.
    pub fn rank(&self) -> Result<Option<RankedReport>> {
        let Some(request) = self.load_request()? else {
            return Ok(None);
        };
        if self.config.top_n == 0 {
            return Err(RankingError::InvalidConfig("top_n must be positive".to_string()).into());
        }

        let profile = QueryProfile::from_request(&request);
        info!("Persona: {:?}, task: {:?}", profile.persona, profile.task);
        let query_embedding = self
            .embedder
            .embed(&profile.query_text())
            .context("Failed to embed query")?;

        let mut candidates = Vec::new();
        for path in self.pdf_files()? {
            candidates.extend(self.score_document(&path, &query_embedding)?);
        }
        info!("Collected {} candidate sections", candidates.len());

        Ok(Some(aggregate(
            candidates,
            self.config.top_n,
            &request,
            &profile,
            Utc::now(),
        )))
    }

    pub fn load_request(&self) -> Result<Option<RankingRequest>> {
        let path = self.config.request_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("The input file was not found at {:?}", path);
                return Ok(None);
            }
            Err(e) => {
                return Err(RankingError::Io(e))
                    .with_context(|| format!("Failed to read {:?}", path))
            }
        };
        let request = serde_json::from_str(&content)
            .map_err(RankingError::Json)
            .with_context(|| format!("Malformed request file {:?}", path))?;
        Ok(Some(request))
    }

    /// PDF files directly inside the input directory, sorted by name.
    pub fn pdf_files(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.input_dir;
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
            let path = entry?.path();
            let is_pdf = path
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| name.ends_with(".pdf"));
            if is_pdf && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        debug!("Found {} PDF files in {:?}", files.len(), dir);
        Ok(files)
    }

    /// Extracts and scores the sections of one document; documents without
    /// structure or embeddings contribute nothing.
    pub fn score_document(&self, path: &Path, query_embedding: &[f32]) -> Result<Vec<Section>> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        info!("Processing document: {}", file_name);

        let structure = {
            let source = self
                .loader
                .open(path)
                .with_context(|| format!("Failed to open {:?}", path))?;
            extract_structure(source.as_ref(), &file_name, self.config.section_span)?
        };
        if structure.is_empty() {
            warn!("Skipping {}: no extractable sections", file_name);
            return Ok(Vec::new());
        }

        let mut sections = structure.into_sections(&file_name);
        let texts: Vec<String> = sections.iter().map(Section::embedding_text).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .with_context(|| format!("Failed to embed sections of {}", file_name))?;
        if embeddings.is_empty() {
            warn!("Skipping {}: empty embedding batch", file_name);
            return Ok(Vec::new());
        }
        if embeddings.len() != sections.len() {
            return Err(RankingError::EmbeddingGeneration(format!(
                "{} embeddings for {} sections of {}",
                embeddings.len(),
                sections.len(),
                file_name
            ))
            .into());
        }

        let scores = score(query_embedding, &embeddings)?;
        for (section, similarity) in sections.iter_mut().zip(scores) {
            section.score = Some(similarity);
        }
        debug!("{}: scored {} sections", file_name, sections.len());
        Ok(sections)
    }

    fn save_report(&self, report: &RankedReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.output_dir)
            .with_context(|| format!("Failed to create {:?}", self.config.output_dir))?;
        let output_path = self.config.output_path();
        let json_content = serde_json::to_string_pretty(report)?;
        fs::write(&output_path, json_content)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        Ok(output_path)
    }
}
