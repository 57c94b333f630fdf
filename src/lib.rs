pub mod embedding_service;
pub mod error;
pub mod models;
pub mod pdf_source;
pub mod ranking;
pub mod section_ranker;
pub mod similarity_search;
pub mod structure_extractor;

// Re-export key types
pub use embedding_service::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use error::RankingError;
pub use models::{Config, DocumentStructure, QueryProfile, RankedReport, Section, SectionSpan};
pub use pdf_source::{DocumentLoader, LopdfLoader, PdfSource};
pub use section_ranker::SectionRanker;
