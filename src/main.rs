use anyhow::Result;
use clap::{Parser, ValueEnum};
use section_ranker::{
    Config, Embedder, HashingEmbedder, LopdfLoader, OpenAiEmbedder, SectionRanker, SectionSpan,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed bag-of-words vectors
    Hashing,
    /// OpenAI-compatible embeddings endpoint
    Openai,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the PDF files and the request file
    #[clap(long, default_value = "input")]
    input_dir: PathBuf,

    /// Output directory for the ranked report
    #[clap(long, default_value = "output")]
    output_dir: PathBuf,

    /// Request file name inside the input directory
    #[clap(long, default_value = "challenge1b_input.json")]
    request_file: String,

    /// Report file name inside the output directory
    #[clap(long, default_value = "challenge1b_output.json")]
    output_file: String,

    /// Number of sections to keep
    #[clap(long, default_value_t = 5)]
    top_n: usize,

    /// How far a table-of-contents section extends
    #[clap(long, value_enum, default_value_t = SectionSpan::SinglePage)]
    section_span: SectionSpan,

    #[clap(long, value_enum, default_value_t = EmbedderKind::Hashing)]
    embedder: EmbedderKind,

    /// Vector length produced by the embedder
    #[clap(long, default_value_t = 384)]
    embedding_dim: usize,

    /// Base URL of the embeddings API
    #[clap(long, default_value = "https://api.openai.com/v1")]
    api_base: String,

    #[clap(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Embedding model served by the API
    #[clap(long, default_value = "text-embedding-3-small")]
    model: String,

    /// Maximum number of texts sent in one embeddings request
    #[clap(long, default_value_t = 64)]
    api_batch_size: usize,

    #[clap(long, default_value_t = 60)]
    timeout_secs: u64,
}

impl Args {
    fn embedder(&self) -> Result<Box<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Hashing => Box::new(HashingEmbedder::new(self.embedding_dim)?),
            EmbedderKind::Openai => Box::new(OpenAiEmbedder::new(
                &self.api_key,
                &self.api_base,
                &self.model,
                self.embedding_dim,
                self.api_batch_size,
                Duration::from_secs(self.timeout_secs),
            )?),
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start = Instant::now();
    let args = Args::parse();
    let embedder = args.embedder()?;

    let config = Config {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        request_file: args.request_file,
        output_file: args.output_file,
        top_n: args.top_n,
        section_span: args.section_span,
    };

    let ranker = SectionRanker::new(config, embedder, Box::new(LopdfLoader));
    if ranker.run()?.is_some() {
        info!("Total execution time: {:.2} seconds", start.elapsed().as_secs_f64());
    }

    Ok(())
}
