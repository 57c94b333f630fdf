use crate::error::RankingError;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Turns text into fixed-length vectors.
pub trait Embedder {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Encodes a batch, one vector per input in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Offline bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dimension`
/// buckets and the counts are L2-normalized, so identical text always
/// produces the identical vector.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RankingError::ModelLoading(
                "embedding dimension must be positive".to_string(),
            )
            .into());
        }
        info!("Hashing embedder initialized with dimension {}", dimension);
        Ok(HashingEmbedder { dimension })
    }

    fn simple_hash(word: &str) -> usize {
        let mut hash = 0usize;
        for byte in word.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(byte as usize);
        }
        hash
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text_lower = text.to_lowercase();
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            embedding[Self::simple_hash(word) % self.dimension] += 1.0;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }
        Ok(embedding)
    }
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// `dimension` is the vector length the model is expected to return;
    /// `batch_size` caps the number of inputs sent per request.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: usize,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(RankingError::InvalidConfig("batch size must be positive".to_string()).into());
        }
        if api_key.trim().is_empty() {
            return Err(RankingError::ModelLoading("missing API key".to_string()).into());
        }
        if model.trim().is_empty() {
            return Err(RankingError::ModelLoading("missing model name".to_string()).into());
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embeddings HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        info!("Remote embedder using model {} at {}", model, endpoint);
        Ok(OpenAiEmbedder {
            client,
            endpoint,
            model: model.to_string(),
            dimension,
            batch_size,
        })
    }

    /// Sends one request, whose size the caller keeps within `batch_size`.
    fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .context("embeddings request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RankingError::EmbeddingGeneration(format!("{}: {}", status, body)).into());
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .context("failed to parse embeddings response")?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(RankingError::EmbeddingGeneration(format!(
                "received {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            ))
            .into());
        }

        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(RankingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                }
                .into());
            }
        }
        Ok(embeddings)
    }
}

impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RankingError::EmbeddingGeneration("empty response".to_string()).into())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.request_batch(chunk)?);
        }
        debug!(
            "Embedded {} inputs in {} requests",
            embeddings.len(),
            texts.len().div_ceil(self.batch_size)
        );
        Ok(embeddings)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn hashing_embedding_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Methods and Materials").unwrap();
        let b = embedder.embed("methods, and materials!").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn blank_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert!(embedder.embed("  \n ").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn batch_matches_single_calls() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let texts = vec!["alpha beta".to_string(), "gamma".to_string()];
        let batch = embedder.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.embed("gamma").unwrap());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn remote_embedder_requires_credentials() {
        let timeout = Duration::from_secs(5);
        assert!(OpenAiEmbedder::new("", "http://localhost", "m", 8, 4, timeout).is_err());
        assert!(OpenAiEmbedder::new("key", "http://localhost", " ", 8, 4, timeout).is_err());
        assert!(OpenAiEmbedder::new("key", "http://localhost", "m", 8, 0, timeout).is_err());
        let embedder =
            OpenAiEmbedder::new("key", "http://localhost/v1/", "m", 8, 4, timeout).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost/v1/embeddings");
        assert_eq!(embedder.dimension(), 8);
    }

    /// Answers `requests` embedding calls, each with its data in reverse
    /// index order, and reports the size of every batch it received.
    fn serve_embeddings(requests: usize) -> (String, thread::JoinHandle<Vec<usize>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut batch_sizes = Vec::new();
            for _ in 0..requests {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).unwrap();
                let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
                let inputs = request["input"].as_array().unwrap();
                batch_sizes.push(inputs.len());

                let data: Vec<_> = inputs
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(index, text)| {
                        let length = text.as_str().unwrap().len() as f32;
                        serde_json::json!({"index": index, "embedding": [length, 1.0]})
                    })
                    .collect();
                let payload = serde_json::json!({ "data": data }).to_string();
                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                )
                .unwrap();
                stream.flush().unwrap();
            }
            batch_sizes
        });
        (base_url, handle)
    }

    #[test]
    fn remote_batches_are_split_and_kept_in_order() {
        let (base_url, server) = serve_embeddings(3);
        let embedder =
            OpenAiEmbedder::new("key", &base_url, "m", 2, 2, Duration::from_secs(10)).unwrap();
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let embeddings = embedder.embed_batch(&texts).unwrap();

        let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(server.join().unwrap(), vec![2, 2, 1]);
    }
}
