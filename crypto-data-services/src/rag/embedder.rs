use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// BGE-small-en-v1.5 output size
pub const BGE_SMALL_DIMENSION: usize = 384;

/// Output size of the feature-hashing embedder
pub const HASHING_DIMENSION: usize = 1024;

/// Text to fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Local ONNX embedding model (downloads BGE weights on first run)
pub struct FastEmbedEmbedder {
    model: TextEmbedding,
}

impl FastEmbedEmbedder {
    pub fn new() -> Result<Self> {
        tracing::info!("Loading embedding model (BGE-small-en-v1.5)...");

        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(true),
        )?;

        tracing::info!("Embedding model ready");
        Ok(Self { model })
    }
}

#[async_trait]
impl Embedder for FastEmbedEmbedder {
    fn dimension(&self) -> usize {
        BGE_SMALL_DIMENSION
    }

    fn model_name(&self) -> &str {
        "bge-small-en-v1.5"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.model
            .embed(vec![text.to_string()], None)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to generate embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.model.embed(texts.to_vec(), None)?;
        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Embedding model returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            ));
        }
        Ok(embeddings)
    }
}

/// Deterministic bag-of-words embedder used by the fixture stores.
///
/// Each lower-cased alphanumeric token (minus a few stopwords) adds 1.0 to the
/// bucket chosen by its FNV-1a hash; the vector is then L2-normalised.
/// Text with no usable tokens embeds to the zero vector.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            if STOPWORDS.contains(&token.as_str()) {
                continue;
            }
            let bucket = (fnv1a_64(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "has",
    "have", "how", "i", "in", "is", "it", "its", "me", "more", "of", "on", "or", "s", "tell",
    "than", "that", "the", "their", "this", "to", "was", "what", "whats", "while", "with",
];

/// Lower-cased alphanumeric runs of `text`
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// 64-bit FNV-1a. Stable across runs and platforms.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(PRIME)
    })
}

/// Cosine similarity; 0.0 when either side has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
