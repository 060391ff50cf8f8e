pub(crate) mod openai;

pub use openai::OpenAIEmbeddingModel as OpenAIEmbedding;
