//! Asks one question about a local file.
//!
//! ```sh
//! DOCQA_OPENAI_API_KEY=... cargo run --example query_document -- notes.txt "What's a mikmak?"
//! ```
//!
//! Plain text files are split into pages on form feeds. With the `pdf` feature,
//! `.pdf` files are read page by page.

use std::sync::Arc;

use docqa::prelude::*;
use docqa::providers::{completions::OpenAI, embeddings::OpenAIEmbedding};

fn load(path: &str) -> std::io::Result<Document> {
    let title = std::path::Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());

    if path.ends_with(".pdf") {
        return load_pdf(path, title);
    }

    let text = std::fs::read_to_string(path)?;
    let pages = text.split('\u{c}').map(str::to_string).collect();
    Ok(Document::new(path, title, pages))
}

#[cfg(feature = "pdf")]
fn load_pdf(path: &str, title: String) -> std::io::Result<Document> {
    let bytes = std::fs::read(path)?;
    Document::from_pdf(path, title, &bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

#[cfg(not(feature = "pdf"))]
fn load_pdf(_path: &str, _title: String) -> std::io::Result<Document> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "rebuild with `--features pdf` to read PDF files",
    ))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let (Some(path), Some(query)) = (args.next(), args.next()) else {
        eprintln!("usage: query_document <file> <question>");
        std::process::exit(2);
    };

    let pipeline = QueryPipeline::with_config(
        Arc::new(OpenAIEmbedding::new(None)?),
        Arc::new(OpenAI::new(None)?),
        PipelineConfig {
            timeout_secs: Some(60),
            ..PipelineConfig::default()
        },
    )?;

    let request = QueryRequest {
        document: load(&path)?,
        query,
    };

    match pipeline.run(&request).await {
        Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e.to_body())?);
            std::process::exit(1);
        }
    }
    Ok(())
}
