//! Document ingestion: text extraction and semantic chunking

mod chunker;
mod extractor;

pub use chunker::{percentile, split_into_sentences, SemanticChunker};
pub use extractor::{cleanup_pdf_text, DocumentExtractor, FileExtractor};
