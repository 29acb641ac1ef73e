pub mod analyzer;
pub mod extractor;
pub mod pipeline;
pub mod structured;
pub mod transcript;
pub mod types;

pub mod utils;

pub use analyzer::{AnalyzerConfig, ContentAnalyzer};
pub use extractor::{DocumentExtractor, PdfTextExtractor};
pub use pipeline::AnalysisPipeline;
pub use structured::{DecodeOutcome, Decoded, decode_json_array, decode_key_points, decode_quiz};
pub use transcript::{
    TranscriptError, TranscriptFetcher, TranscriptSegment, VideoReference,
    YoutubeTranscriptFetcher, flatten_transcript,
};
pub use types::{AnalysisArtifacts, AnalysisRecord, AnalysisSource, QuizItem, SourceKind};
pub use utils::{InputLimiter, TiktokenTokenizer, Tokenizer};
