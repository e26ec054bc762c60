//! Summarization pipeline: chunking, diversity selection and orchestration.

pub mod chunking;
pub mod selection;
mod service;
pub mod types;

pub use service::{SummarizeApi, SummarizeService};
pub use types::{
    ChunkingError, Document, InputError, PipelineError, SummarizeRequest, SummaryOutcome,
    SummaryStats, Upload,
};
