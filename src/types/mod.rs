//! Public types for the Draupnir API.

mod candidate;
mod request;
mod response;
mod template;

pub use candidate::{ArtifactContext, ArtifactKind, Candidate, CandidateMetadata, ScoredCandidate};
pub use request::{GenerationRequest, OutputFormat};
pub use response::{
    BackendResponse, InvokeParams, RenderMetadata, RenderedPrompt, SampleResponse, TokenUsage,
};
pub use template::{Template, TemplateExample, VariableDecl};
