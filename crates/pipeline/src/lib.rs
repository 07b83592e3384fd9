//! The tutorflow routing pipeline.
//!
//! A chat message passes through profile resolution, context inference,
//! intent classification, parameter extraction and tool dispatch, and comes
//! back as a structured [`ChatReply`]. Each stage degrades to a deterministic
//! fallback instead of failing the request.

pub mod classifier;
pub mod controller;
pub mod extractor;
pub mod inference;
pub mod presenter;
pub mod prompts;
pub mod text;

pub use classifier::{
    Classification, ClassificationInput, IntentClassifier, IntentStrategy, KeywordIntentStrategy,
    ModelIntentStrategy,
};
pub use controller::{ChatReply, ChatRequest, Pipeline, ReplyStatus, Stage};
pub use extractor::{ExtractionInput, ParameterExtractor};
pub use presenter::PresentationHints;
