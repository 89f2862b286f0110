//! # pdftrans-agents
//!
//! The concrete agents that implement the translation pipeline:
//! [`orchestrator::OrchestratorAgent`], [`ocr::OCRAgent`],
//! [`translation::TranslationAgent`], [`review::ReviewAgent`],
//! [`terminology::TerminologyAgent`] and [`index::IndexAgent`], plus the
//! `services` trait boundary the agents depend on (LLM, OCR, embedding,
//! document parsing) without implementing any concrete provider.

pub mod index;
pub mod ocr;
pub mod orchestrator;
pub mod review;
pub mod services;
pub mod terminology;
pub mod translation;

pub use index::IndexAgent;
pub use ocr::OCRAgent;
pub use orchestrator::OrchestratorAgent;
pub use review::ReviewAgent;
pub use terminology::TerminologyAgent;
pub use translation::TranslationAgent;
