//! Natural-language linear algebra tutor backend.
//!
//! `/chat` turns a learner's message into a structured visualization
//! command via a text-generation provider; `/api/eigen` computes complex
//! eigendecompositions for the visualizer.

pub mod api;
pub mod chat;
pub mod context;
pub mod eigen;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod prompt;
pub mod proof;
pub mod schema;
pub mod settings;
pub mod state;
pub mod synth;
