//! Language generation: translation, smart replies and summaries
//!
//! `GenerationBackend` is the narrow contract to the model (prompt in,
//! JSON out). `Assistant` owns the prompts and turns loosely shaped output
//! into typed `Generated<T>` results.

mod assistant;
mod backend;
mod gemini;
mod mock;

pub use assistant::{prompt_input, Assistant, Generated, Translation, SUMMARY_FALLBACK};
pub use backend::{strip_code_fence, GenerationBackend, GenerationError};
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockGenerator;
