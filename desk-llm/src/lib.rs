//! BYO-key content-generation client for deskflow.
//!
//! Pure HTTP client for the Gemini `generateContent` API; prompt assembly and
//! output parsing live with the callers.

mod error;
mod gemini;

pub use error::{LlmError, Result};
pub use gemini::GeminiClient;
