//! Concrete grading-model providers.

mod openrouter;

pub use openrouter::{openrouter_model_id, OpenRouterProvider, OPENROUTER_BASE_URL};
