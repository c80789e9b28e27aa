//! Known completion models and their token limits
//!
//! The endpoint may offer more models than are listed here; unknown models
//! fall back to a limit derived from the model family.

/// Model used when the bot runs without `--expensive`
pub const DEFAULT_MODEL: &str = "text-ada-001";

/// Model used with `--expensive`
pub const EXPENSIVE_MODEL: &str = "text-davinci-003";

/// Model used for `/cheap` queries and topic title generation
pub const CHEAP_MODEL: &str = "text-curie-001";

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// API model id (e.g., "text-davinci-003")
    pub id: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Total tokens (prompt + completion) the model accepts
    pub token_limit: u32,
}

/// Get all known model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "text-davinci-003",
            description: "Davinci (strongest and most expensive)",
            token_limit: 4000,
        },
        ModelDef {
            id: "text-curie-001",
            description: "Curie (cheaper, simpler)",
            token_limit: 2048,
        },
        ModelDef {
            id: "text-babbage-001",
            description: "Babbage (fast, straightforward tasks)",
            token_limit: 2048,
        },
        ModelDef {
            id: "text-ada-001",
            description: "Ada (fastest, cheapest)",
            token_limit: 2048,
        },
        ModelDef {
            id: "code-davinci-002",
            description: "Codex Davinci (code generation)",
            token_limit: 8000,
        },
        ModelDef {
            id: "code-cushman-001",
            description: "Codex Cushman (fast code generation)",
            token_limit: 2048,
        },
    ]
}

/// Token limit for a model id, falling back by family for unknown ids
pub fn token_limit(model: &str) -> u32 {
    all_models()
        .iter()
        .find(|def| def.id == model)
        .map_or_else(
            || if model.contains("davinci") { 4000 } else { 2048 },
            |def| def.token_limit,
        )
}
