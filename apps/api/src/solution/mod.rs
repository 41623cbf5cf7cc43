// Solution generation engine: embedding refresh, similarity retrieval,
// prompt composition, completion, and the upsert+append persistence step.
// All provider calls go through llm_client; no direct Gemini calls here.

pub mod composer;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
