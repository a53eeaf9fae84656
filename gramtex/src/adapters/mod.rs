/// Local model CLI backend.
pub mod command;
/// Ollama HTTP backend.
pub mod ollama;

pub use command::CommandService;
pub use ollama::OllamaService;
