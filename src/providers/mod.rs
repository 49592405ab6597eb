//! Backend provider implementations.

mod gemini_wire;
mod google;
mod gptgod;
mod openai_chat;
mod openrouter;
mod yunwu;

pub use google::GoogleProvider;
pub use gptgod::GptGodProvider;
pub use openrouter::OpenRouterProvider;
pub use yunwu::YunwuProvider;
