mod chat_session;
mod column;
mod orchestrator;

pub use chat_session::*;
pub use column::*;
pub use orchestrator::*;
