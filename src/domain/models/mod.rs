mod action;
mod backend;
mod error;
mod event;
mod key_store;
mod message;
mod model_config;
mod slash_commands;

pub use action::*;
pub use backend::*;
pub use error::*;
pub use event::*;
pub use key_store::*;
pub use message::*;
pub use model_config::*;
pub use slash_commands::*;
