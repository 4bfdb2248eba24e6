//! Core types shared by the prompt, extraction, and streaming layers.

mod conversation;
mod descriptor;
mod message;

pub use conversation::*;
pub use descriptor::*;
pub use message::*;
