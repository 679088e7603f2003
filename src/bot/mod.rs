//! Bot core - dispatcher engine, reply formatting, and the task store.

pub mod engine;
pub mod reply;
pub mod store;

pub use engine::Engine;
pub use store::Store;
