//! Core deckhand library (document model, edit engine, sessions, tools, runtime).

pub mod config;
pub mod core;
pub mod document;
pub mod prompts;
pub mod runtime;
pub mod tools;
