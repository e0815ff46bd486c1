/*
 * The application layer between the command line and the core. `cli` declares
 * the argument grammar; `handler::ProjectManagerLogic` turns parsed commands
 * into core calls and formats their results. Unit tests for the handler live in
 * `handler_tests.rs` and run it against a mocked settings store.
 */
pub mod cli;
pub mod handler;

#[cfg(test)]
mod handler_tests;

pub use cli::Cli;
pub use handler::ProjectManagerLogic;
