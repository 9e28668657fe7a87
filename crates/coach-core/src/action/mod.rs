//! The action protocol: parse LLM output, authorize, execute.

pub mod executor;
pub mod handlers;
pub mod parser;

pub use executor::ActionExecutor;
pub use parser::ActionParser;
