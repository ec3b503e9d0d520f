//! Job-control shell: command-line parsing, pipeline spawning, and a job
//! table kept consistent with a SIGCHLD handler by signal masking.

pub mod builtin;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod lexer;
pub mod parser;
pub mod prompt;
pub mod reader;
pub mod search;
pub mod signal;
pub mod terminal;
pub mod types;
