use std::{ffi,fmt,io};

use thiserror::Error;

use crate::lexer::MAX_WORD_LEN;

pub const PROGRAM: &str = "tinysh";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("unterminated quote")]
	UnterminatedQuote,
	#[error("word longer than {} bytes", MAX_WORD_LEN)]
	WordTooLong,
	#[error("HOME not set")]
	HomeNotSet,
	#[error("parse error near '{0}'")]
	EmptyStage(&'static str),
	#[error("parse error: expected command")]
	ExpectedCommand,
	#[error("parse error near '{0}'")]
	BadRedirect(&'static str),
	#[error("parse error: unexpected input after '&'")]
	TrailingInput,
}

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("fork: {0}")]
	Fork(#[source] nix::Error),
	#[error("{path}: {source}")]
	Redirect { path: String, source: io::Error },
	#[error("job table full")]
	TableFull,
	#[error("argument contains a nul byte")]
	Nul(#[from] ffi::NulError),
	#[error(transparent)]
	Nix(#[from] nix::Error),
}

impl ExecError {
	/// Status a child exits with when it fails before running its program.
	pub fn status(&self) -> u8 {
		match *self {
			ExecError::Nul(_) => crate::eval::STATUS_CANNOT_EXECUTE,
			_ => 1,
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
	#[error("{0}: no such job")]
	NoSuchJob(String),
	#[error("current: no such job")]
	NoCurrent,
	#[error("no job control")]
	NoJobControl,
	#[error("%{0}: job has terminated")]
	Terminated(usize),
}

#[derive(Debug, Error)]
pub enum BuiltinError {
	#[error("too many arguments")]
	TooManyArguments,
	#[error("{0} not set")]
	NotSet(&'static str),
	#[error("{path}: {source}")]
	Chdir { path: String, source: nix::Error },
	#[error("{0}: numeric argument required")]
	NotNumeric(String),
	#[error(transparent)]
	Job(#[from] JobError),
	#[error(transparent)]
	Nix(#[from] nix::Error),
	#[error(transparent)]
	Io(#[from] io::Error),
}

impl BuiltinError {
	pub fn status(&self) -> u8 {
		match *self {
			BuiltinError::NotNumeric(_) => 2,
			_ => 1,
		}
	}
}

/// Writes `tinysh: [context: ]message` to stderr.
pub fn report<E: fmt::Display + ?Sized>(context: Option<&str>, e: &E) {
	match context {
		Some(context) => eprintln!("{}: {}: {}", PROGRAM, context, e),
		None => eprintln!("{}: {}", PROGRAM, e),
	}
}
