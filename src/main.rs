use std::io;
use std::process;

use tracing_subscriber::{fmt,prelude::*,EnvFilter};

use tinysh::eval::{self,EvalResult};
use tinysh::reader::{Line,LineReader};
use tinysh::terminal::Terminal;
use tinysh::{error,global,parser,prompt,signal};

const LOG_ENV: &str = "TINYSH_LOG";
const STATUS_INTERNAL_ERROR: i32 = 255;

fn init_logging() {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(filter)
		.init();
}

fn main_loop(state: &mut global::State) -> nix::Result<()> {
	let mut reader = LineReader::new();
	loop {
		eval::notify_jobs();
		if state.is_interactive() {
			if let Err(e) = prompt::print(state.last_status) {
				error::report(Some("prompt"), &e);
			}
		}
		let line = match reader.read_line()? {
			Line::Text(line) => line,
			Line::Interrupted => {
				if state.is_interactive() {
					println!();
				}
				continue;
			},
			Line::Eof => {
				if state.is_interactive() {
					println!();
				}
				return Ok(());
			},
		};
		let pipeline = match parser::parse(&line) {
			Ok(Some(pipeline)) => pipeline,
			Ok(None) => continue,
			Err(e) => {
				error::report(None, &e);
				continue;
			},
		};
		let result = eval::eval(state, pipeline);
		eval::notify_jobs();
		if let EvalResult::Exit(_) = result {
			return Ok(());
		}
	}
}

fn main() {
	init_logging();
	if let Err(e) = signal::install() {
		error::report(Some("sigaction"), &e);
		process::exit(STATUS_INTERNAL_ERROR);
	}
	let terminal = match Terminal::acquire() {
		Ok(terminal) => terminal,
		Err(e) => {
			error::report(Some("setpgid"), &e);
			process::exit(STATUS_INTERNAL_ERROR);
		},
	};
	let mut state = global::State::new(terminal);
	if let Err(e) = main_loop(&mut state) {
		error::report(Some("read"), &e);
	}
	process::exit(state.last_status as i32)
}
