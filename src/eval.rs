use std::ffi::{CString,OsStr};
use std::fs;
use std::io::{self,Write};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::{OsStrExt,OsStringExt};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use nix::fcntl::OFlag;
use nix::sys::wait;
use nix::unistd::{self,ForkResult,Pid};
use tracing::debug;

use crate::builtin::{Builtin,Outcome};
use crate::error::{self,ExecError};
use crate::global;
use crate::job::State;
use crate::search;
use crate::signal;
use crate::types::*;

pub const STATUS_NOT_FOUND: u8 = 127;
pub const STATUS_CANNOT_EXECUTE: u8 = 126;
pub const STATUS_FAILURE: u8 = 1;

/// How one stage runs, decided once from its program name.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stage<'a> {
	Builtin(Builtin, &'a [Word]),
	External(&'a [Word]),
}

impl<'a> Stage<'a> {
	pub fn of(command: &'a Command) -> Stage<'a> {
		match Builtin::lookup(command.name()) {
			Some(builtin) => Stage::Builtin(builtin, &command.args),
			None => Stage::External(&command.args),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EvalResult {
	Continue,
	Exit(u8),
}

fn apply_redirects(command: &Command) -> Result<(), ExecError> {
	for &stream in Stream::ALL.iter() {
		let redirect = match command.redirect(stream) {
			Some(redirect) => redirect,
			None => continue,
		};
		let mut oopt = fs::OpenOptions::new();
		let _ = match stream {
			Stream::Stdin => oopt.read(true),
			_ if redirect.append => oopt.append(true).create(true),
			_ => oopt.write(true).create(true).truncate(true),
		};
		oopt.mode(0o644);
		let path = OsStr::from_bytes(&redirect.target);
		let file = oopt.open(path).map_err(|source| ExecError::Redirect {
			path: path.to_string_lossy().into_owned(),
			source: source,
		})?;
		unistd::dup2(file.as_raw_fd(), stream.fd())?;
	}
	Ok(())
}

fn exec_external(args: &[Word]) -> Result<u8, ExecError> {
	let name = String::from_utf8_lossy(&args[0]).into_owned();
	let path = match search::lookup(&args[0]) {
		Some(path) => path,
		None => {
			error::report(Some(name.as_str()), "command not found");
			return Ok(STATUS_NOT_FOUND);
		},
	};
	let argv: Vec<CString> = args.iter().map(|a| CString::new(a.as_slice())).collect::<Result<_, _>>()?;
	let path = CString::new(path.into_os_string().into_vec())?;
	let e = match unistd::execv(&path, &argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	error::report(Some(name.as_str()), &e.desc());
	Ok(STATUS_CANNOT_EXECUTE)
}

fn do_exec_command(state: &mut global::State, command: &Command, stdin: Option<&OwnedFd>, stdout: Option<&OwnedFd>) -> Result<u8, ExecError> {
	if let Some(fd) = stdin {
		unistd::dup2(fd.as_raw_fd(), libc::STDIN_FILENO)?;
	}
	if let Some(fd) = stdout {
		unistd::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO)?;
	}
	// file redirects replace whatever the pipes connected
	apply_redirects(command)?;
	match Stage::of(command) {
		Stage::Builtin(builtin, args) => Ok(builtin.run(state, args).status()),
		Stage::External(args) => exec_external(args),
	}
}

/// Child side of the fork. Never returns.
fn exec_command(state: &global::State, command: &Command, pgid: Option<Pid>, foreground: bool,
                stdin: Option<&OwnedFd>, stdout: Option<&OwnedFd>) -> ! {
	let mut state = state.clone();
	state.subshell = true;
	let _ = unistd::setpgid(Pid::from_raw(0), pgid.unwrap_or(Pid::from_raw(0)));
	if foreground && pgid.is_none() {
		state.give_terminal(unistd::getpid());
	}
	signal::restore_defaults();

	let s = do_exec_command(&mut state, command, stdin, stdout).unwrap_or_else(|e| {
		error::report(None, &e);
		e.status()
	});
	let _ = io::stdout().flush();
	unsafe { libc::_exit(s as libc::c_int) }
}

/// Forks every stage left to right into one process group. Pipe ends
/// are dropped by the parent as soon as the stage that needs them exists.
fn spawn_commands(state: &global::State, pipeline: &Pipeline, spawned: &mut Vec<Pid>) -> Result<(), ExecError> {
	let foreground = !pipeline.is_background;
	let last = pipeline.commands.len() - 1;
	let mut pipe_stdin: Option<OwnedFd> = None;
	for (i, command) in pipeline.commands.iter().enumerate() {
		let (pipe_read, pipe_write) = if i < last {
			let (r, w) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
			(Some(r), Some(w))
		} else {
			(None, None)
		};
		let pgid = spawned.first().cloned();
		match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
			ForkResult::Child => {
				exec_command(state, command, pgid, foreground, pipe_stdin.as_ref(), pipe_write.as_ref());
			},
			ForkResult::Parent { child } => {
				let pgid = pgid.unwrap_or(child);
				let _ = unistd::setpgid(child, pgid);
				if foreground && i == 0 {
					state.give_terminal(pgid);
				}
				debug!(pid = child.as_raw(), pgid = pgid.as_raw(), stage = i, "spawned");
				spawned.push(child);
			},
		}
		pipe_stdin = pipe_read;
		drop(pipe_write);
	}
	Ok(())
}

/// Spawns the pipeline and registers it, all with SIGCHLD blocked so no
/// member can be reaped before its job exists.
fn spawn_pipeline(state: &global::State, pipeline: &Pipeline) -> Result<usize, ExecError> {
	let mut jobs = signal::lock();
	if jobs.is_full() {
		return Err(ExecError::TableFull);
	}
	let mut spawned: Vec<Pid> = Vec::with_capacity(pipeline.commands.len());
	if let Err(e) = spawn_commands(state, pipeline, &mut spawned) {
		for &pid in spawned.iter() {
			let _ = wait::waitpid(pid, None);
		}
		if !spawned.is_empty() && !pipeline.is_background {
			state.reclaim_terminal();
		}
		return Err(e);
	}
	let pgid = spawned[0];
	jobs.add(pgid, spawned, pipeline.display())
}

/// Blocks until the job stops or finishes, then takes the terminal back.
/// Returns the status the shell should show for it.
pub fn wait_foreground(state: &mut global::State, jid: usize) -> u8 {
	let mut jobs = signal::lock();
	while jobs.get(jid).map(|job| job.state) == Some(State::Running) {
		jobs.suspend();
	}
	state.reclaim_terminal();
	let (job_state, status) = match jobs.get(jid) {
		Some(job) if job.state == State::Done => (State::Done, job.exit_status().unwrap_or(0)),
		Some(job) => (job.state, job.stop_status()),
		None => return state.last_status,
	};
	if job_state == State::Done {
		jobs.remove(jid);
	}
	status
}

fn eval_builtin(state: &mut global::State, pipeline: &Pipeline) -> Option<EvalResult> {
	let command = match pipeline.commands.as_slice() {
		[command] if !command.has_redirects() => command,
		_ => return None,
	};
	let (builtin, args) = match Stage::of(command) {
		Stage::Builtin(builtin, args) => (builtin, args),
		Stage::External(_) => return None,
	};
	let outcome = builtin.run(state, args);
	state.last_status = outcome.status();
	match outcome {
		Outcome::Exit(code) => Some(EvalResult::Exit(code)),
		_ => Some(EvalResult::Continue),
	}
}

pub fn eval(state: &mut global::State, pipeline: Pipeline) -> EvalResult {
	if let Some(result) = eval_builtin(state, &pipeline) {
		return result;
	}
	match spawn_pipeline(state, &pipeline) {
		Ok(jid) if pipeline.is_background => {
			let pgid = signal::lock().get(jid).map(|job| job.pgid);
			if let Some(pgid) = pgid {
				println!("[{}] {}", jid, pgid);
			}
			state.last_status = 0;
		},
		Ok(jid) => {
			state.last_status = wait_foreground(state, jid);
		},
		Err(e) => {
			error::report(None, &e);
			state.last_status = STATUS_FAILURE;
		},
	}
	EvalResult::Continue
}

/// Reports jobs that stopped or finished since the last call.
pub fn notify_jobs() {
	let lines = signal::lock().take_notifications();
	for line in lines {
		eprintln!("{}", line);
	}
}
