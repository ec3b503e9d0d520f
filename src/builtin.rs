use std::env;
use std::ffi::OsString;
use std::io::{self,Write};
use std::os::unix::ffi::OsStringExt;
use std::str;

use nix::sys::signal::{self,Signal};
use nix::unistd;

use crate::error::{self,BuiltinError,JobError};
use crate::eval;
use crate::global;
use crate::job::{JobTable,State};
use crate::signal as sig;
use crate::types::Word;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Builtin { Cd, Exit, Jobs, Fg, Bg }

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
	Success,
	Failure(u8),
	Exit(u8),
}

impl Outcome {
	pub fn from_status(status: u8) -> Outcome {
		if status == 0 { Outcome::Success } else { Outcome::Failure(status) }
	}

	pub fn status(self) -> u8 {
		match self {
			Outcome::Success => 0,
			Outcome::Failure(s) | Outcome::Exit(s) => s,
		}
	}
}

type BuiltinResult = Result<Outcome, BuiltinError>;

impl Builtin {
	pub fn lookup(name: &[u8]) -> Option<Builtin> {
		match name {
			b"cd" => Some(Builtin::Cd),
			b"exit" => Some(Builtin::Exit),
			b"jobs" => Some(Builtin::Jobs),
			b"fg" => Some(Builtin::Fg),
			b"bg" => Some(Builtin::Bg),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Builtin::Cd => "cd",
			Builtin::Exit => "exit",
			Builtin::Jobs => "jobs",
			Builtin::Fg => "fg",
			Builtin::Bg => "bg",
		}
	}

	/// Runs the builtin with `args[0]` being its own name. Errors are
	/// reported here and folded into the outcome.
	pub fn run(self, state: &mut global::State, args: &[Word]) -> Outcome {
		let f: fn(&mut global::State, &[Word]) -> BuiltinResult = match self {
			Builtin::Cd => builtin_cd,
			Builtin::Exit => builtin_exit,
			Builtin::Jobs => builtin_jobs,
			Builtin::Fg => builtin_fg,
			Builtin::Bg => builtin_bg,
		};
		let outcome = f(state, args).unwrap_or_else(|e| {
			error::report(Some(self.name()), &e);
			Outcome::Failure(e.status())
		});
		let _ = io::stdout().flush();
		outcome
	}
}

fn lossy(word: &[u8]) -> String {
	String::from_utf8_lossy(word).into_owned()
}

fn builtin_cd(_: &mut global::State, args: &[Word]) -> BuiltinResult {
	let (target, announce) = match args.get(1 ..).unwrap_or(&[]) {
		[] => (env::var_os("HOME").ok_or(BuiltinError::NotSet("HOME"))?, false),
		[dir] if &dir[..] == b"-" => (env::var_os("OLDPWD").ok_or(BuiltinError::NotSet("OLDPWD"))?, true),
		[dir] => (OsString::from_vec(dir.clone()), false),
		_ => return Err(BuiltinError::TooManyArguments),
	};
	let old = env::current_dir()?;
	unistd::chdir(target.as_os_str()).map_err(|source| BuiltinError::Chdir {
		path: target.to_string_lossy().into_owned(),
		source: source,
	})?;
	if announce {
		println!("{}", target.to_string_lossy());
	}
	env::set_var("OLDPWD", old);
	env::set_var("PWD", env::current_dir()?);
	Ok(Outcome::Success)
}

/// Decimal exit code masked to 8 bits, as `exit` accepts it.
pub fn parse_exit_code(arg: &[u8]) -> Option<u8> {
	let n: i64 = str::from_utf8(arg).ok()?.parse().ok()?;
	Some((n & 0xFF) as u8)
}

fn builtin_exit(_: &mut global::State, args: &[Word]) -> BuiltinResult {
	match args.get(1 ..).unwrap_or(&[]) {
		[] => Ok(Outcome::Exit(0)),
		[code] => parse_exit_code(code).map(Outcome::Exit).ok_or_else(|| BuiltinError::NotNumeric(lossy(code))),
		_ => Err(BuiltinError::TooManyArguments),
	}
}

fn builtin_jobs(_: &mut global::State, _: &[Word]) -> BuiltinResult {
	let lines = sig::lock().list();
	for line in lines {
		println!("{}", line);
	}
	Ok(Outcome::Success)
}

fn job_spec(state: &global::State, args: &[Word]) -> Result<Option<String>, BuiltinError> {
	if state.subshell {
		return Err(JobError::NoJobControl.into());
	}
	match args.get(1 ..).unwrap_or(&[]) {
		[] => Ok(None),
		[spec] => Ok(Some(lossy(spec))),
		_ => Err(BuiltinError::TooManyArguments),
	}
}

/// Status of a job that finished before anyone waited for it, removing it.
fn take_finished(jobs: &mut JobTable, jid: usize) -> Option<u8> {
	match jobs.get(jid) {
		Some(job) if job.state == State::Done => {
			let status = job.exit_status().unwrap_or(0);
			jobs.remove(jid);
			Some(status)
		},
		_ => None,
	}
}

fn builtin_fg(state: &mut global::State, args: &[Word]) -> BuiltinResult {
	let spec = job_spec(state, args)?;
	let jid = {
		let mut jobs = sig::lock();
		let jid = jobs.resolve(spec.as_ref().map(String::as_str))?;
		if let Some(status) = take_finished(&mut jobs, jid) {
			return Ok(Outcome::from_status(status));
		}
		let pgid = jobs.get(jid).ok_or(JobError::NoCurrent)?.pgid;
		state.give_terminal(pgid);
		if let Err(e) = signal::killpg(pgid, Signal::SIGCONT) {
			state.reclaim_terminal();
			return Err(e.into());
		}
		jobs.make_current(jid);
		if let Some(job) = jobs.get_mut(jid) {
			job.resume();
		}
		jid
	};
	let status = eval::wait_foreground(state, jid);
	Ok(Outcome::from_status(status))
}

fn builtin_bg(state: &mut global::State, args: &[Word]) -> BuiltinResult {
	let spec = job_spec(state, args)?;
	let line = {
		let mut jobs = sig::lock();
		let jid = jobs.resolve(spec.as_ref().map(String::as_str))?;
		let job = jobs.get(jid).ok_or(JobError::NoCurrent)?;
		if job.state == State::Done {
			return Err(JobError::Terminated(jid).into());
		}
		signal::killpg(job.pgid, Signal::SIGCONT)?;
		jobs.make_current(jid);
		if let Some(job) = jobs.get_mut(jid) {
			job.resume();
		}
		let job = jobs.get(jid).ok_or(JobError::NoCurrent)?;
		let mut line = jobs.describe(job);
		if !line.ends_with('&') {
			line.push_str(" &");
		}
		line
	};
	println!("{}", line);
	Ok(Outcome::Success)
}

#[cfg(test)]
mod tests {
	use nix::sys::wait::WaitStatus;
	use nix::unistd::Pid;

	use super::*;

	fn words(args: &[&str]) -> Vec<Word> {
		args.iter().map(|a| a.as_bytes().to_vec()).collect()
	}

	#[test]
	fn lookup_names() {
		assert_eq!(Builtin::lookup(b"cd"), Some(Builtin::Cd));
		assert_eq!(Builtin::lookup(b"fg"), Some(Builtin::Fg));
		assert_eq!(Builtin::lookup(b"ls"), None);
		assert_eq!(Builtin::lookup(b"CD"), None);
		for b in [Builtin::Cd, Builtin::Exit, Builtin::Jobs, Builtin::Fg, Builtin::Bg].iter() {
			assert_eq!(Builtin::lookup(b.name().as_bytes()), Some(*b));
		}
	}

	#[test]
	fn exit_codes() {
		assert_eq!(parse_exit_code(b"3"), Some(3));
		assert_eq!(parse_exit_code(b"300"), Some(44));
		assert_eq!(parse_exit_code(b"-1"), Some(255));
		assert_eq!(parse_exit_code(b"+7"), Some(7));
		assert_eq!(parse_exit_code(b"abc"), None);
		assert_eq!(parse_exit_code(b"4x"), None);
		assert_eq!(parse_exit_code(b""), None);
	}

	#[test]
	fn exit_outcomes() {
		let mut state = global::State::new(None);
		assert_eq!(Builtin::Exit.run(&mut state, &words(&["exit"])), Outcome::Exit(0));
		assert_eq!(Builtin::Exit.run(&mut state, &words(&["exit", "260"])), Outcome::Exit(4));
		assert_eq!(Builtin::Exit.run(&mut state, &words(&["exit", "x"])), Outcome::Failure(2));
		assert_eq!(Builtin::Exit.run(&mut state, &words(&["exit", "1", "2"])), Outcome::Failure(1));
	}

	#[test]
	fn job_control_needs_a_shell() {
		let mut state = global::State::new(None);
		state.subshell = true;
		assert_eq!(Builtin::Fg.run(&mut state, &words(&["fg"])), Outcome::Failure(1));
		assert_eq!(Builtin::Bg.run(&mut state, &words(&["bg", "%1"])), Outcome::Failure(1));
	}

	#[test]
	fn finished_jobs_are_not_resumed() {
		let mut state = global::State::new(None);
		let gone = Pid::from_raw(999_999);
		let jid = {
			let mut jobs = sig::lock();
			let jid = jobs.add(gone, vec![gone], "sh -c 'exit 3' &".to_string()).unwrap();
			jobs.record(WaitStatus::Exited(gone, 3));
			jid
		};
		let spec = format!("%{}", jid);
		assert_eq!(Builtin::Bg.run(&mut state, &words(&["bg", &spec])), Outcome::Failure(1));
		assert_eq!(sig::lock().get(jid).map(|job| job.state), Some(State::Done));
		assert_eq!(Builtin::Fg.run(&mut state, &words(&["fg", &spec])), Outcome::Failure(3));
		assert!(sig::lock().get(jid).is_none());
	}

	#[test]
	fn failed_continue_leaves_job_alone() {
		let mut state = global::State::new(None);
		let gone = Pid::from_raw(999_998);
		let jid = {
			let mut jobs = sig::lock();
			let jid = jobs.add(gone, vec![gone], "vi".to_string()).unwrap();
			jobs.record(WaitStatus::Stopped(gone, Signal::SIGTSTP));
			jid
		};
		let spec = format!("%{}", jid);
		assert_eq!(Builtin::Bg.run(&mut state, &words(&["bg", &spec])), Outcome::Failure(1));
		assert_eq!(Builtin::Fg.run(&mut state, &words(&["fg", &spec])), Outcome::Failure(1));
		let mut jobs = sig::lock();
		assert_eq!(jobs.get(jid).map(|job| job.state), Some(State::Stopped));
		jobs.remove(jid);
	}

	#[test]
	fn outcome_status() {
		assert_eq!(Outcome::from_status(0), Outcome::Success);
		assert_eq!(Outcome::from_status(5), Outcome::Failure(5));
		assert_eq!(Outcome::Exit(9).status(), 9);
	}
}
