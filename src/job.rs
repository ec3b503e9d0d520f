use std::fmt;

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracing::debug;

use crate::error::{ExecError,JobError};

pub const MAX_JOBS: usize = 32;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State { Running, Stopped, Done }

impl fmt::Display for State {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			State::Running => "Running",
			State::Stopped => "Stopped",
			State::Done => "Done",
		})
	}
}

pub trait WaitStatusExt {
	/// Shell-visible status: the exit value, or 128 plus the signal number.
	fn code(self) -> Option<u8>;
}

impl WaitStatusExt for WaitStatus {
	fn code(self) -> Option<u8> {
		match self {
			WaitStatus::Exited(_, code) => Some(code as u8),
			WaitStatus::Signaled(_, signal, _) => Some(signal_status(signal)),
			_ => None,
		}
	}
}

pub fn signal_status(signal: Signal) -> u8 {
	(128 + signal as i32) as u8
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
struct Process {
	pid: Pid,
	alive: bool,
}

#[derive(Debug)]
pub struct Job {
	pub jid: usize,
	seq: u64,
	pub pgid: Pid,
	pub state: State,
	processes: Vec<Process>,
	alive: usize,
	status: Option<u8>,
	stop_signal: Option<Signal>,
	pub cmdline: String,
	pub notified: bool,
}

impl Job {
	fn set_state(&mut self, state: State) {
		if self.state != state {
			self.state = state;
			self.notified = false;
		}
	}

	/// Status of the last stage once it has terminated.
	pub fn exit_status(&self) -> Option<u8> {
		self.status
	}

	/// Status reported for a job that stopped while in the foreground.
	pub fn stop_status(&self) -> u8 {
		signal_status(self.stop_signal.unwrap_or(Signal::SIGTSTP))
	}

	pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
		self.processes.iter().map(|pr| pr.pid)
	}

	pub fn resume(&mut self) {
		self.state = State::Running;
		self.notified = true;
	}

	fn update(&mut self, idx: usize, status: WaitStatus) {
		match status {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
				if self.processes[idx].alive {
					self.processes[idx].alive = false;
					self.alive -= 1;
				}
				if idx + 1 == self.processes.len() {
					self.status = status.code();
				}
				if self.alive == 0 {
					self.set_state(State::Done);
				}
			},
			WaitStatus::Stopped(_, signal) => {
				self.stop_signal = Some(signal);
				self.set_state(State::Stopped);
			},
			WaitStatus::Continued(_) => self.set_state(State::Running),
			_ => {},
		}
	}
}

/// Fixed-capacity job registry. Slot `i` holds job id `i + 1`, so the
/// first free slot is always the smallest unused id.
#[derive(Debug)]
pub struct JobTable {
	slots: [Option<Job>; MAX_JOBS],
	next_seq: u64,
	current: Option<usize>,
	previous: Option<usize>,
}

impl JobTable {
	const EMPTY: Option<Job> = None;

	pub const fn new() -> JobTable {
		JobTable { slots: [JobTable::EMPTY; MAX_JOBS], next_seq: 0, current: None, previous: None }
	}

	pub fn is_full(&self) -> bool {
		self.slots.iter().all(Option::is_some)
	}

	pub fn is_empty(&self) -> bool {
		self.slots.iter().all(Option::is_none)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Job> {
		self.slots.iter().flatten()
	}

	pub fn get(&self, jid: usize) -> Option<&Job> {
		self.slots.get(jid.wrapping_sub(1)).and_then(Option::as_ref)
	}

	pub fn get_mut(&mut self, jid: usize) -> Option<&mut Job> {
		self.slots.get_mut(jid.wrapping_sub(1)).and_then(Option::as_mut)
	}

	/// Slot and member index of `pid`. Allocation-free.
	fn locate(&self, pid: Pid) -> Option<(usize, usize)> {
		self.slots.iter().enumerate().find_map(|(slot, job)| {
			job.as_ref()?.processes.iter().position(|pr| pr.pid == pid).map(|idx| (slot, idx))
		})
	}

	pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
		self.locate(pid).map(|(slot, _)| slot + 1)
	}

	pub fn current(&self) -> Option<usize> {
		self.current
	}

	pub fn previous(&self) -> Option<usize> {
		self.previous
	}

	/// Current is the job with the highest sequence number, previous the next.
	fn refresh_marks(&mut self) {
		let mut top: Option<(u64, usize)> = None;
		let mut second: Option<(u64, usize)> = None;
		for job in self.slots.iter().flatten() {
			let entry = (job.seq, job.jid);
			if top.map_or(true, |t| entry > t) {
				second = top;
				top = Some(entry);
			} else if second.map_or(true, |s| entry > s) {
				second = Some(entry);
			}
		}
		self.current = top.map(|(_, jid)| jid);
		self.previous = second.map(|(_, jid)| jid);
	}

	pub fn mark(&self, jid: usize) -> char {
		if self.current == Some(jid) {
			'+'
		} else if self.previous == Some(jid) {
			'-'
		} else {
			' '
		}
	}

	pub fn add(&mut self, pgid: Pid, pids: Vec<Pid>, cmdline: String) -> Result<usize, ExecError> {
		let idx = self.slots.iter().position(Option::is_none).ok_or(ExecError::TableFull)?;
		let jid = idx + 1;
		let processes: Vec<Process> = pids.into_iter().map(|pid| Process { pid: pid, alive: true }).collect();
		debug!(jid, pgid = pgid.as_raw(), members = processes.len(), "job added");
		self.slots[idx] = Some(Job {
			jid: jid,
			seq: self.next_seq,
			pgid: pgid,
			state: State::Running,
			alive: processes.len(),
			processes: processes,
			status: None,
			stop_signal: None,
			cmdline: cmdline,
			notified: true,
		});
		self.next_seq += 1;
		self.refresh_marks();
		Ok(jid)
	}

	pub fn remove(&mut self, jid: usize) -> Option<Job> {
		let job = self.slots.get_mut(jid.wrapping_sub(1)).and_then(Option::take)?;
		debug!(jid, "job removed");
		if self.is_empty() {
			self.next_seq = 0;
		}
		self.refresh_marks();
		Some(job)
	}

	pub fn make_current(&mut self, jid: usize) {
		let seq = self.next_seq;
		if let Some(job) = self.get_mut(jid) {
			job.seq = seq;
			self.next_seq += 1;
			self.refresh_marks();
		}
	}

	/// Records a state change observed by `waitpid`. Runs inside the
	/// SIGCHLD handler, so it must neither block nor allocate.
	pub fn record(&mut self, status: WaitStatus) {
		let pid = match status.pid() {
			Some(pid) => pid,
			None => return,
		};
		if let Some((slot, idx)) = self.locate(pid) {
			if let Some(ref mut job) = self.slots[slot] {
				job.update(idx, status);
			}
		}
	}

	/// Resolves `%N`, `%+`, `%%`, `%-`, or no spec (the current job).
	pub fn resolve(&self, spec: Option<&str>) -> Result<usize, JobError> {
		match spec {
			None | Some("%") | Some("%%") | Some("%+") => self.current.ok_or(JobError::NoCurrent),
			Some("%-") => self.previous.ok_or_else(|| JobError::NoSuchJob("%-".to_string())),
			Some(s) => s.strip_prefix('%')
				.and_then(|n| n.parse::<usize>().ok())
				.filter(|&jid| self.get(jid).is_some())
				.ok_or_else(|| JobError::NoSuchJob(s.to_string())),
		}
	}

	pub fn describe(&self, job: &Job) -> String {
		format!("[{}]{}  {}\t{}", job.jid, self.mark(job.jid), job.state, job.cmdline)
	}

	/// One line per job. Stopped and finished jobs count as reported.
	pub fn list(&mut self) -> Vec<String> {
		let lines: Vec<String> = self.iter().map(|job| self.describe(job)).collect();
		for job in self.slots.iter_mut().flatten() {
			if job.state != State::Running {
				job.notified = true;
			}
		}
		lines
	}

	/// Lines for jobs that stopped or finished since the last call; finished
	/// jobs are dropped from the table afterwards.
	pub fn take_notifications(&mut self) -> Vec<String> {
		let mut lines = vec![];
		for idx in 0 .. MAX_JOBS {
			let line = match self.slots[idx] {
				Some(ref job) if !job.notified && job.state != State::Running => self.describe(job),
				_ => continue,
			};
			lines.push(line);
			if let Some(ref mut job) = self.slots[idx] {
				job.notified = true;
			}
		}
		let done: Vec<usize> = self.iter().filter(|job| job.state == State::Done).map(|job| job.jid).collect();
		for jid in done {
			self.remove(jid);
		}
		lines
	}
}

impl Default for JobTable {
	fn default() -> JobTable {
		JobTable::new()
	}
}
