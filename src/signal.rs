use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref,DerefMut};

use nix::errno::Errno;
use nix::sys::signal::{self,SaFlags,SigAction,SigHandler,SigSet,SigmaskHow,Signal};
use nix::sys::wait::{self,WaitPidFlag,WaitStatus};
use nix::unistd::Pid;

use crate::job::JobTable;

struct SharedJobs(UnsafeCell<JobTable>);

// Only touched by the main flow with SIGCHLD blocked, or by the SIGCHLD
// handler itself. The shell never starts a second thread.
unsafe impl Sync for SharedJobs {}

static JOBS: SharedJobs = SharedJobs(UnsafeCell::new(JobTable::new()));

fn sigchld_set() -> SigSet {
	let mut set = SigSet::empty();
	set.add(Signal::SIGCHLD);
	set
}

/// Access to the job table with SIGCHLD blocked. The previous mask is
/// restored when the guard drops.
pub struct JobsGuard {
	old: SigSet,
	_not_send: PhantomData<*const ()>,
}

pub fn lock() -> JobsGuard {
	let mut old = SigSet::empty();
	// Cannot fail: the how argument and the set are both valid.
	let _ = signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&sigchld_set()), Some(&mut old));
	JobsGuard { old: old, _not_send: PhantomData }
}

impl JobsGuard {
	/// Sleeps until a signal arrives, with SIGCHLD deliverable for the
	/// duration. Callers re-check the table afterwards.
	pub fn suspend(&self) {
		let mut mask = self.old;
		mask.remove(Signal::SIGCHLD);
		unsafe {
			libc::sigsuspend(mask.as_ref());
		}
	}
}

impl Deref for JobsGuard {
	type Target = JobTable;

	fn deref(&self) -> &JobTable {
		unsafe { &*JOBS.0.get() }
	}
}

impl DerefMut for JobsGuard {
	fn deref_mut(&mut self) -> &mut JobTable {
		unsafe { &mut *JOBS.0.get() }
	}
}

impl Drop for JobsGuard {
	fn drop(&mut self) {
		let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.old), None);
	}
}

/// Collects every pending child state change without blocking.
pub fn reap(table: &mut JobTable) {
	let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
	loop {
		match wait::waitpid(Pid::from_raw(-1), Some(flags)) {
			Ok(WaitStatus::StillAlive) | Err(_) => break,
			Ok(status) => table.record(status),
		}
	}
}

extern "C" fn handle_sigchld(_: libc::c_int) {
	let errno = Errno::last_raw();
	reap(unsafe { &mut *JOBS.0.get() });
	Errno::set_raw(errno);
}

// Installed without SA_RESTART so a pending read returns EINTR.
extern "C" fn handle_sigint(_: libc::c_int) {}

fn set_handler(sig: Signal, handler: SigHandler, flags: SaFlags) -> nix::Result<()> {
	let action = SigAction::new(handler, flags, SigSet::empty());
	unsafe { signal::sigaction(sig, &action) }.map(|_| ())
}

const JOB_CONTROL_SIGNALS: [Signal; 3] = [Signal::SIGTSTP, Signal::SIGTTIN, Signal::SIGTTOU];

pub fn install() -> nix::Result<()> {
	for &sig in JOB_CONTROL_SIGNALS.iter() {
		set_handler(sig, SigHandler::SigIgn, SaFlags::empty())?;
	}
	set_handler(Signal::SIGINT, SigHandler::Handler(handle_sigint), SaFlags::empty())?;
	set_handler(Signal::SIGCHLD, SigHandler::Handler(handle_sigchld), SaFlags::SA_RESTART)?;
	Ok(())
}

/// Undoes `install` in a freshly forked child, including the SIGCHLD
/// block inherited from the parent's guard.
pub fn restore_defaults() {
	for &sig in JOB_CONTROL_SIGNALS.iter().chain(&[Signal::SIGINT, Signal::SIGCHLD]) {
		let _ = set_handler(sig, SigHandler::SigDfl, SaFlags::empty());
	}
	let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&sigchld_set()), None);
}
