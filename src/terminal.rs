use std::io::{self,IsTerminal};
use std::os::unix::io::AsFd;

use nix::errno::Errno;
use nix::unistd::{self,Pid};
use tracing::{debug,warn};

/// The controlling terminal of an interactive shell.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
	shell_pgid: Pid,
}

impl Terminal {
	/// Puts the shell in its own process group and takes the terminal.
	/// Returns `None` when stdin is not a terminal.
	pub fn acquire() -> nix::Result<Option<Terminal>> {
		if !io::stdin().is_terminal() {
			return Ok(None);
		}
		match unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
			// a session leader cannot move, but already leads its group
			Ok(()) | Err(Errno::EPERM) => {},
			Err(e) => return Err(e),
		}
		let terminal = Terminal { shell_pgid: unistd::getpgrp() };
		if let Err(e) = terminal.reclaim() {
			warn!(error = %e, "could not take the terminal");
		}
		Ok(Some(terminal))
	}

	pub fn give_to(&self, pgid: Pid) -> nix::Result<()> {
		debug!(pgid = pgid.as_raw(), "terminal handed over");
		unistd::tcsetpgrp(io::stdin().as_fd(), pgid)
	}

	pub fn reclaim(&self) -> nix::Result<()> {
		self.give_to(self.shell_pgid)
	}
}
