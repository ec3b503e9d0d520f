use nix::unistd::Pid;
use tracing::debug;

use crate::terminal::Terminal;

#[derive(Debug, Clone)]
pub struct State {
	pub last_status: u8,
	pub terminal: Option<Terminal>,
	/// Set in forked pipeline members, where job control has no meaning.
	pub subshell: bool,
}

impl State {
	pub fn new(terminal: Option<Terminal>) -> State {
		State { last_status: 0, terminal: terminal, subshell: false }
	}

	pub fn is_interactive(&self) -> bool {
		self.terminal.is_some()
	}

	pub fn give_terminal(&self, pgid: Pid) {
		if let Some(ref terminal) = self.terminal {
			if let Err(e) = terminal.give_to(pgid) {
				debug!(error = %e, "tcsetpgrp failed");
			}
		}
	}

	pub fn reclaim_terminal(&self) {
		if let Some(ref terminal) = self.terminal {
			if let Err(e) = terminal.reclaim() {
				debug!(error = %e, "tcsetpgrp failed");
			}
		}
	}
}
