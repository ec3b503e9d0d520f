use std::os::unix::io::RawFd;

pub type Word = Vec<u8>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stream { Stdin = 0, Stdout = 1, Stderr = 2 }

impl Stream {
	pub const ALL: [Stream; 3] = [Stream::Stdin, Stream::Stdout, Stream::Stderr];

	pub fn fd(self) -> RawFd {
		self as RawFd
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: Word,
	pub append: bool,
}

/// One pipeline stage. `args[0]` is the program name; the parser never
/// hands out a command with no arguments.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Command {
	pub args: Vec<Word>,
	pub redirects: [Option<Redirect>; 3],
}

impl Command {
	pub fn name(&self) -> &[u8] {
		self.args.first().map_or(&[][..], |w| &w[..])
	}

	pub fn redirect(&self, stream: Stream) -> Option<&Redirect> {
		self.redirects[stream as usize].as_ref()
	}

	pub fn has_redirects(&self) -> bool {
		self.redirects.iter().any(Option::is_some)
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub commands: Vec<Command>,
	pub is_background: bool,
}

impl Pipeline {
	/// Text shown by `jobs` and job notifications.
	pub fn display(&self) -> String {
		let stages: Vec<String> = self.commands.iter().map(|command| {
			let args: Vec<String> = command.args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect();
			args.join(" ")
		}).collect();
		let mut text = stages.join(" | ");
		if self.is_background {
			text.push_str(" &");
		}
		text
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn command(args: &[&str]) -> Command {
		Command { args: args.iter().map(|a| a.as_bytes().to_vec()).collect(), ..Command::default() }
	}

	#[test]
	fn display_joins_stages() {
		let pipeline = Pipeline {
			commands: vec![command(&["ls", "-l"]), command(&["wc", "-l"])],
			is_background: true,
		};
		assert_eq!(pipeline.display(), "ls -l | wc -l &");
	}

	#[test]
	fn redirect_slots() {
		let mut c = command(&["cat"]);
		assert!(!c.has_redirects());
		c.redirects[Stream::Stderr as usize] = Some(Redirect { target: b"err".to_vec(), append: true });
		assert!(c.has_redirects());
		assert_eq!(c.redirect(Stream::Stderr).map(|r| r.append), Some(true));
		assert!(c.redirect(Stream::Stdout).is_none());
		assert_eq!(Stream::Stderr.fd(), 2);
	}
}
