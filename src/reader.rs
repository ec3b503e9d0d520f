use std::mem;

use nix::errno::Errno;
use nix::unistd;

pub enum Line {
	Text(Vec<u8>),
	Interrupted,
	Eof,
}

/// Reads stdin one byte at a time, so nothing past the newline is taken
/// away from the commands the line starts, and SIGINT aborts the read.
pub struct LineReader {
	buf: Vec<u8>,
}

impl LineReader {
	pub fn new() -> LineReader {
		LineReader { buf: vec![] }
	}

	pub fn read_line(&mut self) -> nix::Result<Line> {
		let mut byte = [0u8; 1];
		loop {
			match unistd::read(libc::STDIN_FILENO, &mut byte) {
				Ok(0) if self.buf.is_empty() => return Ok(Line::Eof),
				Ok(0) => return Ok(Line::Text(mem::take(&mut self.buf))),
				Ok(_) => {
					self.buf.push(byte[0]);
					if byte[0] == b'\n' {
						return Ok(Line::Text(mem::take(&mut self.buf)));
					}
				},
				Err(Errno::EINTR) => {
					self.buf.clear();
					return Ok(Line::Interrupted);
				},
				Err(e) => return Err(e),
			}
		}
	}
}

impl Default for LineReader {
	fn default() -> LineReader {
		LineReader::new()
	}
}
