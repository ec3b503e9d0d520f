use std::env;
use std::mem;
use std::os::unix::ffi::OsStrExt;

use tracing::trace;

use crate::error::ParseError;
use crate::lexer::{Lexer,ParseResult,Token};
use crate::types::*;

struct Parser<'a> {
	lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
	fn parse_redirect(&mut self, command: &mut Command, stream: Stream, append: bool, op: &'static str) -> ParseResult<()> {
		let slot = &mut command.redirects[stream as usize];
		if slot.is_some() {
			return Err(ParseError::BadRedirect(op));
		}
		match self.lexer.next_token()? {
			Token::Word(target) => {
				*slot = Some(Redirect { target: target, append: append });
				Ok(())
			},
			_ => Err(ParseError::BadRedirect(op)),
		}
	}

	fn parse_pipeline(&mut self) -> ParseResult<Option<Pipeline>> {
		let mut commands: Vec<Command> = vec![];
		let mut current = Command::default();
		let mut is_background = false;

		loop {
			let token = self.lexer.next_token()?;
			trace!(?token, "lexed");
			match token {
				Token::Word(word) => current.args.push(word),
				Token::Pipe => {
					if current.args.is_empty() {
						return Err(ParseError::EmptyStage("|"));
					}
					commands.push(mem::take(&mut current));
				},
				Token::RedirectIn => self.parse_redirect(&mut current, Stream::Stdin, false, "<")?,
				Token::RedirectOut => self.parse_redirect(&mut current, Stream::Stdout, false, ">")?,
				Token::AppendOut => self.parse_redirect(&mut current, Stream::Stdout, true, ">>")?,
				Token::RedirectErr => self.parse_redirect(&mut current, Stream::Stderr, false, "2>")?,
				Token::AppendErr => self.parse_redirect(&mut current, Stream::Stderr, true, "2>>")?,
				Token::Background => {
					if current.args.is_empty() {
						return Err(ParseError::EmptyStage("&"));
					}
					is_background = true;
					if self.lexer.next_token()? != Token::End {
						return Err(ParseError::TrailingInput);
					}
					break;
				},
				Token::End => break,
			}
		}

		if current.args.is_empty() {
			if commands.is_empty() && !current.has_redirects() {
				return Ok(None);
			}
			return Err(ParseError::ExpectedCommand);
		}
		commands.push(current);
		Ok(Some(Pipeline { commands: commands, is_background: is_background }))
	}
}

/// Parses one input line. A blank line yields `Ok(None)`.
pub fn parse(line: &[u8]) -> ParseResult<Option<Pipeline>> {
	let home = env::var_os("HOME");
	parse_with_home(line, home.as_ref().map(|h| h.as_bytes()))
}

pub fn parse_with_home(line: &[u8], home: Option<&[u8]>) -> ParseResult<Option<Pipeline>> {
	let mut parser = Parser { lexer: Lexer::new(line, home) };
	parser.parse_pipeline()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(line: &str) -> ParseResult<Option<Pipeline>> {
		parse_with_home(line.as_bytes(), Some(b"/home/me"))
	}

	fn args(command: &Command) -> Vec<&str> {
		command.args.iter().map(|a| std::str::from_utf8(a).unwrap()).collect()
	}

	fn target(command: &Command, stream: Stream) -> Option<(&str, bool)> {
		command.redirect(stream).map(|r| (std::str::from_utf8(&r.target).unwrap(), r.append))
	}

	#[test]
	fn single_command() {
		let p = parse("echo \"a b\" c").unwrap().unwrap();
		assert_eq!(p.commands.len(), 1);
		assert_eq!(args(&p.commands[0]), vec!["echo", "a b", "c"]);
		assert!(!p.is_background);
	}

	#[test]
	fn three_stage_pipeline() {
		let p = parse("cmd1 | cmd2 -x | cmd3").unwrap().unwrap();
		let names: Vec<&[u8]> = p.commands.iter().map(|c| c.name()).collect();
		assert_eq!(names, vec![&b"cmd1"[..], &b"cmd2"[..], &b"cmd3"[..]]);
		assert_eq!(args(&p.commands[1]), vec!["cmd2", "-x"]);
		assert!(p.commands.iter().all(|c| !c.has_redirects()));
	}

	#[test]
	fn quoted_pipe_is_a_word() {
		let p = parse("echo 'a|b'").unwrap().unwrap();
		assert_eq!(p.commands.len(), 1);
		assert_eq!(args(&p.commands[0]), vec!["echo", "a|b"]);
	}

	#[test]
	fn redirects() {
		let p = parse("sort < in >> out 2> err | tee ~/log 2>>e2").unwrap().unwrap();
		let (first, second) = (&p.commands[0], &p.commands[1]);
		assert_eq!(args(first), vec!["sort"]);
		assert_eq!(target(first, Stream::Stdin), Some(("in", false)));
		assert_eq!(target(first, Stream::Stdout), Some(("out", true)));
		assert_eq!(target(first, Stream::Stderr), Some(("err", false)));
		assert_eq!(args(second), vec!["tee", "/home/me/log"]);
		assert_eq!(target(second, Stream::Stdout), None);
		assert_eq!(target(second, Stream::Stderr), Some(("e2", true)));
	}

	#[test]
	fn redirect_before_arguments() {
		let p = parse("> out echo hi").unwrap().unwrap();
		assert_eq!(args(&p.commands[0]), vec!["echo", "hi"]);
		assert_eq!(target(&p.commands[0], Stream::Stdout), Some(("out", false)));
	}

	#[test]
	fn background() {
		let p = parse("sleep 5 &").unwrap().unwrap();
		assert!(p.is_background);
		assert_eq!(p.display(), "sleep 5 &");
		let p = parse("a | b&").unwrap().unwrap();
		assert!(p.is_background);
		assert_eq!(p.commands.len(), 2);
	}

	#[test]
	fn empty_lines() {
		assert_eq!(parse(""), Ok(None));
		assert_eq!(parse("  \t \n"), Ok(None));
	}

	#[test]
	fn malformed_lines() {
		assert_eq!(parse("| ls"), Err(ParseError::EmptyStage("|")));
		assert_eq!(parse("ls | | wc"), Err(ParseError::EmptyStage("|")));
		assert_eq!(parse("ls |"), Err(ParseError::ExpectedCommand));
		assert_eq!(parse("< in"), Err(ParseError::ExpectedCommand));
		assert_eq!(parse("ls >"), Err(ParseError::BadRedirect(">")));
		assert_eq!(parse("ls > | wc"), Err(ParseError::BadRedirect(">")));
		assert_eq!(parse("ls > a >> b"), Err(ParseError::BadRedirect(">>")));
		assert_eq!(parse("ls 2> a 2> b"), Err(ParseError::BadRedirect("2>")));
		assert_eq!(parse("cat < a < b"), Err(ParseError::BadRedirect("<")));
		assert_eq!(parse("&"), Err(ParseError::EmptyStage("&")));
		assert_eq!(parse("sleep 1 & ls"), Err(ParseError::TrailingInput));
		assert_eq!(parse("echo \"abc"), Err(ParseError::UnterminatedQuote));
	}

	#[test]
	fn parse_and_drop_many() {
		let lines = [
			"a", "a b c", "a | b | c | d", "a < x > y 2> z", "a >> y 2>> z | b",
			"'q w' \"e\\\"r\" | ~/bin/t", "x&",
		];
		for _ in 0..100 {
			for line in lines.iter() {
				let p = parse(line).unwrap().unwrap();
				assert!(p.commands.iter().all(|c| !c.args.is_empty()));
			}
		}
	}
}
