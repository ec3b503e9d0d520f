use crate::error::ParseError;
use crate::types::Word;

pub const MAX_WORD_LEN: usize = 4095;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
	Word(Word),
	Pipe,
	RedirectIn,
	RedirectOut,
	AppendOut,
	RedirectErr,
	AppendErr,
	Background,
	End,
}

pub struct Lexer<'a> {
	line: &'a [u8],
	i: usize,
	home: Option<&'a [u8]>,
}

impl<'a> Lexer<'a> {
	pub fn new(line: &'a [u8], home: Option<&'a [u8]>) -> Lexer<'a> {
		Lexer { line: line, i: 0, home: home }
	}

	fn peek(&self, offset: usize) -> Option<u8> {
		self.line.get(self.i + offset).cloned()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\r' | b'\n' => true,
			_ => false,
		}
	}

	fn is_delimiter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => true,
			_ => Lexer::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Lexer::is_whitespace);
	}

	pub fn next_token(&mut self) -> ParseResult<Token> {
		self.skip_whitespaces();
		let c = match self.peek(0) {
			Some(c) => c,
			None => return Ok(Token::End),
		};
		let (token, len) = match (c, self.peek(1), self.peek(2)) {
			(b'|', ..) => (Token::Pipe, 1),
			(b'&', ..) => (Token::Background, 1),
			(b'<', ..) => (Token::RedirectIn, 1),
			(b'>', Some(b'>'), _) => (Token::AppendOut, 2),
			(b'>', ..) => (Token::RedirectOut, 1),
			(b'2', Some(b'>'), Some(b'>')) => (Token::AppendErr, 3),
			(b'2', Some(b'>'), _) => (Token::RedirectErr, 2),
			_ => return self.read_word().map(Token::Word),
		};
		self.i += len;
		Ok(token)
	}

	fn expands_tilde(&self) -> bool {
		self.peek(0) == Some(b'~') && match self.peek(1) {
			None | Some(b'/') => true,
			Some(c) => Lexer::is_delimiter(c),
		}
	}

	fn read_word(&mut self) -> ParseResult<Word> {
		let mut word: Word = vec![];
		if self.expands_tilde() {
			let home = self.home.ok_or(ParseError::HomeNotSet)?;
			word.extend_from_slice(home);
			self.i += 1;
		}

		let mut quote: Option<u8> = None;
		loop {
			let c = match self.peek(0) {
				Some(c) => c,
				None if quote.is_some() => return Err(ParseError::UnterminatedQuote),
				None => break,
			};
			match (quote, c) {
				(None, b'\'') | (None, b'"') => quote = Some(c),
				(Some(q), _) if q == c => quote = None,
				(Some(b'"'), b'\\') if self.peek(1) == Some(b'"') || self.peek(1) == Some(b'\\') => {
					self.i += 1;
					word.push(self.line[self.i]);
				},
				(None, _) if Lexer::is_delimiter(c) => break,
				_ => word.push(c),
			}
			self.i += 1;
			if word.len() > MAX_WORD_LEN {
				return Err(ParseError::WordTooLong);
			}
		}
		Ok(word)
	}
}
