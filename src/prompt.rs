use std::env;
use std::io::{self,Write};
use std::path::Path;

use nix::unistd;

/// Replaces a leading `home` component of `cwd` with `~`.
pub fn shorten_home(cwd: &Path, home: Option<&Path>) -> String {
	match home.and_then(|home| cwd.strip_prefix(home).ok()) {
		Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
		Some(rest) => format!("~/{}", rest.display()),
		None => cwd.display().to_string(),
	}
}

pub fn render(status: u8) -> String {
	let user = env::var("USER").unwrap_or_else(|_| "?".to_string());
	let host = unistd::gethostname().map(|h| h.to_string_lossy().into_owned()).unwrap_or_else(|_| "?".to_string());
	let home = env::var_os("HOME");
	let cwd = env::current_dir()
		.map(|cwd| shorten_home(&cwd, home.as_ref().map(Path::new)))
		.unwrap_or_else(|_| "?".to_string());
	format!("\n{}@{}: {}\n[{}]-> ", user, host, cwd, status)
}

pub fn print(status: u8) -> io::Result<()> {
	let mut stdout = io::stdout();
	stdout.write_all(render(status).as_bytes())?;
	stdout.flush()
}
