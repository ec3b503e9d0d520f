use std::env;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path,PathBuf};

use nix::unistd::{self,AccessFlags};

const PATH_KEY: &str = "PATH";

fn is_executable(path: &Path) -> bool {
	unistd::access(path, AccessFlags::X_OK).is_ok()
}

/// Resolves a program name against `$PATH`. Names containing a `/` are
/// taken as paths and only checked for execute permission.
pub fn lookup(name: &[u8]) -> Option<PathBuf> {
	let path_list = env::var_os(PATH_KEY);
	lookup_in(name, path_list.as_deref())
}

pub fn lookup_in(name: &[u8], path_list: Option<&OsStr>) -> Option<PathBuf> {
	if name.is_empty() {
		return None;
	}
	let name = OsStr::from_bytes(name);
	if name.as_bytes().contains(&b'/') {
		let path = Path::new(name);
		return if is_executable(path) { Some(path.to_path_buf()) } else { None };
	}
	env::split_paths(path_list?)
		.filter(|dir| !dir.as_os_str().is_empty())
		.map(|dir| dir.join(name))
		.find(|path| !path.is_dir() && is_executable(path))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::os::unix::fs::PermissionsExt;

	fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
		let path = dir.join(name);
		fs::write(&path, b"#!/bin/sh\n").unwrap();
		fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
		path
	}

	#[test]
	fn searches_in_order() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		make_file(first.path(), "tool", 0o644);
		let expected = make_file(second.path(), "tool", 0o755);
		make_file(second.path(), "other", 0o755);
		let list = env::join_paths([first.path(), second.path()]).unwrap();
		assert_eq!(lookup_in(b"tool", Some(&list)), Some(expected));
		assert_eq!(lookup_in(b"missing", Some(&list)), None);
		assert_eq!(lookup_in(b"tool", None), None);
	}

	#[test]
	fn skips_empty_entries_and_directories() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir(dir.path().join("sub")).unwrap();
		let expected = make_file(dir.path(), "run", 0o700);
		let mut list = std::ffi::OsString::from("::");
		list.push(dir.path());
		assert_eq!(lookup_in(b"run", Some(&list)), Some(expected));
		assert_eq!(lookup_in(b"sub", Some(&list)), None);
		assert_eq!(lookup_in(b"", Some(&list)), None);
	}

	#[test]
	fn direct_paths() {
		let dir = tempfile::tempdir().unwrap();
		let exec = make_file(dir.path(), "x", 0o755);
		let plain = make_file(dir.path(), "y", 0o644);
		assert_eq!(lookup_in(exec.as_os_str().as_bytes(), None), Some(exec.clone()));
		assert_eq!(lookup_in(plain.as_os_str().as_bytes(), None), None);
	}
}
