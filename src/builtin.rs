use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd;

use crate::global;

pub type Builtin = fn(&mut global::State, &[&[u8]]) -> u8;

/// Exact, case-sensitive match from command name to handler. Arguments
/// passed to a handler exclude the command name. Every handler runs in
/// the interpreter's own process.
pub fn match_builtin(name: &[u8]) -> Option<Builtin> {
	match name {
		b"cd" => Some(builtin_cd),
		b"pwd" => Some(builtin_pwd),
		b"ls" => Some(builtin_ls),
		b"mkdir" => Some(builtin_mkdir),
		b"rmdir" => Some(builtin_rmdir),
		b"ln" => Some(builtin_ln),
		b"cp" => Some(builtin_cp),
		b"rm" => Some(builtin_rm),
		b"mv" => Some(builtin_mv),
		b"cat" => Some(builtin_cat),
		b"rehash" => Some(builtin_rehash),
		_ => None,
	}
}

const COPY_BUF: usize = 1024;

fn arg_path(arg: &[u8]) -> &Path {
	Path::new(OsStr::from_bytes(arg))
}

fn lossy(arg: &[u8]) -> Cow<str> {
	String::from_utf8_lossy(arg)
}

pub fn builtin_cd(state: &mut global::State, args: &[&[u8]]) -> u8 {
	let path = match args.first() {
		Some(&path) => path,
		None => {
			let _ = writeln!(io::stderr(), "cd: missing operand");
			return 1;
		}
	};
	if let Err(e) = unistd::chdir(arg_path(path)) {
		let _ = writeln!(io::stderr(), "cd: {}: {}", lossy(path), e);
		return 1;
	}
	// keep the session's explicit cwd in sync with the process-wide one
	match unistd::getcwd() {
		Ok(cwd) => {
			state.cwd = cwd;
			0
		}
		Err(e) => {
			let _ = writeln!(io::stderr(), "cd: getcwd: {}", e);
			1
		}
	}
}

pub fn builtin_pwd(state: &mut global::State, _: &[&[u8]]) -> u8 {
	let _ = writeln!(io::stdout(), "{}", state.cwd.display());
	0
}

pub fn builtin_ls(state: &mut global::State, args: &[&[u8]]) -> u8 {
	let path: &Path = match args.first() {
		Some(&path) => arg_path(path),
		None => &state.cwd,
	};
	// nix::dir::Dir, unlike fs::read_dir, reports "." and ".." too
	let mut dir = match Dir::open(path, OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty()) {
		Ok(dir) => dir,
		Err(e) => {
			let _ = writeln!(io::stderr(), "ls: {}: {}", path.display(), e);
			return 1;
		}
	};
	let mut stdout = io::stdout().lock();
	for entry in dir.iter() {
		match entry {
			Ok(entry) => {
				let _ = stdout.write_all(entry.file_name().to_bytes());
				let _ = stdout.write_all(b"\n");
			}
			Err(e) => {
				let _ = writeln!(io::stderr(), "ls: {}: {}", path.display(), e);
				return 1;
			}
		}
	}
	0
}

pub fn builtin_mkdir(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let path = match args.first() {
		Some(&path) => path,
		None => {
			let _ = writeln!(io::stderr(), "mkdir: missing operand");
			return 1;
		}
	};
	match unistd::mkdir(arg_path(path), Mode::from_bits_truncate(0o755)) {
		Ok(()) => 0,
		Err(e) => {
			let _ = writeln!(io::stderr(), "mkdir: {}: {}", lossy(path), e);
			1
		}
	}
}

pub fn builtin_rmdir(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let path = match args.first() {
		Some(&path) => path,
		None => {
			let _ = writeln!(io::stderr(), "rmdir: missing operand");
			return 1;
		}
	};
	match fs::remove_dir(arg_path(path)) {
		Ok(()) => 0,
		Err(e) => {
			let _ = writeln!(io::stderr(), "rmdir: {}: {}", lossy(path), e);
			1
		}
	}
}

pub fn builtin_ln(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let (existing, new) = match (args.first(), args.get(1)) {
		(Some(&existing), Some(&new)) => (existing, new),
		_ => {
			let _ = writeln!(io::stderr(), "ln: missing file operand");
			return 1;
		}
	};
	match fs::hard_link(arg_path(existing), arg_path(new)) {
		Ok(()) => 0,
		Err(e) => {
			let _ = writeln!(io::stderr(), "ln: {}: {}", lossy(new), e);
			1
		}
	}
}

pub fn builtin_cp(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let (src, dest) = match (args.first(), args.get(1)) {
		(Some(&src), Some(&dest)) => (src, dest),
		_ => {
			let _ = writeln!(io::stderr(), "cp: missing file operand");
			return 1;
		}
	};
	let mut src_file = match fs::File::open(arg_path(src)) {
		Ok(file) => file,
		Err(e) => {
			let _ = writeln!(io::stderr(), "cp: {}: {}", lossy(src), e);
			return 1;
		}
	};
	let mut dest_file = match fs::File::create(arg_path(dest)) {
		Ok(file) => file,
		Err(e) => {
			let _ = writeln!(io::stderr(), "cp: {}: {}", lossy(dest), e);
			return 1;
		}
	};
	let mut buf = [0u8; COPY_BUF];
	loop {
		let n = match src_file.read(&mut buf) {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => {
				let _ = writeln!(io::stderr(), "cp: {}: {}", lossy(src), e);
				return 1;
			}
		};
		// partial writes are not rolled back
		if let Err(e) = dest_file.write_all(&buf[..n]) {
			let _ = writeln!(io::stderr(), "cp: {}: {}", lossy(dest), e);
			return 1;
		}
	}
	0
}

pub fn builtin_rm(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let path = match args.first() {
		Some(&path) => path,
		None => {
			let _ = writeln!(io::stderr(), "rm: missing operand");
			return 1;
		}
	};
	match fs::remove_file(arg_path(path)) {
		Ok(()) => 0,
		Err(e) => {
			let _ = writeln!(io::stderr(), "rm: {}: {}", lossy(path), e);
			1
		}
	}
}

pub fn builtin_mv(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let (old, new) = match (args.first(), args.get(1)) {
		(Some(&old), Some(&new)) => (old, new),
		_ => {
			let _ = writeln!(io::stderr(), "mv: missing file operand");
			return 1;
		}
	};
	match fs::rename(arg_path(old), arg_path(new)) {
		Ok(()) => 0,
		Err(e) => {
			let _ = writeln!(io::stderr(), "mv: {}: {}", lossy(old), e);
			1
		}
	}
}

/// Create/truncate the target and copy this process's standard input into
/// it until end-of-input. Reads go through the same buffered stdin handle
/// the REPL uses, so bytes the reader buffered past the command line are
/// captured rather than lost.
pub fn builtin_cat(_: &mut global::State, args: &[&[u8]]) -> u8 {
	let path = match args.first() {
		Some(&path) => path,
		None => {
			let _ = writeln!(io::stderr(), "cat: missing operand");
			return 1;
		}
	};
	let mut file = match fs::File::create(arg_path(path)) {
		Ok(file) => file,
		Err(e) => {
			let _ = writeln!(io::stderr(), "cat: {}: {}", lossy(path), e);
			return 1;
		}
	};
	let mut stdin = io::stdin().lock();
	let mut buf = [0u8; COPY_BUF];
	loop {
		let n = match stdin.read(&mut buf) {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => {
				let _ = writeln!(io::stderr(), "cat: read: {}", e);
				return 1;
			}
		};
		if let Err(e) = file.write_all(&buf[..n]) {
			let _ = writeln!(io::stderr(), "cat: {}: {}", lossy(path), e);
			return 1;
		}
	}
	0
}

pub fn builtin_rehash(state: &mut global::State, _: &[&[u8]]) -> u8 {
	state.search_cache.rehash();
	0
}
