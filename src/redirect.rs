use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;

use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult};

use crate::eval;
use crate::global;

#[derive(Debug)]
pub enum RedirError {
	MissingTarget(&'static [u8]),
	Open(Vec<u8>, io::Error),
}

impl fmt::Display for RedirError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RedirError::MissingTarget(op) => {
				write!(f, "missing filename after '{}'", String::from_utf8_lossy(op))
			}
			RedirError::Open(name, e) => {
				write!(f, "cannot open {}: {}", String::from_utf8_lossy(name), e)
			}
		}
	}
}

/// Stream wiring derived from the argument vector. The `File` handles own
/// the descriptors; std opens them close-on-exec, so whichever path the
/// child takes, nothing leaks past execve.
pub struct Redirections {
	input: Option<fs::File>,
	output: Option<fs::File>,
}

/// Splice the first `op` and its operand out of the vector, returning the
/// operand. Later occurrences are left in place and reach the command as
/// ordinary arguments.
fn take_operand<'a>(
	argv: &mut Vec<&'a [u8]>,
	op: &'static [u8],
) -> Result<Option<&'a [u8]>, RedirError> {
	let i = match argv.iter().position(|t| *t == op) {
		Some(i) => i,
		None => return Ok(None),
	};
	if i + 1 >= argv.len() {
		return Err(RedirError::MissingTarget(op));
	}
	let target = argv[i + 1];
	argv.drain(i..=i + 1);
	Ok(Some(target))
}

/// Split at the first `|`. The left command stays in `argv`, the right
/// command is returned, the operator lands in neither.
fn split_pipe<'a>(argv: &mut Vec<&'a [u8]>) -> Option<Vec<&'a [u8]>> {
	let i = argv.iter().position(|t| *t == b"|")?;
	let right = argv.split_off(i + 1);
	argv.pop();
	Some(right)
}

impl Redirections {
	/// Resolution order is load-bearing: `<` first, then `>`, then the
	/// caller splits on `|`. Open failures are fail-closed: the caller
	/// must not execute anything.
	fn extract(argv: &mut Vec<&[u8]>) -> Result<Redirections, RedirError> {
		let input = match take_operand(argv, b"<")? {
			Some(name) => Some(
				fs::File::open(std::ffi::OsStr::from_bytes(name))
					.map_err(|e| RedirError::Open(name.to_vec(), e))?,
			),
			None => None,
		};
		let output = match take_operand(argv, b">")? {
			Some(name) => Some(
				fs::File::create(std::ffi::OsStr::from_bytes(name))
					.map_err(|e| RedirError::Open(name.to_vec(), e))?,
			),
			None => None,
		};
		Ok(Redirections { input, output })
	}

	fn apply(self) -> nix::Result<()> {
		if let Some(file) = &self.input {
			unistd::dup2(file.as_raw_fd(), libc::STDIN_FILENO)?;
		}
		if let Some(file) = &self.output {
			unistd::dup2(file.as_raw_fd(), libc::STDOUT_FILENO)?;
		}
		// self drops here: the originals close, only 0/1 stay rewired
		Ok(())
	}
}

fn die(msg: fmt::Arguments) -> ! {
	let _ = writeln!(io::stderr(), "msh: {}", msg);
	unsafe { libc::_exit(1) }
}

/// Child-side entry point: resolve shell syntax into stream wiring, then
/// replace this process image (and, for a pipe, a second forked one).
/// Never returns; every failure path reports and exits non-zero.
pub fn resolve_and_exec(state: &global::State, argv: &mut Vec<&[u8]>) -> ! {
	let redir = match Redirections::extract(argv) {
		Ok(redir) => redir,
		Err(e) => die(format_args!("{}", e)),
	};

	match split_pipe(argv) {
		Some(right) => run_pipe(state, argv, &right, redir),
		None => {
			if argv.is_empty() {
				die(format_args!("missing command"));
			}
			if let Err(e) = redir.apply() {
				die(format_args!("dup2: {}", e));
			}
			eval::exec_or_die(state, argv)
		}
	}
}

/// One pipe stage. The forked process becomes the right-hand command with
/// stdin on the pipe's read end; the current process becomes the left-hand
/// command with stdout on the write end. A `<` taken from the line lands on
/// the left command's stdin, a `>` on the right command's stdout, so file
/// redirections compose with the pipe instead of being dropped. Each side
/// drops the end it does not use; the used ends close at exec (O_CLOEXEC).
fn run_pipe(state: &global::State, left: &[&[u8]], right: &[&[u8]], redir: Redirections) -> ! {
	if left.is_empty() || right.is_empty() {
		die(format_args!("missing command around '|'"));
	}

	let (pipe_read, pipe_write) = match unistd::pipe2(OFlag::O_CLOEXEC) {
		Ok(ends) => ends,
		Err(e) => die(format_args!("pipe: {}", e)),
	};
	let Redirections { input, output } = redir;

	match unsafe { unistd::fork() } {
		Ok(ForkResult::Child) => {
			drop(pipe_write);
			drop(input);
			if let Err(e) = unistd::dup2(pipe_read.as_raw_fd(), libc::STDIN_FILENO) {
				die(format_args!("dup2: {}", e));
			}
			if let Some(file) = &output {
				if let Err(e) = unistd::dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
					die(format_args!("dup2: {}", e));
				}
			}
			drop(pipe_read);
			drop(output);
			eval::exec_or_die(state, right)
		}
		Ok(ForkResult::Parent { .. }) => {
			drop(pipe_read);
			drop(output);
			if let Err(e) = unistd::dup2(pipe_write.as_raw_fd(), libc::STDOUT_FILENO) {
				die(format_args!("dup2: {}", e));
			}
			if let Some(file) = &input {
				if let Err(e) = unistd::dup2(file.as_raw_fd(), libc::STDIN_FILENO) {
					die(format_args!("dup2: {}", e));
				}
			}
			drop(pipe_write);
			drop(input);
			eval::exec_or_die(state, left)
		}
		Err(e) => die(format_args!("fork: {}", e)),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn argv(tokens: &[&'static [u8]]) -> Vec<&'static [u8]> {
		tokens.to_vec()
	}

	#[test]
	fn takes_operator_and_filename() {
		let mut v = argv(&[b"sort", b"<", b"in.txt", b"-r"]);
		let target = take_operand(&mut v, b"<").unwrap();
		assert_eq!(target, Some(&b"in.txt"[..]));
		assert_eq!(v, vec![&b"sort"[..], b"-r"]);
	}

	#[test]
	fn absent_operator_leaves_vector_alone() {
		let mut v = argv(&[b"ls", b"-la"]);
		assert_eq!(take_operand(&mut v, b">").unwrap(), None);
		assert_eq!(v, vec![&b"ls"[..], b"-la"]);
	}

	#[test]
	fn missing_filename_is_an_error() {
		let mut v = argv(&[b"sort", b"<"]);
		assert!(take_operand(&mut v, b"<").is_err());
	}

	#[test]
	fn only_first_occurrence_is_honored() {
		let mut v = argv(&[b"a", b">", b"one", b">", b"two"]);
		let target = take_operand(&mut v, b">").unwrap();
		assert_eq!(target, Some(&b"one"[..]));
		// the second pair stays behind as plain arguments
		assert_eq!(v, vec![&b"a"[..], b">", b"two"]);
	}

	#[test]
	fn pipe_splits_without_the_operator() {
		let mut v = argv(&[b"ls", b"-l", b"|", b"wc", b"-l"]);
		let right = split_pipe(&mut v).unwrap();
		assert_eq!(v, vec![&b"ls"[..], b"-l"]);
		assert_eq!(right, vec![&b"wc"[..], b"-l"]);
	}

	#[test]
	fn no_pipe_returns_none() {
		let mut v = argv(&[b"ls", b"-l"]);
		assert!(split_pipe(&mut v).is_none());
		assert_eq!(v, vec![&b"ls"[..], b"-l"]);
	}

	#[test]
	fn pipe_at_edge_leaves_empty_side() {
		let mut v = argv(&[b"ls", b"|"]);
		let right = split_pipe(&mut v).unwrap();
		assert_eq!(v, vec![&b"ls"[..]]);
		assert!(right.is_empty());
	}

	#[test]
	fn operators_extract_from_both_sides_of_pipe() {
		let mut v = argv(&[b"sort", b"<", b"in.txt", b"|", b"head", b">", b"out.txt"]);
		assert_eq!(take_operand(&mut v, b"<").unwrap(), Some(&b"in.txt"[..]));
		assert_eq!(take_operand(&mut v, b">").unwrap(), Some(&b"out.txt"[..]));
		let right = split_pipe(&mut v).unwrap();
		assert_eq!(v, vec![&b"sort"[..]]);
		assert_eq!(right, vec![&b"head"[..]]);
	}
}
