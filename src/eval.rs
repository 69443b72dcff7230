use std::ffi::{self, CString};
use std::io;
use std::io::Write;
use std::os::unix::ffi::OsStringExt;
use std::{env, error, fmt};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::builtin;
use crate::global;
use crate::redirect;

#[derive(Debug)]
pub enum ExecError {
	Nix(nix::Error),
	Nul(ffi::NulError),
}

impl From<nix::Error> for ExecError {
	fn from(e: nix::Error) -> ExecError {
		ExecError::Nix(e)
	}
}

impl From<ffi::NulError> for ExecError {
	fn from(e: ffi::NulError) -> ExecError {
		ExecError::Nul(e)
	}
}

impl fmt::Display for ExecError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ExecError::Nix(e) => write!(f, "exec failed: {}", e),
			ExecError::Nul(e) => write!(f, "argument contains NUL: {}", e),
		}
	}
}

impl error::Error for ExecError {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			ExecError::Nix(e) => Some(e),
			ExecError::Nul(e) => Some(e),
		}
	}
}

/// Run one parsed command. Builtins execute in this process (a forked
/// `cd` would be invisible here); everything else forks, and the child
/// resolves redirections before replacing its image. Foreground commands
/// are waited for with their status discarded; background commands are
/// left to the reap sweep.
pub fn dispatch(state: &mut global::State, argv: &mut Vec<&[u8]>, background: bool) {
	if let Some(handler) = builtin::match_builtin(argv[0]) {
		let status = handler(state, &argv[1..]);
		log::debug!(
			"builtin {} exited {}",
			String::from_utf8_lossy(argv[0]),
			status
		);
		return;
	}

	match unsafe { unistd::fork() } {
		Ok(ForkResult::Child) => redirect::resolve_and_exec(state, argv),
		Ok(ForkResult::Parent { child }) => {
			log::debug!(
				"spawned {} as pid {} (background: {})",
				String::from_utf8_lossy(argv[0]),
				child,
				background
			);
			if !background {
				wait_foreground(child);
			}
		}
		Err(e) => {
			let _ = writeln!(io::stderr(), "msh: fork: {}", e);
		}
	}
}

fn wait_foreground(child: Pid) {
	loop {
		match waitpid(child, None) {
			// a handled signal interrupts the wait; resume it
			Err(Errno::EINTR) => continue,
			// exit status is deliberately discarded
			_ => break,
		}
	}
}

/// Collect any background children that have exited since the last
/// prompt. Non-blocking; stops at the first still-running child or when
/// there are no children at all (ECHILD).
pub fn reap_background() {
	loop {
		match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => break,
			Ok(status) => {
				if let Some(pid) = status.pid() {
					log::debug!("reaped background pid {}", pid);
				}
			}
			Err(_) => break,
		}
	}
}

/// Replace this process image with `argv`, or exit: 127 when the command
/// cannot be found, 126 when anything else goes wrong. Must only ever run
/// in a forked child.
pub fn exec_or_die(state: &global::State, argv: &[&[u8]]) -> ! {
	let status = exec_image(state, argv).unwrap_or_else(|e| {
		let _ = writeln!(io::stderr(), "msh: {}", e);
		126
	});
	unsafe { libc::_exit(status as libc::c_int) }
}

fn exec_image(state: &global::State, argv: &[&[u8]]) -> Result<u8, ExecError> {
	let name = argv[0];
	let cmd = CString::new(name.to_vec())?;
	let path = if name.contains(&b'/') {
		&cmd
	} else {
		match state.search_cache.lookup(&cmd) {
			Some(path) => path,
			None => {
				let mut stderr = io::stderr();
				let _ = stderr.write_all(b"msh: command not found: ");
				let _ = stderr.write_all(name);
				let _ = stderr.write_all(b"\n");
				let _ = stderr.flush();
				return Ok(127);
			}
		}
	};
	let argv_c = argv
		.iter()
		.map(|&arg| CString::new(arg.to_vec()))
		.collect::<Result<Vec<CString>, ffi::NulError>>()?;
	let envp = env::vars_os()
		.map(|(mut key, value)| {
			key.push("=");
			key.push(&value);
			CString::new(key.into_vec())
		})
		.collect::<Result<Vec<CString>, ffi::NulError>>()?;
	unistd::execve(path, &argv_c, &envp)?;
	unreachable!()
}
