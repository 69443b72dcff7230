use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const SIGINT_ACK: &[u8] = b"\nmsh: caught interrupt\n";
const SIGQUIT_ACK: &[u8] = b"\nmsh: caught quit\n";

// Handlers may only call async-signal-safe functions: a single raw
// write, no allocation, no locks.
fn write_ack(msg: &[u8]) {
	unsafe {
		let _ = libc::write(
			libc::STDOUT_FILENO,
			msg.as_ptr() as *const libc::c_void,
			msg.len(),
		);
	}
}

extern "C" fn on_sigint(_: libc::c_int) {
	write_ack(SIGINT_ACK);
}

extern "C" fn on_sigquit(_: libc::c_int) {
	write_ack(SIGQUIT_ACK);
}

/// Keep interrupt and quit from killing the interpreter itself. SA_RESTART
/// resumes the interrupted read or wait after the acknowledgment, so
/// control returns to wherever the shell was blocked. execve resets caught
/// dispositions, so foreground children still die on Ctrl-C as usual.
pub fn install() -> nix::Result<()> {
	let int_action = SigAction::new(
		SigHandler::Handler(on_sigint),
		SaFlags::SA_RESTART,
		SigSet::empty(),
	);
	let quit_action = SigAction::new(
		SigHandler::Handler(on_sigquit),
		SaFlags::SA_RESTART,
		SigSet::empty(),
	);
	unsafe {
		sigaction(Signal::SIGINT, &int_action)?;
		sigaction(Signal::SIGQUIT, &quit_action)?;
	}
	Ok(())
}
