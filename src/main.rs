mod builtin;
mod eval;
mod global;
mod parser;
mod redirect;
mod search;
mod signal;

use std::io;
use std::io::{BufRead, Write};

const PROMPT: &[u8] = b"msh> ";
const FAREWELL: &[u8] = b"bye\n";

fn main() {
	env_logger::init();

	if let Err(e) = signal::install() {
		let _ = writeln!(io::stderr(), "msh: sigaction: {}", e);
	}

	let mut state = global::State::new();
	let stdin = io::stdin();
	let mut stdout = io::stdout();

	loop {
		eval::reap_background();

		let _ = stdout.write_all(PROMPT);
		let _ = stdout.flush();

		let mut line: Vec<u8> = vec![];
		match stdin.lock().read_until(b'\n', &mut line) {
			Ok(0) => {
				// end of input on the prompt
				let _ = stdout.write_all(b"\n");
				break;
			}
			Ok(_) => {}
			Err(e) => {
				let _ = writeln!(io::stderr(), "msh: read: {}", e);
				break;
			}
		}
		if line.last() == Some(&b'\n') {
			line.pop();
		}

		if line == b"exit" {
			break;
		}

		match parser::parse(&line) {
			Ok(Some(mut input)) => {
				eval::dispatch(&mut state, &mut input.argv, input.background)
			}
			Ok(None) => {}
			Err(e) => {
				let _ = writeln!(io::stderr(), "msh: {}", e);
			}
		}
	}

	let _ = stdout.write_all(FAREWELL);
	let _ = stdout.flush();
}
