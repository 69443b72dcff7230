pub type ParseResult<T> = Result<T, String>;

/// Hard bound on the number of tokens accepted from a single line.
/// Exceeding it is an error, never a silent truncation.
pub const MAX_ARGS: usize = 100;

#[derive(Debug, PartialEq, Eq)]
pub struct Input<'a> {
	pub argv: Vec<&'a [u8]>,
	pub background: bool,
}

fn is_whitespace(c: u8) -> bool {
	matches!(c, b' ' | b'\t' | b'\n')
}

/// Split a line into whitespace-delimited tokens. Runs of spaces and tabs
/// collapse; there is no quoting or escaping. `Ok(None)` means a blank
/// line, which the caller must not dispatch.
pub fn parse(line: &[u8]) -> ParseResult<Option<Input>> {
	let mut argv: Vec<&[u8]> = vec![];
	for word in line.split(|&c| is_whitespace(c)) {
		if word.is_empty() {
			continue;
		}
		if argv.len() == MAX_ARGS {
			return Err(format!("too many arguments (limit {})", MAX_ARGS));
		}
		argv.push(word);
	}
	if argv.is_empty() {
		return Ok(None);
	}

	let mut background = false;
	if argv[argv.len() - 1] == b"&" {
		argv.pop();
		background = true;
		if argv.is_empty() {
			return Err("missing command before '&'".to_string());
		}
	}

	Ok(Some(Input { argv, background }))
}

#[cfg(test)]
mod test {
	use super::*;

	fn argv<'a>(input: &Option<Input<'a>>) -> Vec<&'a [u8]> {
		input.as_ref().unwrap().argv.clone()
	}

	#[test]
	fn splits_on_whitespace() {
		let parsed = parse(b"ls -la /tmp").unwrap();
		assert_eq!(argv(&parsed), vec![&b"ls"[..], b"-la", b"/tmp"]);
		assert!(!parsed.unwrap().background);
	}

	#[test]
	fn collapses_runs_and_tabs() {
		let parsed = parse(b"  cp \t a.txt \t\t b.txt \n").unwrap();
		assert_eq!(argv(&parsed), vec![&b"cp"[..], b"a.txt", b"b.txt"]);
	}

	#[test]
	fn blank_lines_yield_nothing() {
		assert_eq!(parse(b"").unwrap(), None);
		assert_eq!(parse(b"   \t  \n").unwrap(), None);
	}

	#[test]
	fn trailing_ampersand_marks_background() {
		let parsed = parse(b"sleep 10 &").unwrap().unwrap();
		assert_eq!(parsed.argv, vec![&b"sleep"[..], b"10"]);
		assert!(parsed.background);
	}

	#[test]
	fn interior_ampersand_is_an_argument() {
		let parsed = parse(b"grep & file").unwrap().unwrap();
		assert_eq!(parsed.argv, vec![&b"grep"[..], b"&", b"file"]);
		assert!(!parsed.background);
	}

	#[test]
	fn lone_ampersand_is_an_error() {
		assert!(parse(b"&").is_err());
		assert!(parse(b"  & ").is_err());
	}

	#[test]
	fn argument_bound_fails_loudly() {
		let line = b"x ".repeat(MAX_ARGS + 1);
		assert!(parse(&line).is_err());
		let line = b"x ".repeat(MAX_ARGS);
		assert!(parse(&line).is_ok());
	}
}
