use std::path::PathBuf;

use nix::unistd;

use crate::search;

/// Per-session state. The working directory is held as an explicit field
/// rather than read back from the OS on demand: `cd` is the only writer,
/// and `pwd`/`ls` read it. The process-wide cwd is kept in sync so that
/// forked children inherit it.
pub struct State {
	pub cwd: PathBuf,
	pub search_cache: search::SearchCache,
}

impl State {
	pub fn new() -> State {
		let cwd = unistd::getcwd().unwrap_or_else(|_| PathBuf::from("/"));
		State {
			cwd,
			search_cache: search::SearchCache::new(),
		}
	}
}
