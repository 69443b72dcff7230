use std::collections::HashMap;
use std::ffi::CString;
use std::{env, fs, io};

/// Maps executable names to absolute paths, built by scanning `$PATH`
/// once. Lookups feed `execve` directly. Directories earlier in `$PATH`
/// win on duplicate names. Names containing '/' never reach the cache;
/// the dispatcher execs those as given.
pub struct SearchCache {
	imp: HashMap<CString, CString>,
}

const PATH_KEY: &str = "PATH";

impl SearchCache {
	pub fn new() -> SearchCache {
		let mut this = SearchCache { imp: HashMap::new() };
		this.rehash();
		this
	}

	fn add_entry(&mut self, entry: io::Result<fs::DirEntry>) -> io::Result<()> {
		use std::os::unix::ffi::OsStringExt;
		let e = entry?;
		let file_name = CString::new(e.file_name().into_vec())?;
		let path = CString::new(e.path().into_os_string().into_vec())?;
		self.imp.entry(file_name).or_insert(path);
		Ok(())
	}

	pub fn rehash(&mut self) {
		self.imp.clear();
		let paths = match env::var_os(PATH_KEY) {
			Some(paths) => paths,
			None => return,
		};
		for dir in env::split_paths(&paths) {
			if let Ok(entries) = fs::read_dir(dir) {
				for entry in entries {
					let _ = self.add_entry(entry);
				}
			}
		}
		log::debug!("search cache rebuilt, {} entries", self.imp.len());
	}

	pub fn lookup(&self, name: &CString) -> Option<&CString> {
		self.imp.get(name)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn finds_binaries_on_path() {
		let cache = SearchCache::new();
		let sh = CString::new("sh").unwrap();
		// every Unix worth the name has sh somewhere on PATH
		if let Some(path) = cache.lookup(&sh) {
			assert!(path.to_bytes().ends_with(b"/sh"));
		}
	}

	#[test]
	fn misses_return_none() {
		let cache = SearchCache::new();
		let name = CString::new("definitely-not-an-executable-msh").unwrap();
		assert!(cache.lookup(&name).is_none());
	}
}
