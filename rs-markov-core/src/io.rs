use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Reads a corpus file: one entry per line, trimmed, blank lines dropped.
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	Ok(read_file(filename)?
		.into_iter()
		.map(|line| line.trim().to_owned())
		.filter(|line| !line.is_empty())
		.collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/input.dat` + `"bin"` → `data/input.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/names.dat"` → `"names"`
/// - `"names.dat"` → `"names"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub(crate) fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory, sorted by name.
///
/// Returns file names only (no paths).
pub(crate) fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_build_output_path_swaps_extension() {
		let output = build_output_path("data/names.dat", "bin").unwrap();
		assert_eq!(output, PathBuf::from("data/names.bin"));
	}

	#[test]
	fn test_get_filename_strips_folder_and_extension() {
		assert_eq!(get_filename("./data/names.dat").unwrap(), "names");
		assert_eq!(get_filename("names.dat").unwrap(), "names");
	}

	#[test]
	fn test_read_corpus_drops_blank_lines() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "alice\n\n  bob  \r\n\ncarol").unwrap();

		let corpus = read_corpus(file.path()).unwrap();
		assert_eq!(corpus, vec!["alice", "bob", "carol"]);
	}

	#[test]
	fn test_list_files_filters_extension() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("b.dat"), "x").unwrap();
		fs::write(dir.path().join("a.dat"), "x").unwrap();
		fs::write(dir.path().join("a.bin"), "x").unwrap();

		let files = list_files(dir.path(), "dat").unwrap();
		assert_eq!(files, vec!["a.dat", "b.dat"]);
	}
}
