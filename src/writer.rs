use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Unable to write {0}: {1}")]
    WriteError(String, String),
}

/// Writes the rendered document to `destination`, or to stdout when none
/// is given.
pub fn write(destination: Option<&Path>, contents: &str) -> Result<(), Error> {
    match destination {
        Some(path) => write_file(path, contents),
        None => write_stdout(contents),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    let mut file_contents = String::from(contents);
    if !file_contents.ends_with('\n') {
        file_contents.push('\n');
    }

    fs::write(path, file_contents)
        .map_err(|error| Error::WriteError(path.display().to_string(), error.to_string()))
}

fn write_stdout(contents: &str) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", contents.trim_end_matches('\n'))
        .and_then(|_| handle.flush())
        .map_err(|error| Error::WriteError(String::from("stdout"), error.to_string()))
}
