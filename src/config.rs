//! Run configuration derived from the input path

use std::path::{Path, PathBuf};

/// Bytes of the stream listed when a player slot cannot be resolved
pub const DEFAULT_DISASSEMBLY_BYTES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: PathBuf,
    /// `<stem>_spheres_readable.txt` next to the input
    pub report_path: PathBuf,
    /// `<input>.raw.pickle`
    pub raw_dump_path: PathBuf,
    /// `<input>.decoded.txt`
    pub decoded_dump_path: PathBuf,
    pub write_raw_dump: bool,
    pub write_decoded_dump: bool,
    pub ranking: bool,
    pub disassembly_bytes: usize,
}

impl Config {
    /// Ranking report only, no side outputs
    pub fn for_input(input: impl AsRef<Path>) -> Self {
        let input = input.as_ref().to_path_buf();
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let report_path = input.with_file_name(format!("{}_spheres_readable.txt", stem));

        Config {
            raw_dump_path: append_extension(&input, "raw.pickle"),
            decoded_dump_path: append_extension(&input, "decoded.txt"),
            report_path,
            input,
            write_raw_dump: false,
            write_decoded_dump: false,
            ranking: true,
            disassembly_bytes: DEFAULT_DISASSEMBLY_BYTES,
        }
    }

    /// Plain report plus both diagnostic dumps
    pub fn dump_for_input(input: impl AsRef<Path>) -> Self {
        Config {
            write_raw_dump: true,
            write_decoded_dump: true,
            ranking: false,
            ..Config::for_input(input)
        }
    }

    /// File name shown in the report header
    pub fn source_name(&self) -> String {
        self.input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
