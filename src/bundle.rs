//! File bundle assembly
//!
//! Packages the problem input and the submitted code into a single in-memory
//! tar archive that can be handed to the sandbox atomically. Entry names are
//! problem-scoped so multiple problems never collide inside one environment.

use crate::config::Language;
use crate::Result;
use std::io::Cursor;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// In-memory tar archive carrying the input and code files into the sandbox
#[derive(Debug)]
pub struct Bundle {
    problem: String,
    language: Language,
    bytes: Vec<u8>,
}

impl Bundle {
    /// Build a bundle from the two source files.
    ///
    /// Both files must exist and be readable; a missing file surfaces as an
    /// I/O error of `NotFound` kind. The archive contains exactly two
    /// entries, `"{problem}.in.txt"` and `"{problem}.{language}"`.
    pub fn build(
        problem: &str,
        language: Language,
        input_path: &Path,
        code_path: &Path,
    ) -> Result<Bundle> {
        let input = std::fs::read(input_path)?;
        let code = std::fs::read(code_path)?;

        let input_name = format!("{}.in.txt", problem);
        let code_name = format!("{}.{}", problem, language);

        let mut buf = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut buf);
            append_entry(&mut builder, &input_name, &input)?;
            append_entry(&mut builder, &code_name, &code)?;
            builder.finish()?;
        }

        Ok(Bundle {
            problem: problem.to_string(),
            language,
            bytes: buf,
        })
    }

    /// Archive entry name of the input file
    pub fn input_name(&self) -> String {
        format!("{}.in.txt", self.problem)
    }

    /// Archive entry name of the code file
    pub fn code_name(&self) -> String {
        format!("{}.{}", self.problem, self.language)
    }

    /// Name of the output file the submission is expected to write
    pub fn output_name(&self) -> String {
        format!("{}.out.txt", self.problem)
    }

    /// Raw tar bytes, ready for injection
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn append_entry(
    builder: &mut tar::Builder<&mut Vec<u8>>,
    name: &str,
    data: &[u8],
) -> Result<()> {
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();
    builder.append_data(&mut header, name, Cursor::new(data))?;
    Ok(())
}

/// Unpack a single named file from a tar archive fetched out of the sandbox.
///
/// Returns `None` if no entry's file name matches.
pub fn extract_entry(archive_bytes: &[u8], file_name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = tar::Archive::new(Cursor::new(archive_bytes));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let matches = entry
            .path()?
            .file_name()
            .map(|n| n == std::ffi::OsStr::new(file_name))
            .unwrap_or(false);
        if matches {
            let mut data = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut data)?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_bundle_entry_names() {
        let dir = tempdir().unwrap();
        let input = write_file(dir.path(), "in.txt", b"21\n");
        let code = write_file(dir.path(), "sol.py", b"print(42)\n");

        let bundle = Bundle::build("two-sum", Language::Python, &input, &code).unwrap();
        assert_eq!(bundle.input_name(), "two-sum.in.txt");
        assert_eq!(bundle.code_name(), "two-sum.py");
        assert_eq!(bundle.output_name(), "two-sum.out.txt");
    }

    #[test]
    fn test_bundle_round_trip() {
        let dir = tempdir().unwrap();
        let input = write_file(dir.path(), "in.txt", b"21\n");
        let code = write_file(dir.path(), "sol.py", b"print(42)\n");

        let bundle = Bundle::build("two-sum", Language::Python, &input, &code).unwrap();

        let extracted = extract_entry(bundle.as_bytes(), "two-sum.in.txt")
            .unwrap()
            .unwrap();
        assert_eq!(extracted, b"21\n");

        let extracted = extract_entry(bundle.as_bytes(), "two-sum.py")
            .unwrap()
            .unwrap();
        assert_eq!(extracted, b"print(42)\n");
    }

    #[test]
    fn test_bundle_missing_input_file() {
        let dir = tempdir().unwrap();
        let code = write_file(dir.path(), "sol.py", b"print(42)\n");

        let err = Bundle::build(
            "two-sum",
            Language::Python,
            &dir.path().join("nope.txt"),
            &code,
        )
        .unwrap_err();
        match err {
            crate::Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_entry_absent() {
        let dir = tempdir().unwrap();
        let input = write_file(dir.path(), "in.txt", b"21\n");
        let code = write_file(dir.path(), "sol.py", b"print(42)\n");

        let bundle = Bundle::build("two-sum", Language::Python, &input, &code).unwrap();
        assert!(extract_entry(bundle.as_bytes(), "two-sum.out.txt")
            .unwrap()
            .is_none());
    }
}
