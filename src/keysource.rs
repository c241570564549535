//! Key reading functionality
//!
//! The core API takes the key string as an argument. These readers are how
//! the command-line tool obtains that string.

use crate::error::{ErrorCategory, ErrorKind, LaracryptError, Result};
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Environment variable consulted when no other key source is configured.
pub const DEFAULT_KEY_VAR: &str = "APP_KEY";

/// Trait for reading key strings from various sources
pub trait KeyReader {
    /// Read the key in its textual form (`base64:...`).
    ///
    /// Returns the key wrapped in `Zeroizing` so it is wiped from memory
    /// when dropped.
    fn read_key(&mut self) -> Result<Zeroizing<String>>;
}

/// Returns a fixed key (for testing)
pub struct ConstantKeyReader {
    key: Zeroizing<String>,
}

impl ConstantKeyReader {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Zeroizing::new(key.into()),
        }
    }
}

impl KeyReader for ConstantKeyReader {
    fn read_key(&mut self) -> Result<Zeroizing<String>> {
        Ok(self.key.clone())
    }
}

/// Reads the key from an environment variable
pub struct EnvKeyReader {
    var: String,
}

impl EnvKeyReader {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyReader {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_VAR)
    }
}

impl KeyReader for EnvKeyReader {
    fn read_key(&mut self) -> Result<Zeroizing<String>> {
        let value = std::env::var(&self.var).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyUnavailable,
                format!("environment variable {} is not set", self.var),
                e,
            )
        })?;
        non_empty(Zeroizing::new(value), || {
            format!("environment variable {} is empty", self.var)
        })
    }
}

/// Reads `APP_KEY` (or another variable) from a dotenv file such as a
/// Laravel project's `.env`
pub struct EnvFileKeyReader {
    path: PathBuf,
    var: String,
}

impl EnvFileKeyReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_var(path, DEFAULT_KEY_VAR)
    }

    pub fn with_var(path: impl Into<PathBuf>, var: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            var: var.into(),
        }
    }
}

impl KeyReader for EnvFileKeyReader {
    fn read_key(&mut self) -> Result<Zeroizing<String>> {
        let contents = Zeroizing::new(fs::read_to_string(&self.path).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to read {}", self.path.display()),
                e,
            )
        })?);

        let value = find_dotenv_value(&contents, &self.var).ok_or_else(|| {
            LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyUnavailable,
                format!("{} not found in {}", self.var, self.path.display()),
            )
        })?;
        non_empty(Zeroizing::new(value.to_string()), || {
            format!("{} is empty in {}", self.var, self.path.display())
        })
    }
}

/// Find `VAR=value` in dotenv text. Handles `export ` prefixes, comments
/// and single or double quotes around the value.
fn find_dotenv_value<'a>(contents: &'a str, var: &str) -> Option<&'a str> {
    contents.lines().rev().find_map(|line| {
        let line = line.trim();
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (name, value) = line.split_once('=')?;
        if name.trim() != var {
            return None;
        }
        let value = value.trim();
        let unquoted = ['"', '\'']
            .iter()
            .find_map(|&q| value.strip_prefix(q)?.strip_suffix(q));
        Some(match unquoted {
            Some(inner) => inner,
            None => value.split(" #").next().unwrap_or(value).trim(),
        })
    })
}

/// Reads the key from any io::Read source, trimming surrounding whitespace
pub struct ReaderKeyReader {
    reader: Box<dyn Read>,
}

impl ReaderKeyReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl KeyReader for ReaderKeyReader {
    fn read_key(&mut self) -> Result<Zeroizing<String>> {
        let mut data = Zeroizing::new(String::new());
        self.reader.read_to_string(&mut data).map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "error reading key",
                e,
            )
        })?;
        non_empty(Zeroizing::new(data.trim().to_string()), || {
            "no key provided on input".to_string()
        })
    }
}

/// Reads the key from terminal with no echo
pub struct TerminalKeyReader;

impl TerminalKeyReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalKeyReader {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyReader for TerminalKeyReader {
    fn read_key(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(LaracryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyUnavailable,
                "cannot read key from terminal - stdin is not a terminal",
            ));
        }

        io::stderr().write_all(b"Key (laracrypt): ").map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to write prompt",
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to flush prompt",
                e,
            )
        })?;

        // rpassword hands back a plain String; wrap it straight away.
        let key = Zeroizing::new(rpassword::read_password().map_err(|e| {
            LaracryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyUnavailable,
                "failure reading key",
                e,
            )
        })?);

        non_empty(Zeroizing::new(key.trim().to_string()), || {
            "no key entered".to_string()
        })
    }
}

fn non_empty(
    key: Zeroizing<String>,
    msg: impl FnOnce() -> String,
) -> Result<Zeroizing<String>> {
    if key.is_empty() {
        return Err(LaracryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyUnavailable,
            msg(),
        ));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const KEY: &str = "base64:AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    #[test]
    fn test_constant_reader() {
        let mut reader = ConstantKeyReader::new(KEY);
        assert_eq!(reader.read_key().unwrap().as_str(), KEY);
        assert_eq!(reader.read_key().unwrap().as_str(), KEY);
    }

    /// Tests the terminal reader. This is ignored by default and must be run
    /// explicitly and with human input:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let mut reader = TerminalKeyReader::new();
        println!("\nPlease enter a test key:");
        let key = reader.read_key().unwrap();
        assert!(!key.is_empty(), "Expected non-empty key");
    }

    #[test]
    fn test_reader_key_reader_trims() {
        let data = format!("  {}\n", KEY);
        let mut reader = ReaderKeyReader::new(Box::new(io::Cursor::new(data.into_bytes())));
        assert_eq!(reader.read_key().unwrap().as_str(), KEY);
    }

    #[test]
    fn test_reader_key_reader_empty() {
        let data = b"\n";
        let mut reader = ReaderKeyReader::new(Box::new(&data[..]));
        let err = reader.read_key().expect_err("expected missing key");
        assert_eq!(err.kind, Some(ErrorKind::KeyUnavailable));
    }

    #[test]
    fn test_env_reader_missing_variable() {
        let mut reader = EnvKeyReader::new("LARACRYPT_TEST_SURELY_UNSET_VARIABLE");
        let err = reader.read_key().expect_err("expected missing key");
        assert_eq!(err.kind, Some(ErrorKind::KeyUnavailable));
    }

    #[test]
    fn test_env_file_reader() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = temp_dir.path().join(".env");
        fs::write(
            &env_path,
            format!(
                "APP_NAME=Laravel\n# APP_KEY=base64:commented-out\nAPP_KEY={}\nAPP_DEBUG=true\n",
                KEY
            ),
        )
        .unwrap();

        let mut reader = EnvFileKeyReader::new(&env_path);
        assert_eq!(reader.read_key().unwrap().as_str(), KEY);
    }

    #[test]
    fn test_env_file_reader_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let env_path = temp_dir.path().join(".env");
        fs::write(&env_path, "APP_NAME=Laravel\nAPP_KEY=\n").unwrap();

        let mut reader = EnvFileKeyReader::new(&env_path);
        let err = reader.read_key().expect_err("expected empty key");
        assert_eq!(err.kind, Some(ErrorKind::KeyUnavailable));

        let mut reader = EnvFileKeyReader::with_var(&env_path, "OTHER_KEY");
        let err = reader.read_key().expect_err("expected missing key");
        assert_eq!(err.kind, Some(ErrorKind::KeyUnavailable));
    }

    #[test]
    fn test_env_file_reader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut reader = EnvFileKeyReader::new(temp_dir.path().join("nope.env"));
        let err = reader.read_key().expect_err("expected I/O error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_find_dotenv_value() {
        assert_eq!(find_dotenv_value("APP_KEY=abc", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("APP_KEY=\"abc\"", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("APP_KEY='abc'", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("export APP_KEY=abc", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("APP_KEY=abc # note", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("  APP_KEY = abc  ", "APP_KEY"), Some("abc"));
        assert_eq!(find_dotenv_value("APP_KEYS=abc", "APP_KEY"), None);
        assert_eq!(find_dotenv_value("#APP_KEY=abc", "APP_KEY"), None);
        // Later assignments win, as with dotenv loaders.
        assert_eq!(find_dotenv_value("APP_KEY=a\nAPP_KEY=b", "APP_KEY"), Some("b"));
        // Base64 padding survives.
        assert_eq!(find_dotenv_value("APP_KEY=base64:AA==", "APP_KEY"), Some("base64:AA=="));
    }
}
