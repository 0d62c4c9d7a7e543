//! Output masking for secret values.
//!
//! Org auth URLs and tracker tokens are registered here as soon as they are
//! read; everything written to the console, the run log or the run record
//! passes through [`OutputMasker::mask`] first.

use std::io::{self, Write};
use std::sync::{Arc, PoisonError, RwLock};

/// Masks secret values in output streams.
///
/// Clones share the same registry, so a secret registered by one stage is
/// masked in output captured by every other holder.
///
/// # Example
///
/// ```
/// use sfpromote::secrets::OutputMasker;
///
/// let masker = OutputMasker::new();
/// masker.add_secret("super-secret-value");
///
/// let output = masker.mask("The key is super-secret-value here");
/// assert_eq!(output, "The key is [REDACTED] here");
/// ```
#[derive(Clone)]
pub struct OutputMasker {
    /// Registered secrets, longest first.
    secrets: Arc<RwLock<Vec<String>>>,
    /// The mask string to use.
    mask: String,
}

impl OutputMasker {
    /// Create a new masker with default mask string.
    pub fn new() -> Self {
        Self::with_mask("[REDACTED]")
    }

    /// Create a masker with a custom mask string.
    pub fn with_mask(mask: impl Into<String>) -> Self {
        Self {
            secrets: Arc::new(RwLock::new(Vec::new())),
            mask: mask.into(),
        }
    }

    /// Register a secret value to be masked.
    ///
    /// Empty strings are ignored.
    pub fn add_secret(&self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        let mut secrets = self.secrets.write().unwrap_or_else(PoisonError::into_inner);
        if !secrets.contains(&value) {
            secrets.push(value);
            secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        }
    }

    /// Register an SFDX auth URL.
    ///
    /// Besides the full URL, the refresh token between `::` and `@` is
    /// registered on its own, since CLIs echo it in error messages.
    pub fn add_auth_url(&self, url: &str) {
        let url = url.trim();
        self.add_secret(url);
        if let Some(rest) = url.split_once("::").map(|(_, rest)| rest) {
            if let Some((token, _host)) = rest.rsplit_once('@') {
                self.add_secret(token);
            }
        }
    }

    /// Mask any secret values in the given string.
    pub fn mask(&self, input: &str) -> String {
        let secrets = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
        let mut result = input.to_string();
        for secret in secrets.iter() {
            result = result.replace(secret.as_str(), &self.mask);
        }
        result
    }

    /// Get the number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Create a writer that masks output line by line.
    ///
    /// # Example
    ///
    /// ```
    /// use sfpromote::secrets::OutputMasker;
    /// use std::io::Write;
    ///
    /// let masker = OutputMasker::new();
    /// masker.add_secret("secret-value");
    ///
    /// let mut output = Vec::new();
    /// {
    ///     let mut writer = masker.writer(&mut output);
    ///     writeln!(writer, "The value is secret-value").unwrap();
    ///     writer.flush().unwrap();
    /// }
    ///
    /// let result = String::from_utf8(output).unwrap();
    /// assert!(!result.contains("secret-value"));
    /// ```
    pub fn writer<W: Write>(&self, inner: W) -> MaskingWriter<W> {
        MaskingWriter {
            inner,
            masker: self.clone(),
            buffer: String::new(),
        }
    }
}

impl Default for OutputMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutputMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMasker")
            .field("secrets", &self.secret_count())
            .finish()
    }
}

/// A writer that masks secret values.
///
/// This wraps another writer and replaces any secret values with their
/// masked representation before writing.
pub struct MaskingWriter<W: Write> {
    inner: W,
    masker: OutputMasker,
    buffer: String,
}

impl<W: Write> Write for MaskingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        self.buffer.push_str(&input);

        // Process complete lines
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..=newline_pos].to_string();
            self.buffer = self.buffer[newline_pos + 1..].to_string();
            let masked = self.masker.mask(&line);
            self.inner.write_all(masked.as_bytes())?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let masked = self.masker.mask(&self.buffer);
            self.inner.write_all(masked.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_single_secret() {
        let masker = OutputMasker::new();
        masker.add_secret("super-secret-value");

        let output = masker.mask("The key is super-secret-value here");

        assert_eq!(output, "The key is [REDACTED] here");
    }

    #[test]
    fn clones_share_registry() {
        let masker = OutputMasker::new();
        let clone = masker.clone();
        masker.add_secret("late-secret");

        assert_eq!(clone.mask("x late-secret y"), "x [REDACTED] y");
    }

    #[test]
    fn auth_url_token_is_masked_alone() {
        let masker = OutputMasker::new();
        masker.add_auth_url("force://PlatformCLI::5Aep861TSESvWeug@acme.my.salesforce.com\n");

        assert_eq!(masker.secret_count(), 2);
        assert_eq!(
            masker.mask("invalid grant for 5Aep861TSESvWeug"),
            "invalid grant for [REDACTED]"
        );
        assert_eq!(
            masker.mask("url=force://PlatformCLI::5Aep861TSESvWeug@acme.my.salesforce.com"),
            "url=[REDACTED]"
        );
    }

    #[test]
    fn longer_secret_wins_over_contained_one() {
        let masker = OutputMasker::new();
        masker.add_secret("abc");
        masker.add_secret("abcdef");

        assert_eq!(masker.mask("abcdef"), "[REDACTED]");
    }

    #[test]
    fn ignores_empty_and_duplicate_secrets() {
        let masker = OutputMasker::new();
        masker.add_secret("");
        masker.add_secret("real-secret");
        masker.add_secret("real-secret");

        assert_eq!(masker.secret_count(), 1);
    }

    #[test]
    fn custom_mask_string() {
        let masker = OutputMasker::with_mask("***");
        masker.add_secret("password123");

        assert_eq!(masker.mask("password: password123"), "password: ***");
    }

    #[test]
    fn masking_writer_handles_partial_lines() {
        let masker = OutputMasker::new();
        masker.add_secret("secret");

        let mut output = Vec::new();
        {
            let mut writer = masker.writer(&mut output);
            write!(writer, "partial ").unwrap();
            write!(writer, "secret ").unwrap();
            write!(writer, "line").unwrap();
            writer.flush().unwrap();
        }

        let result = String::from_utf8(output).unwrap();
        assert_eq!(result, "partial [REDACTED] line");
    }

    #[test]
    fn no_masking_without_secrets() {
        let masker = OutputMasker::new();
        let input = "This has no secrets to mask";

        assert_eq!(masker.mask(input), input);
    }
}
