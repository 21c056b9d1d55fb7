//! Secret masking for configuration dumps.

use regex::Regex;

const MASK: &str = "***";

/// Rewrites `key = <string>` pairs whose key is a known secret so that only
/// the mask is left between the quotes. All four TOML string forms are
/// recognized: basic (`"..."`, with escapes), literal (`'...'`) and the
/// multi-line `"""..."""` and `'''...'''`.
#[derive(Debug, Clone)]
pub struct SecretMasker {
    re: Option<Regex>,
}

impl SecretMasker {
    /// Build a masker for the given key names (matched case-insensitively).
    pub fn new<S: AsRef<str>>(keys: &[S]) -> Self {
        let alternatives: Vec<String> = keys
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Self { re: None };
        }

        let pattern = format!(
            r#"(?i)(\b(?:{})\s*=\s*)("""(?s:(?:[^\\]|\\.)*?)"""|'''(?s:.*?)'''|"(?:[^"\\\n]|\\.)*"|'[^'\n]*')"#,
            alternatives.join("|")
        );
        // Keys are escaped above, so the pattern always compiles.
        let re = Regex::new(&pattern).ok();
        Self { re }
    }

    /// Return `text` with every secret value replaced by the mask.
    pub fn mask(&self, text: &str) -> String {
        match &self.re {
            Some(re) => re
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    let delim = delimiter(&caps[2]);
                    format!("{}{}{}{}", &caps[1], delim, MASK, delim)
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}

/// Opening quote sequence of a matched TOML string.
fn delimiter(value: &str) -> &str {
    if value.starts_with("\"\"\"") || value.starts_with("'''") {
        &value[..3]
    } else {
        &value[..1]
    }
}

impl Default for SecretMasker {
    fn default() -> Self {
        Self::new(&["password"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_password() {
        let masker = SecretMasker::default();
        let masked = masker.mask("user = \"bob\"\npassword = \"s3cr3t\"\n");
        assert!(masked.contains("password = \"***\""));
        assert!(masked.contains("user = \"bob\""));
        assert!(!masked.contains("s3cr3t"));
    }

    #[test]
    fn test_preserves_spacing() {
        let masker = SecretMasker::default();
        assert_eq!(masker.mask("password=\"x\""), "password=\"***\"");
        assert_eq!(masker.mask("Password   =  \"x\""), "Password   =  \"***\"");
    }

    #[test]
    fn test_extra_keys() {
        let masker = SecretMasker::new(&["password", "api_token", "client.secret"]);
        let masked = masker.mask("api_token = \"abc\"\nclient.secret = \"def\"\nother = \"ghi\"");
        assert!(!masked.contains("abc"));
        assert!(!masked.contains("def"));
        assert!(masked.contains("other = \"ghi\""));
    }

    #[test]
    fn test_key_must_be_whole_word() {
        let masker = SecretMasker::default();
        let text = "mypassword_hint = \"keep me\"";
        assert_eq!(masker.mask(text), text);
    }

    #[test]
    fn test_no_keys_leaves_text_untouched() {
        let masker = SecretMasker::new::<&str>(&[]);
        assert_eq!(masker.mask("password = \"x\""), "password = \"x\"");
    }

    #[test]
    fn test_escaped_quote_in_basic_string() {
        let masker = SecretMasker::default();
        let masked = masker.mask("password = \"s3\\\"cr3t\"\nuser = \"bob\"\n");
        assert_eq!(masked, "password = \"***\"\nuser = \"bob\"\n");
    }

    #[test]
    fn test_literal_string() {
        let masker = SecretMasker::default();
        assert_eq!(masker.mask("password = 's3cr3t'"), "password = '***'");
        assert_eq!(masker.mask("password = 's3\\cr3t'"), "password = '***'");
    }

    #[test]
    fn test_multiline_basic_string() {
        let masker = SecretMasker::default();
        let text = "password = \"\"\"s3cr3t\nmore \\\"\"\" lines\"\"\"\nnext = 1\n";
        let masked = masker.mask(text);
        assert_eq!(masked, "password = \"\"\"***\"\"\"\nnext = 1\n");
        assert!(!masked.contains("s3cr3t"));
    }

    #[test]
    fn test_multiline_literal_string() {
        let masker = SecretMasker::default();
        let masked = masker.mask("password = '''s3cr3t\nline two'''\nnext = 1\n");
        assert_eq!(masked, "password = '''***'''\nnext = 1\n");
    }

    #[test]
    fn test_inline_table_value() {
        let masker = SecretMasker::default();
        let masked = masker.mask("admin = { password = 's3cr3t', role = \"ops\" }");
        assert_eq!(masked, "admin = { password = '***', role = \"ops\" }");
    }

    #[test]
    fn test_multiple_occurrences() {
        let masker = SecretMasker::default();
        let masked = masker.mask("[a]\npassword = \"one\"\n[b]\npassword = \"two\"\n");
        assert_eq!(masked.matches("***").count(), 2);
    }
}
