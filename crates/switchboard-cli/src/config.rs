use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use switchboard_core::providers::{anthropic, google};
use switchboard_core::router::MATH_KEYWORDS;

/// Config shipped with the binary and written by `switchboard init`
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

pub const ANTHROPIC_KEY_VAR: &str = "MY_ANTHROPIC_KEY";
pub const GEMINI_KEY_VAR: &str = "MY_GEMINI_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_anthropic_base_url() -> String {
    anthropic::DEFAULT_BASE_URL.to_string()
}
fn default_anthropic_model() -> String {
    anthropic::DEFAULT_MODEL.to_string()
}
fn default_anthropic_max_tokens() -> u32 {
    anthropic::DEFAULT_MAX_TOKENS
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_google_base_url")]
    pub base_url: String,
    #[serde(default = "default_google_model")]
    pub model: String,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_google_base_url(),
            model: default_google_model(),
            max_output_tokens: None,
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GoogleConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_google_base_url() -> String {
    google::DEFAULT_BASE_URL.to_string()
}
fn default_google_model() -> String {
    google::DEFAULT_MODEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    MATH_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

impl SwitchboardConfig {
    /// Load from `custom_path`, else `~/.switchboard/config.toml`, else the
    /// built-in defaults. A custom path that does not exist is an error.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => p.clone(),
            None => {
                let default_path = config_dir().join("config.toml");
                if !default_path.exists() {
                    debug!(
                        "No config at {}, using built-in defaults",
                        default_path.display()
                    );
                    return Self::parse(DEFAULT_CONFIG, Path::new("<built-in>"));
                }
                default_path
            }
        };

        // Refuse configs readable by group or other (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `switchboard init` first.",
                path.display()
            )
        })?;

        Self::parse(&content, &path)
    }

    fn parse(content: &str, origin: &Path) -> Result<Self> {
        // Hardcoded keys are detected before expansion
        let raw: Self = toml::from_str(content)
            .with_context(|| format!("Failed to parse config at {}", origin.display()))?;
        if !raw.providers.anthropic.api_key.is_empty()
            && !raw.providers.anthropic.api_key.contains("${")
        {
            warn!(
                "Anthropic API key is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                ANTHROPIC_KEY_VAR
            );
        }
        if !raw.providers.google.api_key.is_empty() && !raw.providers.google.api_key.contains("${")
        {
            warn!(
                "Gemini API key is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                GEMINI_KEY_VAR
            );
        }

        let expanded = expand_env_vars(content);
        toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", origin.display()))
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
const ALLOWED_ENV_VARS: &[&str] = &[
    ANTHROPIC_KEY_VAR,
    GEMINI_KEY_VAR,
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "HOME",
    "USER",
];

/// Escape a value for splicing into a TOML basic (double-quoted) string, so
/// quotes or newlines in it cannot end the string early.
fn escape_toml_basic(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn expand_env_vars(s: &str) -> String {
    expand_env_vars_with(s, |name| std::env::var(name).ok())
}

fn expand_env_vars_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = escape_toml_basic(&lookup(&var_name).unwrap_or_default());
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_parses() {
        let cfg: SwitchboardConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(cfg.providers.anthropic.model, "claude-3-opus-20240229");
        assert_eq!(cfg.providers.anthropic.max_tokens, 1000);
        assert_eq!(cfg.providers.google.model, "gemini-2.5-flash-preview-04-17");
        assert_eq!(cfg.providers.google.max_output_tokens, None);
        assert_eq!(cfg.routing.keywords, default_keywords());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: SwitchboardConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.providers.anthropic.base_url, "https://api.anthropic.com");
        assert_eq!(
            cfg.providers.google.base_url,
            "https://generativelanguage.googleapis.com"
        );
        assert!(cfg.providers.anthropic.timeout().is_none());
        assert_eq!(cfg.routing.keywords.len(), 8);
    }

    #[test]
    fn test_partial_config() {
        let cfg: SwitchboardConfig = toml::from_str(
            r#"
            [providers.google]
            max_output_tokens = 512
            timeout_secs = 30

            [routing]
            keywords = ["plus"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.providers.google.max_output_tokens, Some(512));
        assert_eq!(cfg.providers.google.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.providers.anthropic.max_tokens, 1000);
        assert_eq!(cfg.routing.keywords, vec!["plus".to_string()]);
    }

    #[test]
    fn test_expand_allowlisted_var() {
        let out = expand_env_vars_with("key = \"${MY_ANTHROPIC_KEY}\"", |name| {
            (name == "MY_ANTHROPIC_KEY").then(|| "sk-ant-123".to_string())
        });
        assert_eq!(out, "key = \"sk-ant-123\"");
    }

    #[test]
    fn test_expand_unset_var_is_empty() {
        let out = expand_env_vars_with("a=\"${MY_GEMINI_KEY}\"", |_| None);
        assert_eq!(out, "a=\"\"");
    }

    #[test]
    fn test_expand_skips_unlisted_var() {
        let out = expand_env_vars_with("a=\"${AWS_SECRET}\" b=\"${HOME}\"", |name| {
            Some(format!("<{}>", name))
        });
        assert_eq!(out, "a=\"${AWS_SECRET}\" b=\"<HOME>\"");
    }

    #[test]
    fn test_expand_value_containing_placeholder_not_reexpanded() {
        let out = expand_env_vars_with("${USER}${HOME}", |name| match name {
            "USER" => Some("${HOME}".to_string()),
            _ => Some("/home/x".to_string()),
        });
        assert_eq!(out, "${HOME}/home/x");
    }

    #[test]
    fn test_expanded_value_cannot_inject_keys() {
        let hostile = "ab\"\n[routing]\nkeywords = [\"e\"]\nx=\"";
        let content = "[providers.anthropic]\napi_key = \"${MY_ANTHROPIC_KEY}\"\n";
        let out = expand_env_vars_with(content, |_| Some(hostile.to_string()));

        let cfg: SwitchboardConfig = toml::from_str(&out).unwrap();
        assert_eq!(cfg.providers.anthropic.api_key, hostile);
        assert_eq!(cfg.routing.keywords, default_keywords());
    }

    #[test]
    fn test_escape_toml_basic() {
        assert_eq!(escape_toml_basic("plain-key"), "plain-key");
        assert_eq!(escape_toml_basic("a\\b\"c"), "a\\\\b\\\"c");
        assert_eq!(escape_toml_basic("x\ty\u{1}"), "x\\ty\\u0001");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-ant-abcdef1234"), "sk-...1234");
    }

    #[test]
    fn test_debug_masks_keys() {
        let mut cfg = SwitchboardConfig::default();
        cfg.providers.anthropic.api_key = "sk-ant-verysecretvalue".to_string();
        cfg.providers.google.api_key = "AIzaSyVerySecretValue".to_string();
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("verysecret"));
        assert!(!debug.contains("VerySecret"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [providers.anthropic]
            api_key = "${{HOME}}"
            model = "claude-3-haiku-20240307"
            max_tokens = 200
            "#
        )
        .unwrap();

        let cfg = SwitchboardConfig::load(&Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.providers.anthropic.model, "claude-3-haiku-20240307");
        assert_eq!(cfg.providers.anthropic.max_tokens, 200);
        assert!(!cfg.providers.anthropic.api_key.contains("${"));
    }

    #[test]
    fn test_load_missing_custom_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SwitchboardConfig::load(&Some(dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[providers.anthropic\nmodel = 1").unwrap();
        let err = SwitchboardConfig::load(&Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_rejects_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = SwitchboardConfig::load(&Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("overly permissive"));
    }
}
