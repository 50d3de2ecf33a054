use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Validates that a trusted domain entry is a bare hostname
fn validate_trusted_domain(domain: &str) -> Result<(), String> {
    let trimmed = domain.trim().trim_matches('.');

    if trimmed.is_empty() {
        return Err("Trusted domain cannot be empty".to_string());
    }

    if trimmed.contains("://") {
        return Err(format!(
            "Trusted domain '{}' must be a hostname, not a URL",
            domain
        ));
    }

    // Check for invalid characters
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '-' && ch != '.' {
            return Err(format!(
                "Trusted domain '{}' contains invalid character '{}'. Only letters, numbers, hyphens and dots are allowed",
                domain, ch
            ));
        }
    }

    // A single label would trust an entire top-level domain
    if !trimmed.contains('.') {
        return Err(format!(
            "Trusted domain '{}' must contain at least one dot",
            domain
        ));
    }

    Ok(())
}

/// Parse a YAML file and return the validated configuration
pub async fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let config = parse_config_string(&content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Parse a YAML string into a configuration without validating it
pub fn parse_config_string(content: &str) -> Result<Config> {
    let config: Config =
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML content")?;

    Ok(config)
}

/// Validate trusted domains and frame defaults
pub fn validate_config(config: &Config) -> Result<()> {
    for domain in &config.embed.trusted_domains {
        if let Err(error) = validate_trusted_domain(domain) {
            anyhow::bail!("Invalid embed.trusted_domains entry: {}", error);
        }
    }

    if config.embed.frame.width.trim().is_empty() || config.embed.frame.height.trim().is_empty()
    {
        anyhow::bail!("embed.frame width and height cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FRAME_HEIGHT;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_string("{}").unwrap();
        assert!(config.database_url.is_none());
        assert!(config
            .embed
            .trusted_domains
            .iter()
            .any(|domain| domain == "youtube.com"));
        assert_eq!(config.embed.frame.height, DEFAULT_FRAME_HEIGHT);
        assert!(config.embed.frame.allow_fullscreen);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_custom_trusted_domains() {
        let yaml = r#"
database_url: "postgresql://localhost/onelink"
embed:
  trusted_domains:
    - example.org
    - player.example.net
  frame:
    height: "600"
"#;
        let config = parse_config_string(yaml).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgresql://localhost/onelink")
        );
        assert_eq!(
            config.embed.trusted_domains,
            vec!["example.org".to_string(), "player.example.net".to_string()]
        );
        assert_eq!(config.embed.frame.height, "600");
        assert_eq!(config.embed.frame.width, "100%");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_url_and_bare_tld_entries() {
        let config = parse_config_string(
            "embed:\n  trusted_domains:\n    - https://example.org\n",
        )
        .unwrap();
        assert!(validate_config(&config).is_err());

        let config = parse_config_string("embed:\n  trusted_domains:\n    - com\n").unwrap();
        assert!(validate_config(&config).is_err());
    }
}
