use crate::config::types::{
    ChunkConfig, Config, CrawlerConfig, ExtractConfig, FetchConfig, OutputConfig, ScopeConfig,
};
use crate::ConfigError;
use scraper::Selector;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_scope_config(&config.scope)?;
    validate_extract_config(&config.extract)?;
    validate_chunk_config(&config.chunk)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.backoff_base_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed backoff-cap-ms ({})",
            config.backoff_base_ms, config.backoff_cap_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    if config.allowed_schemes.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-schemes cannot be empty".to_string(),
        ));
    }

    for scheme in &config.allowed_schemes {
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::Validation(format!(
                "Only http and https schemes can be crawled, got '{}'",
                scheme
            )));
        }
    }

    for pattern in &config.allowed_hosts {
        validate_host_pattern(pattern)?;
    }

    for prefix in &config.allowed_path_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "Path prefix '{}' must start with '/'",
                prefix
            )));
        }
    }

    if config.exclude_patterns.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "exclude-patterns cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    for selector in &config.exclude_selectors {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }
    Ok(())
}

fn validate_chunk_config(config: &ChunkConfig) -> Result<(), ConfigError> {
    if config.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "max-tokens must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output root cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a host pattern (supports a leading "*." wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_host_string(host)
}

/// Validates a host string (without wildcard prefix)
///
/// Single-label hosts such as "localhost" are accepted.
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}
