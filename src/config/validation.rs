use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, SearchConfig, SeedsConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_search_config(&config.search)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_seeds_config(&config.seeds, &config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.short_cooldown_secs > config.long_cooldown_secs {
        return Err(ConfigError::Validation(format!(
            "short_cooldown_secs ({}) must not exceed long_cooldown_secs ({})",
            config.short_cooldown_secs, config.long_cooldown_secs
        )));
    }

    if config.min_term_len + 1 >= config.max_term_len {
        return Err(ConfigError::Validation(format!(
            "term length bounds ({}, {}) leave no admissible length",
            config.min_term_len, config.max_term_len
        )));
    }

    if config.max_phrase_words < 1 {
        return Err(ConfigError::Validation(
            "max_phrase_words must be >= 1".to_string(),
        ));
    }

    if config.max_terms == Some(0) {
        return Err(ConfigError::Validation(
            "max_terms must be >= 1 when set".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the search endpoint configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.query_param.is_empty() {
        return Err(ConfigError::Validation(
            "query_param cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.name_attribute.is_empty() || config.domains_attribute.is_empty() {
        return Err(ConfigError::Validation(
            "name_attribute and domains_attribute cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.results_path.is_empty() {
        return Err(ConfigError::Validation(
            "results_path cannot be empty".to_string(),
        ));
    }

    if config.domains_path.is_empty() {
        return Err(ConfigError::Validation(
            "domains_path cannot be empty".to_string(),
        ));
    }

    if config.results_path == config.domains_path {
        return Err(ConfigError::Validation(
            "results_path and domains_path must differ".to_string(),
        ));
    }

    if matches!(config.ledger_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "ledger_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed sources
fn validate_seeds_config(seeds: &SeedsConfig, output: &OutputConfig) -> Result<(), ConfigError> {
    for source in &seeds.urls {
        Url::parse(source).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", source, e))
        })?;
    }

    if seeds.generate_prefixes > 4 {
        return Err(ConfigError::Validation(format!(
            "generate_prefixes must be at most 4, got {}",
            seeds.generate_prefixes
        )));
    }

    if seeds.restore_seen_terms && output.ledger_path.is_none() {
        return Err(ConfigError::Validation(
            "restore_seen_terms requires output.ledger_path".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
