// crates/sls-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for sls-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use sls_config::ConfigError;
use sls_config::SlsConfig;

/// Minimal valid configuration text.
pub const MINIMAL_TOML: &str = r#"
[credentials]
access_key_id = "AKID"
access_key_secret = "secret"

[[systems]]
name = "ads"
aliases = ["广告", "AMDP"]
endpoint = "cn-hangzhou.log.aliyuncs.com"
project = "ads-prod"
description = "Advertising platform"

[[systems]]
name = "X"
endpoint = "log.example.com"
project = "proj1"
"#;

/// Parses a TOML string without validation.
pub fn config_from_toml(toml_str: &str) -> Result<SlsConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns the minimal config parsed but not validated.
pub fn minimal_config() -> Result<SlsConfig, toml::de::Error> {
    config_from_toml(MINIMAL_TOML)
}

/// Checks that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
