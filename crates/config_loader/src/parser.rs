//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, HostBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<HostBlueprint, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("TOML parse error: {e}"), e))
}

pub fn parse_json(content: &str) -> Result<HostBlueprint, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("JSON parse error: {e}"), e))
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<HostBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::WatchBehavior;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[apps]]
name = "weather"
uuid = "5f3a7c1e-2b4d-4e6f-8a9b-0c1d2e3f4a5b"

[[watches]]
id = "watch-1"
name = "Pebble Time"
behavior = "auto_nack"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.apps.len(), 1);
        assert_eq!(bp.watches[0].behavior, WatchBehavior::AutoNack);
        assert_eq!(bp.protocol.delivery_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "protocol": { "max_dictionary_bytes": 512 },
            "apps": [{ "name": "weather", "uuid": "5f3a7c1e-2b4d-4e6f-8a9b-0c1d2e3f4a5b" }],
            "watches": [{ "id": "w1", "name": "Pebble 2", "platform": "diorite" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.protocol.max_dictionary_bytes, 512);
        assert_eq!(bp.watches[0].platform, "diorite");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { source: Some(_), .. }));
    }

    #[test]
    fn test_bad_uuid_is_parse_error() {
        let content = r#"
[[apps]]
name = "weather"
uuid = "not-a-uuid"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
