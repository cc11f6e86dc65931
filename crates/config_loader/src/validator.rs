//! 配置校验模块
//!
//! 校验规则：
//! - 协议参数范围 (`ProtocolConfig` 上的 `validator` 注解)
//! - 应用名称非空且唯一，UUID 唯一
//! - 手表 id 非空且唯一
//! - `delayed` 行为必须配置 delay_ms

use std::collections::HashSet;

use contracts::{ContractError, HostBlueprint, WatchBehavior};
use validator::{Validate, ValidationErrors};

/// 校验 HostBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &HostBlueprint) -> Result<(), ContractError> {
    validate_protocol(blueprint)?;
    validate_apps(blueprint)?;
    validate_watches(blueprint)?;
    Ok(())
}

fn validate_protocol(blueprint: &HostBlueprint) -> Result<(), ContractError> {
    blueprint
        .protocol
        .validate()
        .map_err(|errors| first_field_error("protocol", &errors))
}

/// Map the first `validator` failure onto a dotted field path.
fn first_field_error(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, list)) => {
            let detail = list
                .first()
                .map(|e| e.code.to_string())
                .unwrap_or_else(|| "invalid".to_string());
            ContractError::config_validation(
                format!("{prefix}.{field}"),
                format!("{field} out of range ({detail})"),
            )
        }
        None => ContractError::config_validation(prefix, errors.to_string()),
    }
}

fn validate_apps(blueprint: &HostBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    let mut uuids = HashSet::new();

    for (idx, app) in blueprint.apps.iter().enumerate() {
        if app.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("apps[{idx}].name"),
                "app name cannot be empty",
            ));
        }
        if !names.insert(app.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("apps[name={}]", app.name),
                "duplicate app name",
            ));
        }
        if !uuids.insert(app.uuid) {
            return Err(ContractError::config_validation(
                format!("apps[name={}].uuid", app.name),
                format!("duplicate app uuid {}", app.uuid),
            ));
        }
    }
    Ok(())
}

fn validate_watches(blueprint: &HostBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, watch) in blueprint.watches.iter().enumerate() {
        if watch.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("watches[{idx}].id"),
                "watch id cannot be empty",
            ));
        }
        if !seen.insert(watch.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("watches[id={}]", watch.id),
                "duplicate watch id",
            ));
        }
        if watch.behavior == WatchBehavior::Delayed && watch.delay_ms == 0 {
            return Err(ContractError::config_validation(
                format!("watches[{}].delay_ms", watch.id),
                "delayed behavior requires delay_ms > 0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AppConfig, AppId, ProtocolConfig, SimulatedWatchConfig};

    fn watch(id: &str) -> SimulatedWatchConfig {
        SimulatedWatchConfig {
            id: id.to_string(),
            name: format!("Pebble {id}"),
            platform: "basalt".to_string(),
            behavior: WatchBehavior::AutoAck,
            delay_ms: 0,
        }
    }

    fn app(name: &str) -> AppConfig {
        AppConfig {
            name: name.to_string(),
            uuid: AppId::random(),
        }
    }

    fn blueprint() -> HostBlueprint {
        HostBlueprint {
            version: Default::default(),
            protocol: ProtocolConfig::default(),
            apps: vec![app("weather"), app("music")],
            watches: vec![watch("w1"), watch("w2")],
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&blueprint()).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut bp = blueprint();
        bp.protocol.listener_timeout_ms = 0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "protocol.listener_timeout_ms"
        );
    }

    #[test]
    fn test_zero_max_bytes_rejected() {
        let mut bp = blueprint();
        bp.protocol.max_dictionary_bytes = 0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "protocol.max_dictionary_bytes"
        );
    }

    #[test]
    fn test_duplicate_watch_id() {
        let mut bp = blueprint();
        bp.watches.push(watch("w1"));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate watch id"));
    }

    #[test]
    fn test_duplicate_app_name_and_uuid() {
        let mut bp = blueprint();
        bp.apps.push(app("weather"));
        assert!(validate(&bp).unwrap_err().to_string().contains("duplicate app name"));

        let mut bp = blueprint();
        let mut clash = app("clock");
        clash.uuid = bp.apps[0].uuid;
        bp.apps.push(clash);
        assert!(validate(&bp).unwrap_err().to_string().contains("duplicate app uuid"));
    }

    #[test]
    fn test_empty_names_rejected() {
        let mut bp = blueprint();
        bp.apps[1].name = "  ".to_string();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "apps[1].name");

        let mut bp = blueprint();
        bp.watches[0].id = String::new();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "watches[0].id");
    }

    #[test]
    fn test_delayed_requires_delay() {
        let mut bp = blueprint();
        bp.watches[1].behavior = WatchBehavior::Delayed;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "watches[w2].delay_ms");

        bp.watches[1].delay_ms = 25;
        assert!(validate(&bp).is_ok());
    }
}
