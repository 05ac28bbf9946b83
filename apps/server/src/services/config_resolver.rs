// [apps/server/src/services/config_resolver.rs]
/*!
 * Layered configuration resolution (C9): global -> token -> device,
 * deep-merged in that order.
 */

use rmm_infra_db::repositories::ConfigurationRepository;
use rmm_infra_db::DbError;
use serde_json::Value;
use std::sync::Arc;

/// Recursively merges `layers` left to right: objects merge key by
/// key, later layers override earlier ones; arrays and scalars are
/// replaced wholesale, never concatenated.
pub fn merge_json(layers: &[Value]) -> Value {
    layers.iter().fold(Value::Object(Default::default()), |acc, layer| merge_two(acc, layer.clone()))
}

fn merge_two(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge_two(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

pub struct ConfigResolver {
    repository: Arc<ConfigurationRepository>,
}

impl ConfigResolver {
    pub fn new(repository: Arc<ConfigurationRepository>) -> Self {
        Self { repository }
    }

    /// Resolves the effective configuration document for a device,
    /// given the enrollment token recorded on its device record (or
    /// `None`, in which case only the global and device layers apply).
    pub async fn resolve(&self, enrollment_token: Option<&str>, device_id: &str) -> Result<Value, DbError> {
        let layers = self.repository.resolve_layers(enrollment_token, device_id).await?;
        Ok(merge_json(&layers))
    }

    /// The just-global document, returned to a freshly enrolled device
    /// that has no device-scoped layer yet.
    pub async fn global_only(&self) -> Result<Value, DbError> {
        match self.repository.find(rmm_domain_models::ConfigScope::Global, None).await? {
            Some(row) => Ok(row.content),
            None => Ok(Value::Object(Default::default())),
        }
    }

    pub async fn find(&self, scope: rmm_domain_models::ConfigScope, target_id: Option<&str>) -> Result<Option<rmm_domain_models::ConfigurationRow>, DbError> {
        self.repository.find(scope, target_id).await
    }

    pub async fn upsert(
        &self,
        scope: rmm_domain_models::ConfigScope,
        target_id: Option<&str>,
        content: &Value,
        updated_by: Option<&str>,
        now_ms: i64,
    ) -> Result<rmm_domain_models::ConfigurationRow, DbError> {
        self.repository.upsert(scope, target_id, content, updated_by, now_ms).await
    }

    pub async fn delete(&self, scope: rmm_domain_models::ConfigScope, target_id: Option<&str>) -> Result<(), DbError> {
        self.repository.delete(scope, target_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_layers_override_earlier_scalar_and_object_keys() {
        let global = json!({"heartbeat": {"interval": 60}, "feature_x": true});
        let device = json!({"heartbeat": {"interval": 30}});

        let merged = merge_json(&[global, device]);
        assert_eq!(merged["heartbeat"]["interval"], 30);
        assert_eq!(merged["feature_x"], true);
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let global = json!({"allowed_commands": ["ls", "pwd"]});
        let device = json!({"allowed_commands": ["whoami"]});

        let merged = merge_json(&[global, device]);
        assert_eq!(merged["allowed_commands"], json!(["whoami"]));
    }

    #[test]
    fn device_overrides_token_overrides_global() {
        let global = json!({"x": 1, "y": 1});
        let token = json!({"x": 2});
        let device = json!({"x": 3});

        let merged = merge_json(&[global, token, device]);
        assert_eq!(merged["x"], 3);
        assert_eq!(merged["y"], 1);
    }
}
