//! Rule parameters.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BUSINESS_KEY: &str = "reqId";

/// Which property is the business key and which schema classes take part in
/// the cycle rule. Type lists match subtypes too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub business_key: String,
    pub requirement_types: Vec<String>,
    pub derive_types: Vec<String>,
    pub refine_types: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            business_key: DEFAULT_BUSINESS_KEY.to_string(),
            requirement_types: vec![
                "RequirementUsage".to_string(),
                "RequirementDefinition".to_string(),
            ],
            derive_types: vec!["DeriveRelationship".to_string()],
            refine_types: vec!["RefineRelationship".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_keep_defaults() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"business_key": "externalId"}"#).expect("parses");
        assert_eq!(config.business_key, "externalId");
        assert_eq!(config.derive_types, vec!["DeriveRelationship".to_string()]);
    }
}
