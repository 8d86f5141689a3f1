//! Base declaration template
//!
//! The header fields of every declaration come from a template compiled into
//! the binary. It is parsed on every synthesis cycle; a parse failure is
//! logged by the caller and an empty header is used instead.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::model::{Adc, Declaration, Tenant};
use crate::errors::{AgentError, Result};

pub const BASE_DECLARATION: &str = r#"{
  "$schema": "https://raw.githubusercontent.com/F5Networks/f5-appsvcs-extension/master/schema/latest/as3-schema-3.11.0-3.json",
  "class": "AS3",
  "declaration": {
    "class": "ADC",
    "schemaVersion": "3.11.0",
    "id": "urn:uuid:B97DFADF-9F0D-4F6C-8D66-E9B52E593694",
    "label": "CIS Declaration",
    "remark": "Auto-generated by CIS"
  }
}"#;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DeclarationTemplate {
    #[serde(rename = "$schema", default)]
    pub schema: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub declaration: AdcHeader,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AdcHeader {
    pub class: String,
    pub schema_version: String,
    pub id: String,
    pub label: String,
    pub remark: String,
}

impl DeclarationTemplate {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AgentError::serialization(e, "Failed to parse declaration template"))
    }

    /// Merge tenants into the template header.
    pub fn into_declaration(self, tenants: BTreeMap<String, Tenant>) -> Declaration {
        let AdcHeader { class, schema_version, id, label, remark } = self.declaration;
        Declaration {
            schema: self.schema,
            class: self.class,
            declaration: Adc { class, schema_version, id, label, remark, tenants },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_template_parses() {
        let template = DeclarationTemplate::parse(BASE_DECLARATION).unwrap();
        assert_eq!(template.class, "AS3");
        assert_eq!(template.declaration.class, "ADC");
        assert_eq!(template.declaration.schema_version, "3.11.0");
        assert_eq!(template.declaration.label, "CIS Declaration");
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let result = DeclarationTemplate::parse("{\"class\": ");
        assert!(matches!(result, Err(AgentError::Serialization { .. })));
    }

    #[test]
    fn test_into_declaration_keeps_header() {
        let template = DeclarationTemplate::parse(BASE_DECLARATION).unwrap();
        let decl = template.into_declaration(BTreeMap::new());
        let value = serde_json::to_value(&decl).unwrap();

        assert_eq!(value["class"], "AS3");
        assert_eq!(value["declaration"]["class"], "ADC");
        assert_eq!(value["declaration"]["schemaVersion"], "3.11.0");
        assert_eq!(
            value["declaration"]["id"],
            "urn:uuid:B97DFADF-9F0D-4F6C-8D66-E9B52E593694"
        );
    }
}
