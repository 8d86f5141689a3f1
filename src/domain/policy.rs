//! Endpoint policy domain types
//!
//! Conditions and actions carry independent boolean flags rather than a
//! closed set of kinds; the declaration translators decide how flag
//! combinations resolve.

use serde::{Deserialize, Serialize};

/// Named, ordered rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub partition: String,
    /// Reference such as `/Common/first-match`; only the last segment is used.
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub full_uri: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Match predicate flags. `host`, `path_segment` and `path` select the
/// predicate, checked in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    pub name: String,
    pub index: i32,
    pub host: bool,
    #[serde(rename = "httpHost")]
    pub http_host: bool,
    #[serde(rename = "httpURI")]
    pub http_uri: bool,
    pub path_segment: bool,
    pub path: bool,
    pub equals: bool,
    pub request: bool,
    pub values: Vec<String>,
}

/// Effect flags; any combination is legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Action {
    pub name: String,
    /// Pool reference; may be a full path.
    pub pool: String,
    #[serde(rename = "httpHost")]
    pub http_host: bool,
    #[serde(rename = "httpURI")]
    pub http_uri: bool,
    pub forward: bool,
    pub redirect: bool,
    pub location: String,
    pub replace: bool,
    pub request: bool,
    pub value: String,
}
