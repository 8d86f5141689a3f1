//! Typed declaration document
//!
//! Every object kind in the shared application is a variant of [`As3Object`];
//! the `class` discriminator is emitted from the variant tag. Equality on
//! these types is the structural comparison the dispatcher relies on, so no
//! field here may carry formatting-only state.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::context::SHARED_APPLICATION;

/// The full document submitted to the appliance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub class: String,
    pub declaration: Adc,
}

impl Declaration {
    /// Look up a tenant by name.
    pub fn tenant(&self, name: &str) -> Option<&Tenant> {
        self.declaration.tenants.get(name)
    }

    /// Look up an object in the shared application of `tenant`.
    pub fn shared_object(&self, tenant: &str, name: &str) -> Option<&As3Object> {
        self.tenant(tenant).and_then(|t| t.shared.objects.get(name))
    }
}

/// The `ADC` body: template header fields plus one entry per tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Adc {
    pub class: String,
    pub schema_version: String,
    pub id: String,
    pub label: String,
    pub remark: String,
    #[serde(flatten)]
    pub tenants: BTreeMap<String, Tenant>,
}

/// A partition holding the shared application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tenant {
    class: &'static str,
    #[serde(rename = "Shared")]
    pub shared: Application,
}

impl Tenant {
    pub fn new(shared: Application) -> Self {
        Self { class: "Tenant", shared }
    }
}

/// Keys the shared application serializes for itself; no object may use them.
pub const RESERVED_APPLICATION_KEYS: &[&str] = &["class", "template"];

/// The shared application namespace; object names must be unique in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    class: &'static str,
    template: &'static str,
    #[serde(flatten)]
    pub objects: BTreeMap<String, As3Object>,
}

impl Default for Application {
    fn default() -> Self {
        Self::shared()
    }
}

impl Application {
    /// An empty application using the `shared` template.
    pub fn shared() -> Self {
        Self { class: "Application", template: "shared", objects: BTreeMap::new() }
    }

    /// Insert an object, returning the object previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, object: As3Object) -> Option<As3Object> {
        self.objects.insert(name.into(), object)
    }

    pub fn get(&self, name: &str) -> Option<&As3Object> {
        self.objects.get(name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Name of the namespace as it appears in reference paths.
    pub fn name(&self) -> &'static str {
        SHARED_APPLICATION
    }
}

/// One named object in the shared application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class")]
pub enum As3Object {
    Pool(Pool),
    #[serde(rename = "Endpoint_Policy")]
    EndpointPolicy(EndpointPolicy),
    #[serde(rename = "Service_HTTP")]
    ServiceHttp(Service),
    #[serde(rename = "Service_HTTPS")]
    ServiceHttps(Service),
}

impl As3Object {
    pub fn class(&self) -> &'static str {
        match self {
            As3Object::Pool(_) => "Pool",
            As3Object::EndpointPolicy(_) => "Endpoint_Policy",
            As3Object::ServiceHttp(_) => "Service_HTTP",
            As3Object::ServiceHttps(_) => "Service_HTTPS",
        }
    }

    pub fn as_service(&self) -> Option<&Service> {
        match self {
            As3Object::ServiceHttp(svc) | As3Object::ServiceHttps(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_policy(&self) -> Option<&EndpointPolicy> {
        match self {
            As3Object::EndpointPolicy(policy) => Some(policy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Pool {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<PoolMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressDiscovery {
    #[default]
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMember {
    pub service_port: u16,
    pub server_addresses: Vec<String>,
    pub address_discovery: AddressDiscovery,
}

impl PoolMember {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            service_port: port,
            server_addresses: vec![address.into()],
            address_discovery: AddressDiscovery::Static,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct EndpointPolicy {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub strategy: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PolicyRule {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PolicyCondition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<PolicyAction>,
}

/// Traffic phase a condition or action is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEvent {
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOperand {
    Equals,
}

/// String comparison; an absent operand means the appliance default.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CompareString {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<CompareOperand>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl CompareString {
    pub fn new(values: Vec<String>, equals: bool) -> Self {
        Self { operand: equals.then_some(CompareOperand::Equals), values }
    }
}

/// Predicate variant of a policy condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionMatch {
    /// Host match; `header` marks the match as HTTP-header based.
    Host { all: CompareString, header: bool },
    /// Match on the URI path segment at `index`.
    PathSegment { name: Option<String>, index: i32, values: CompareString, uri: bool },
    /// Match on the whole URI path.
    Path { name: Option<String>, values: CompareString, uri: bool },
    /// No predicate flag was set.
    #[default]
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyCondition {
    pub matcher: ConditionMatch,
    pub event: Option<PolicyEvent>,
}

impl PolicyCondition {
    /// The `type` tag emitted for this condition, if any.
    pub fn match_type(&self) -> Option<&'static str> {
        match &self.matcher {
            ConditionMatch::Host { header: true, .. } => Some("httpHeader"),
            ConditionMatch::PathSegment { uri: true, .. } | ConditionMatch::Path { uri: true, .. } => {
                Some("httpUri")
            }
            _ => None,
        }
    }

    /// The `name` field emitted for this condition, if any.
    pub fn name(&self) -> Option<&str> {
        match &self.matcher {
            ConditionMatch::Host { .. } => Some("host"),
            ConditionMatch::PathSegment { name, .. } | ConditionMatch::Path { name, .. } => {
                name.as_deref()
            }
            ConditionMatch::Unmatched => None,
        }
    }
}

// Conditions are flat objects on the wire: the variant picks which compare
// key is present, and `index` only exists for path segments.
impl Serialize for PolicyCondition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(match_type) = self.match_type() {
            map.serialize_entry("type", match_type)?;
        }
        if let Some(name) = self.name() {
            map.serialize_entry("name", name)?;
        }
        if let Some(event) = &self.event {
            map.serialize_entry("event", event)?;
        }
        match &self.matcher {
            ConditionMatch::Host { all, .. } => map.serialize_entry("all", all)?,
            ConditionMatch::PathSegment { index, values, .. } => {
                if *index != 0 {
                    map.serialize_entry("index", index)?;
                }
                map.serialize_entry("pathSegment", values)?;
            }
            ConditionMatch::Path { values, .. } => map.serialize_entry("path", values)?,
            ConditionMatch::Unmatched => {}
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Forward,
    HttpRedirect,
    HttpHeader,
    HttpUri,
}

/// Replacement value for a header or URI rewrite. Host rewrites carry
/// `name = "host"`; URI rewrites carry no name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replacement {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Pointer to another object: a short `use` name or a full `bigip` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResourcePointer {
    #[serde(rename = "use")]
    Use(String),
    #[serde(rename = "bigip")]
    BigIp(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardSelect {
    pub pool: ResourcePointer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PolicyAction {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<PolicyEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<Replacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<ForwardSelect>,
}

/// Forwarding target of a service bound through policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyEndpoint {
    /// Exactly one policy, referenced by path string.
    Single(String),
    /// Several policies, each as a full `bigip` pointer.
    Multiple(Vec<ResourcePointer>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub layer4: String,
    pub source: String,
    pub translate_server_address: bool,
    pub translate_server_port: bool,
    pub snat: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub virtual_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_endpoint: Option<PolicyEndpoint>,
    #[serde(rename = "iRules", skip_serializing_if = "Vec::is_empty")]
    pub irules: Vec<String>,
    #[serde(rename = "redirect80", skip_serializing_if = "Option::is_none")]
    pub redirect80: Option<bool>,
}

impl Service {
    /// A service with the protocol-independent defaults and no target.
    pub fn new(layer4: impl Into<String>) -> Self {
        Self {
            layer4: layer4.into(),
            source: "0.0.0.0/0".to_string(),
            translate_server_address: true,
            translate_server_port: true,
            snat: "auto".to_string(),
            virtual_addresses: vec![],
            virtual_port: None,
            pool: None,
            policy_endpoint: None,
            irules: vec![],
            redirect80: None,
        }
    }
}
