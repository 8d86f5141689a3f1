//! Declaration synthesis
//!
//! Builds one [`Declaration`] from the full set of resource configs. For
//! every resource, policies are emitted first, then pools, then the service;
//! all land in the tenant's shared application keyed by name.
//!
//! Nothing here returns an error. A broken template or a malformed virtual
//! destination is logged and the cycle continues with a degraded document.

use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use crate::domain::{ResourceConfig, ResourceConfigs};
use crate::synth_span;

use super::actions::translate_actions;
use super::conditions::translate_conditions;
use super::context::{last_segment, SynthesisContext};
use super::model::{
    Application, As3Object, Declaration, EndpointPolicy, PolicyEndpoint, PolicyRule, Pool,
    PoolMember, ResourcePointer, Service, Tenant, RESERVED_APPLICATION_KEYS,
};
use super::template::{DeclarationTemplate, BASE_DECLARATION};

/// Address and port parsed from a virtual destination.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VirtualAddress {
    pub address: String,
    pub port: u16,
}

impl VirtualAddress {
    /// Parse the final `/` segment of `destination` as `ip:port`.
    ///
    /// Returns `None` unless the segment splits on `:` into exactly two
    /// parts. A non-numeric or out-of-range port is logged and parses as 0.
    pub fn parse(destination: &str) -> Option<Self> {
        let parts: Vec<&str> = last_segment(destination).split(':').collect();
        match parts.as_slice() {
            [address, port] => {
                let port = port.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        destination,
                        port,
                        error = %e,
                        "Invalid Virtual Server Destination Port"
                    );
                    0
                });
                Some(Self { address: address.to_string(), port })
            }
            _ => None,
        }
    }

    fn is_complete(&self) -> bool {
        !self.address.is_empty() && self.port != 0
    }
}

/// Synthesize the declaration for every resource config.
pub fn synthesize(ctx: &SynthesisContext, configs: &ResourceConfigs) -> Declaration {
    let span = synth_span!(ctx.tenant(), resources = configs.len());
    let _guard = span.enter();

    let template = DeclarationTemplate::parse(BASE_DECLARATION).unwrap_or_else(|e| {
        error!(error = %e, "Declaration template is invalid, emitting empty header");
        DeclarationTemplate::default()
    });

    let shared = build_shared_application(ctx, configs);
    debug!(objects = shared.len(), "Built shared application");

    let mut tenants = BTreeMap::new();
    tenants.insert(ctx.tenant().to_string(), Tenant::new(shared));
    template.into_declaration(tenants)
}

/// Build the shared application holding every policy, pool and service.
pub fn build_shared_application(ctx: &SynthesisContext, configs: &ResourceConfigs) -> Application {
    let mut shared = Application::shared();

    for cfg in configs {
        let destination = VirtualAddress::parse(&cfg.virtual_server.destination)
            .unwrap_or_else(|| {
                error!(
                    virtual_server = %cfg.virtual_server.name,
                    destination = %cfg.virtual_server.destination,
                    "Invalid Virtual Server Destination IP address/Port"
                );
                VirtualAddress::default()
            });

        for (name, policy) in create_policies(cfg, destination.port) {
            insert_object(&mut shared, name, As3Object::EndpointPolicy(policy));
        }

        for (name, pool) in create_pools(cfg) {
            insert_object(&mut shared, name, As3Object::Pool(pool));
        }

        let service = create_service(ctx, cfg, &destination);
        insert_object(&mut shared, cfg.virtual_server.name.clone(), service);
    }

    shared
}

// Later objects replace earlier ones with the same name. Names taken by the
// application's own properties are never inserted.
fn insert_object(shared: &mut Application, name: String, object: As3Object) {
    let class = object.class();
    if RESERVED_APPLICATION_KEYS.contains(&name.as_str()) {
        warn!(
            object = %name,
            class,
            "Object name collides with a shared application property, object skipped"
        );
        return;
    }
    if let Some(previous) = shared.insert(name.clone(), object) {
        warn!(
            object = %name,
            replaced_class = previous.class(),
            class,
            "Object name collision in shared application, earlier object overwritten"
        );
    }
}

/// Endpoint policies of one resource, keyed by policy name.
pub fn create_policies(cfg: &ResourceConfig, port: u16) -> Vec<(String, EndpointPolicy)> {
    cfg.policies
        .iter()
        .map(|policy| {
            let endpoint_policy = EndpointPolicy {
                strategy: last_segment(&policy.strategy).to_string(),
                rules: policy
                    .rules
                    .iter()
                    .map(|rule| PolicyRule {
                        name: rule.name.clone(),
                        conditions: translate_conditions(&rule.conditions, port),
                        actions: translate_actions(&rule.actions),
                    })
                    .collect(),
            };
            (policy.name.clone(), endpoint_policy)
        })
        .collect()
}

/// Pools of one resource, keyed by pool name, members in input order.
pub fn create_pools(cfg: &ResourceConfig) -> Vec<(String, Pool)> {
    cfg.pools
        .iter()
        .map(|pool| {
            let members = pool
                .members
                .iter()
                .map(|member| PoolMember::new(member.address.clone(), member.port))
                .collect();
            (pool.name.clone(), Pool { members })
        })
        .collect()
}

/// The service object for a resource's virtual.
///
/// The forwarding target depends only on how many policies the virtual
/// references: none binds the named pool, one binds a single policy path,
/// more bind a list of full pointers.
pub fn create_service(
    ctx: &SynthesisContext,
    cfg: &ResourceConfig,
    destination: &VirtualAddress,
) -> As3Object {
    let vs = &cfg.virtual_server;
    let mut svc = Service::new(vs.ip_protocol.clone());

    match vs.policies.as_slice() {
        [] => {
            if !vs.pool_name.is_empty() {
                svc.pool = Some(ctx.pointer(&vs.pool_name));
            }
        }
        [policy] => {
            svc.policy_endpoint = Some(PolicyEndpoint::Single(ctx.pointer(&policy.name)));
        }
        policies => {
            svc.policy_endpoint = Some(PolicyEndpoint::Multiple(
                policies
                    .iter()
                    .map(|policy| ResourcePointer::BigIp(ctx.pointer(&policy.name)))
                    .collect(),
            ));
        }
    }

    if destination.is_complete() {
        svc.virtual_addresses = vec![destination.address.clone()];
        svc.virtual_port = Some(destination.port);
    }

    svc.irules = vs.irules.iter().map(|irule| last_segment(irule).to_string()).collect();

    if cfg.tls_enabled {
        upgrade_to_https(svc)
    } else {
        As3Object::ServiceHttp(svc)
    }
}

/// Switch a service to its HTTPS class; port 80 redirection stays off.
pub fn upgrade_to_https(mut svc: Service) -> As3Object {
    svc.redirect80 = Some(false);
    As3Object::ServiceHttps(svc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::model::ConditionMatch;
    use crate::domain::{Action, Condition, Member, Policy, PolicyRef, Rule, Virtual};
    use serde_json::json;
    use tracing_test::traced_test;

    fn ctx() -> SynthesisContext {
        SynthesisContext::new("k8s")
    }

    fn resource(name: &str, destination: &str, policies: &[&str]) -> ResourceConfig {
        ResourceConfig {
            virtual_server: Virtual {
                name: name.to_string(),
                destination: destination.to_string(),
                pool_name: format!("/k8s/{}_pool", name),
                ip_protocol: "tcp".to_string(),
                policies: policies.iter().map(|p| PolicyRef::new(*p)).collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_destination() {
        assert_eq!(
            VirtualAddress::parse("/k8s/10.0.0.1:8080"),
            Some(VirtualAddress { address: "10.0.0.1".to_string(), port: 8080 })
        );
        assert_eq!(
            VirtualAddress::parse("10.0.0.1:80"),
            Some(VirtualAddress { address: "10.0.0.1".to_string(), port: 80 })
        );
        assert_eq!(
            VirtualAddress::parse("/k8s/10.0.0.1:http"),
            Some(VirtualAddress { address: "10.0.0.1".to_string(), port: 0 })
        );
        assert_eq!(VirtualAddress::parse("/k8s/10.0.0.1"), None);
        assert_eq!(VirtualAddress::parse("/k8s/fe80::1:80"), None);
    }

    #[test]
    fn test_service_binds_pool_without_policies() {
        let cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::parse("10.0.0.1:80").unwrap());
        let svc = svc.as_service().unwrap();

        assert_eq!(svc.pool.as_deref(), Some("/k8s_AS3/Shared/web_pool"));
        assert!(svc.policy_endpoint.is_none());
        assert_eq!(svc.virtual_addresses, vec!["10.0.0.1"]);
        assert_eq!(svc.virtual_port, Some(80));
    }

    #[test]
    fn test_service_without_policies_or_pool_has_no_target() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        cfg.virtual_server.pool_name.clear();
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::default());
        let svc = svc.as_service().unwrap();
        assert!(svc.pool.is_none());
        assert!(svc.policy_endpoint.is_none());
    }

    #[test]
    fn test_service_binds_single_policy_path() {
        let cfg = resource("web", "/k8s/10.0.0.1:80", &["web_policy"]);
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::default());
        let svc = svc.as_service().unwrap();

        assert_eq!(
            svc.policy_endpoint,
            Some(PolicyEndpoint::Single("/k8s_AS3/Shared/web_policy".to_string()))
        );
        assert!(svc.pool.is_none());
    }

    #[test]
    fn test_service_binds_pointer_list_for_many_policies() {
        let cfg = resource("web", "/k8s/10.0.0.1:80", &["p1", "p2", "p3"]);
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::default());

        match &svc.as_service().unwrap().policy_endpoint {
            Some(PolicyEndpoint::Multiple(pointers)) => {
                assert_eq!(pointers.len(), 3);
                assert_eq!(pointers[2], ResourcePointer::BigIp("/k8s_AS3/Shared/p3".to_string()));
            }
            other => panic!("expected pointer list, got {:?}", other),
        }
    }

    #[test]
    fn test_tls_resource_upgrades_service() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:443", &[]);
        cfg.tls_enabled = true;
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::parse("10.0.0.1:443").unwrap());

        assert_eq!(svc.class(), "Service_HTTPS");
        assert_eq!(svc.as_service().unwrap().redirect80, Some(false));
    }

    #[test]
    fn test_irules_use_last_segment() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        cfg.virtual_server.irules = vec!["/Common/redirect_irule".to_string(), "plain".to_string()];
        let svc = create_service(&ctx(), &cfg, &VirtualAddress::default());
        assert_eq!(svc.as_service().unwrap().irules, vec!["redirect_irule", "plain"]);
    }

    #[traced_test]
    #[test]
    fn test_malformed_destination_degrades_service() {
        let configs: ResourceConfigs =
            vec![resource("web", "/k8s/not-an-address", &[])].into_iter().collect();

        let shared = build_shared_application(&ctx(), &configs);
        let svc = shared.get("web").and_then(As3Object::as_service).unwrap();

        assert!(svc.virtual_addresses.is_empty());
        assert!(svc.virtual_port.is_none());
        assert_eq!(svc.pool.as_deref(), Some("/k8s_AS3/Shared/web_pool"));
        assert!(logs_contain("Invalid Virtual Server Destination"));
    }

    #[traced_test]
    #[test]
    fn test_out_of_range_port_is_logged() {
        assert_eq!(
            VirtualAddress::parse("/k8s/10.0.0.1:70000"),
            Some(VirtualAddress { address: "10.0.0.1".to_string(), port: 0 })
        );
        assert!(logs_contain("Invalid Virtual Server Destination Port"));

        let configs: ResourceConfigs =
            vec![resource("web", "/k8s/10.0.0.1:70000", &[])].into_iter().collect();
        let shared = build_shared_application(&ctx(), &configs);
        let svc = shared.get("web").and_then(As3Object::as_service).unwrap();
        assert!(svc.virtual_addresses.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_reserved_names_are_not_inserted() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        cfg.pools = vec![
            crate::domain::Pool { name: "class".to_string(), ..Default::default() },
            crate::domain::Pool { name: "template".to_string(), ..Default::default() },
        ];
        let configs: ResourceConfigs = vec![cfg].into_iter().collect();

        let shared = build_shared_application(&ctx(), &configs);
        assert!(shared.get("class").is_none());
        assert!(shared.get("template").is_none());
        assert!(logs_contain("collides with a shared application property"));

        let value = serde_json::to_value(&shared).unwrap();
        assert_eq!(value["class"], "Application");
        assert_eq!(value["template"], "shared");
    }

    #[test]
    fn test_pools_preserve_member_order() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        cfg.pools = vec![crate::domain::Pool {
            name: "web_pool".to_string(),
            members: vec![Member::new("10.1.0.2", 30080), Member::new("10.1.0.1", 30080)],
            ..Default::default()
        }];

        let pools = create_pools(&cfg);
        assert_eq!(pools.len(), 1);
        let (name, pool) = &pools[0];
        assert_eq!(name, "web_pool");
        assert_eq!(pool.members[0].server_addresses, vec!["10.1.0.2"]);
        assert_eq!(pool.members[1].server_addresses, vec!["10.1.0.1"]);
    }

    #[test]
    fn test_policy_strategy_and_rules() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:8080", &["web_policy"]);
        cfg.policies = vec![Policy {
            name: "web_policy".to_string(),
            strategy: "/Common/first-match".to_string(),
            rules: vec![Rule {
                name: "rule1".to_string(),
                conditions: vec![Condition {
                    host: true,
                    equals: true,
                    values: vec!["example.com".to_string()],
                    ..Default::default()
                }],
                actions: vec![Action {
                    forward: true,
                    pool: "pool1".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }];

        let policies = create_policies(&cfg, 8080);
        let (name, policy) = &policies[0];
        assert_eq!(name, "web_policy");
        assert_eq!(policy.strategy, "first-match");
        assert_eq!(policy.rules[0].name, "rule1");
        match &policy.rules[0].conditions[0].matcher {
            ConditionMatch::Host { all, .. } => assert_eq!(all.values, vec!["example.com:8080"]),
            other => panic!("expected host match, got {:?}", other),
        }
    }

    #[traced_test]
    #[test]
    fn test_name_collision_overwrites_and_warns() {
        let mut cfg = resource("web", "/k8s/10.0.0.1:80", &[]);
        cfg.pools = vec![crate::domain::Pool { name: "web".to_string(), ..Default::default() }];
        let configs: ResourceConfigs = vec![cfg].into_iter().collect();

        let shared = build_shared_application(&ctx(), &configs);
        assert_eq!(shared.get("web").map(As3Object::class), Some("Service_HTTP"));
        assert!(logs_contain("Object name collision"));
    }

    #[test]
    fn test_synthesize_document_shape() {
        let configs: ResourceConfigs =
            vec![resource("web", "/k8s/10.0.0.1:80", &[])].into_iter().collect();
        let decl = synthesize(&ctx(), &configs);
        let value = serde_json::to_value(&decl).unwrap();

        assert_eq!(value["class"], "AS3");
        assert_eq!(
            value["declaration"]["k8s_AS3"]["Shared"]["web"],
            json!({
                "class": "Service_HTTP",
                "layer4": "tcp",
                "source": "0.0.0.0/0",
                "translateServerAddress": true,
                "translateServerPort": true,
                "snat": "auto",
                "virtualAddresses": ["10.0.0.1"],
                "virtualPort": 80,
                "pool": "/k8s_AS3/Shared/web_pool"
            })
        );
        assert_eq!(value["declaration"]["k8s_AS3"]["class"], "Tenant");
        assert_eq!(value["declaration"]["k8s_AS3"]["Shared"]["class"], "Application");
        assert_eq!(value["declaration"]["k8s_AS3"]["Shared"]["template"], "shared");
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let configs: ResourceConfigs = vec![
            resource("b", "/k8s/10.0.0.2:80", &[]),
            resource("a", "/k8s/10.0.0.1:80", &[]),
        ]
        .into_iter()
        .collect();

        let first = serde_json::to_string(&synthesize(&ctx(), &configs)).unwrap();
        let second = serde_json::to_string(&synthesize(&ctx(), &configs)).unwrap();
        assert_eq!(first, second);
    }
}
