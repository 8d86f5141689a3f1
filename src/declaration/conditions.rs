//! Rule condition translation
//!
//! Maps the flag-based domain [`Condition`] onto a typed [`PolicyCondition`].
//! Predicate flags are checked in the order host, path segment, path; the
//! first one set wins.

use crate::domain::Condition;

use super::model::{CompareString, ConditionMatch, PolicyCondition, PolicyEvent};

/// Ports on which host values are compared without a port suffix.
const DEFAULT_HTTP_PORTS: [u16; 2] = [80, 443];

/// Translate a rule's conditions in input order.
///
/// `port` is the virtual's listening port; host values gain a `:<port>`
/// suffix unless it is 80 or 443.
pub fn translate_conditions(conditions: &[Condition], port: u16) -> Vec<PolicyCondition> {
    conditions.iter().map(|c| translate_condition(c, port)).collect()
}

pub fn translate_condition(condition: &Condition, port: u16) -> PolicyCondition {
    let matcher = if condition.host {
        ConditionMatch::Host {
            all: CompareString::new(host_values(&condition.values, port), condition.equals),
            header: condition.http_host,
        }
    } else if condition.path_segment {
        ConditionMatch::PathSegment {
            name: custom_name(condition),
            index: condition.index,
            values: CompareString::new(condition.values.clone(), condition.equals),
            uri: condition.http_uri,
        }
    } else if condition.path {
        ConditionMatch::Path {
            name: custom_name(condition),
            values: CompareString::new(condition.values.clone(), condition.equals),
            uri: condition.http_uri,
        }
    } else {
        ConditionMatch::Unmatched
    };

    PolicyCondition { matcher, event: condition.request.then_some(PolicyEvent::Request) }
}

fn host_values(values: &[String], port: u16) -> Vec<String> {
    if DEFAULT_HTTP_PORTS.contains(&port) {
        values.to_vec()
    } else {
        values.iter().map(|value| format!("{}:{}", value, port)).collect()
    }
}

fn custom_name(condition: &Condition) -> Option<String> {
    (!condition.name.is_empty()).then(|| condition.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::model::CompareOperand;
    use proptest::prelude::*;

    fn host_condition(values: &[&str]) -> Condition {
        Condition {
            host: true,
            values: values.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_host_on_default_ports_passes_through() {
        for port in [80, 443] {
            let translated = translate_condition(&host_condition(&["example.com"]), port);
            match translated.matcher {
                ConditionMatch::Host { all, header } => {
                    assert_eq!(all.values, vec!["example.com"]);
                    assert_eq!(all.operand, None);
                    assert!(!header);
                }
                other => panic!("expected host match, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_host_on_other_port_gets_suffix() {
        let mut condition = host_condition(&["example.com", "www.example.com"]);
        condition.equals = true;
        condition.http_host = true;

        let translated = translate_condition(&condition, 8080);
        assert_eq!(translated.match_type(), Some("httpHeader"));
        assert_eq!(translated.name(), Some("host"));
        match translated.matcher {
            ConditionMatch::Host { all, .. } => {
                assert_eq!(all.values, vec!["example.com:8080", "www.example.com:8080"]);
                assert_eq!(all.operand, Some(CompareOperand::Equals));
            }
            other => panic!("expected host match, got {:?}", other),
        }
    }

    #[test]
    fn test_path_segment_carries_name_index_and_uri_type() {
        let condition = Condition {
            path_segment: true,
            name: "seg".to_string(),
            index: 2,
            http_uri: true,
            values: vec!["v1".to_string()],
            ..Default::default()
        };

        let translated = translate_condition(&condition, 80);
        assert_eq!(translated.match_type(), Some("httpUri"));
        assert_eq!(
            translated.matcher,
            ConditionMatch::PathSegment {
                name: Some("seg".to_string()),
                index: 2,
                values: CompareString::new(vec!["v1".to_string()], false),
                uri: true,
            }
        );
    }

    #[test]
    fn test_path_has_no_index() {
        let condition = Condition {
            path: true,
            index: 3,
            equals: true,
            values: vec!["/login".to_string()],
            ..Default::default()
        };

        let translated = translate_condition(&condition, 80);
        assert_eq!(translated.name(), None);
        let value = serde_json::to_value(&translated).unwrap();
        assert!(value.get("index").is_none());
        assert_eq!(value["path"]["operand"], "equals");
    }

    #[test]
    fn test_host_flag_takes_precedence() {
        let condition = Condition { host: true, path: true, ..Default::default() };
        assert!(matches!(translate_condition(&condition, 80).matcher, ConditionMatch::Host { .. }));
    }

    #[test]
    fn test_request_flag_sets_event_for_any_variant() {
        let unmatched = Condition { request: true, ..Default::default() };
        let translated = translate_condition(&unmatched, 80);
        assert_eq!(translated.matcher, ConditionMatch::Unmatched);
        assert_eq!(translated.event, Some(PolicyEvent::Request));

        let path = Condition { path: true, request: true, ..Default::default() };
        assert_eq!(translate_condition(&path, 80).event, Some(PolicyEvent::Request));
    }

    proptest! {
        #[test]
        fn prop_host_suffix_depends_only_on_port(
            port in any::<u16>(),
            values in proptest::collection::vec("[a-z]{1,12}\\.com", 1..5),
        ) {
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            let translated = translate_condition(&host_condition(&refs), port);
            let ConditionMatch::Host { all, .. } = translated.matcher else {
                panic!("expected host match");
            };

            if port == 80 || port == 443 {
                prop_assert_eq!(all.values, values);
            } else {
                let expected: Vec<String> =
                    values.iter().map(|v| format!("{}:{}", v, port)).collect();
                prop_assert_eq!(all.values, expected);
            }
        }
    }
}
