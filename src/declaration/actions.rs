//! Rule action translation
//!
//! Action flags are independent, so combinations resolve by evaluation
//! order: the `type` tag takes the last set flag of forward, redirect,
//! header, URI; a header replace is written before a URI replace and the URI
//! replace overwrites it when both are set. Pool selection is attached
//! independently of every other flag.

use crate::domain::Action;

use super::context::last_segment;
use super::model::{ActionKind, ForwardSelect, PolicyAction, PolicyEvent, Replacement, ResourcePointer};

/// Translate a rule's actions in input order.
pub fn translate_actions(actions: &[Action]) -> Vec<PolicyAction> {
    actions.iter().map(translate_action).collect()
}

pub fn translate_action(action: &Action) -> PolicyAction {
    let mut translated = PolicyAction::default();

    if action.forward {
        translated.kind = Some(ActionKind::Forward);
    }
    if action.request {
        translated.event = Some(PolicyEvent::Request);
    }
    if action.redirect {
        translated.kind = Some(ActionKind::HttpRedirect);
    }
    if action.http_host {
        translated.kind = Some(ActionKind::HttpHeader);
    }
    if action.http_uri {
        translated.kind = Some(ActionKind::HttpUri);
    }
    if !action.location.is_empty() {
        translated.location = Some(action.location.clone());
    }

    // Host and URI rewrites share one replacement slot
    if action.replace && action.http_host {
        translated.replace =
            Some(Replacement { value: action.value.clone(), name: Some("host".to_string()) });
    }
    if action.replace && action.http_uri {
        translated.replace = Some(Replacement { value: action.value.clone(), name: None });
    }

    if !action.pool.is_empty() {
        translated.select = Some(ForwardSelect {
            pool: ResourcePointer::Use(last_segment(&action.pool).to_string()),
        });
    }

    translated
}
