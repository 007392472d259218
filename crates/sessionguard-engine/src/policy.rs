//! Policy engine.
//!
//! Pure rule matching over the current evaluation context. Each enabled
//! policy is a conjunction of predicates; every matched policy contributes
//! its action and a human-readable reason, and the final action is the
//! highest-priority action among all matches (`block > flag > notify >
//! allow`). Evaluation never short-circuits at the first block: reasons
//! from every matched policy are aggregated for auditability.

use sessionguard_core::{
    Decision, Policy, PolicyAction, PolicyStore, ProjectId, Result,
};
use std::sync::Arc;

/// Context a policy set is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Current aggregate risk score.
    pub risk_score: f64,
    /// Currently detected behavioral patterns.
    pub patterns: Vec<String>,
    /// Reasoning-trace labels, when trace analysis has run. `None` means
    /// label predicates fail rather than being skipped.
    pub trace_labels: Option<Vec<String>>,
    /// Total events in the session, when known. An absent count skips
    /// (not fails) the `event_count` predicate.
    pub event_count: Option<u64>,
}

/// Evaluate one policy's conditions against the context.
///
/// Returns the matched-condition descriptions, or `None` when any
/// configured predicate fails. A policy with no predicates configured
/// always matches.
fn match_conditions(policy: &Policy, ctx: &EvaluationContext) -> Option<Vec<String>> {
    let conditions = &policy.conditions;
    let mut reasons = Vec::new();

    if let Some(min) = conditions.min_risk_score {
        if ctx.risk_score < min {
            return None;
        }
        reasons.push(format!("risk score {:.2} >= {min}", ctx.risk_score));
    }

    if let Some(max) = conditions.max_risk_score {
        if ctx.risk_score > max {
            return None;
        }
        reasons.push(format!("risk score {:.2} <= {max}", ctx.risk_score));
    }

    if let Some(any) = conditions.patterns_any.as_ref().filter(|v| !v.is_empty()) {
        let matched: Vec<&str> = any
            .iter()
            .filter(|p| ctx.patterns.contains(p))
            .map(String::as_str)
            .collect();
        if matched.is_empty() {
            return None;
        }
        reasons.push(format!("patterns match any of [{}]", matched.join(", ")));
    }

    if let Some(all) = conditions.patterns_all.as_ref().filter(|v| !v.is_empty()) {
        if !all.iter().all(|p| ctx.patterns.contains(p)) {
            return None;
        }
        reasons.push(format!("patterns match all of [{}]", all.join(", ")));
    }

    // Label predicates fail outright when the context carries no labels.
    if let Some(any) = conditions
        .trace_labels_any
        .as_ref()
        .filter(|v| !v.is_empty())
    {
        let labels = ctx.trace_labels.as_deref()?;
        let matched: Vec<&str> = any
            .iter()
            .filter(|l| labels.contains(l))
            .map(String::as_str)
            .collect();
        if matched.is_empty() {
            return None;
        }
        reasons.push(format!("trace labels match any of [{}]", matched.join(", ")));
    }

    if let Some(all) = conditions
        .trace_labels_all
        .as_ref()
        .filter(|v| !v.is_empty())
    {
        let labels = ctx.trace_labels.as_deref()?;
        if !all.iter().all(|l| labels.contains(l)) {
            return None;
        }
        reasons.push(format!("trace labels match all of [{}]", all.join(", ")));
    }

    // Unlike the label predicates, an absent count skips the check rather
    // than failing it.
    if let Some(range) = &conditions.event_count {
        if let Some(count) = ctx.event_count {
            if range.min.is_some_and(|min| count < min) {
                return None;
            }
            if range.max.is_some_and(|max| count > max) {
                return None;
            }
            reasons.push(format!("event count {count} in range"));
        }
    }

    if reasons.is_empty() {
        if !conditions.is_unconditional() {
            return None;
        }
        reasons.push("default policy (no conditions)".to_string());
    }

    Some(reasons)
}

/// Evaluates enabled policies against a session's current context.
pub struct PolicyEngine {
    policies: Arc<dyn PolicyStore>,
}

impl PolicyEngine {
    pub fn new(policies: Arc<dyn PolicyStore>) -> Self {
        Self { policies }
    }

    /// Evaluate all enabled policies for a project. Pure with respect to
    /// the context: the same context and policy set always produce the
    /// same decision.
    pub async fn evaluate(
        &self,
        project_id: ProjectId,
        ctx: &EvaluationContext,
    ) -> Result<Decision> {
        let policies = self.policies.list_enabled_policies(project_id).await?;

        let mut action = PolicyAction::Allow;
        let mut reasons = Vec::new();
        let mut triggered_policy_ids = Vec::new();

        for policy in &policies {
            let Some(matched) = match_conditions(policy, ctx) else {
                continue;
            };
            action = action.max(policy.actions.action);
            reasons.push(format!("Policy \"{}\": {}", policy.name, matched.join(", ")));
            triggered_policy_ids.push(policy.id);
        }

        if reasons.is_empty() {
            reasons.push("No policies triggered".to_string());
        }

        Ok(Decision {
            action,
            reasons,
            triggered_policy_ids,
            risk_score: ctx.risk_score,
            patterns: ctx.patterns.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
