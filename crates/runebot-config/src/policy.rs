//! Command authorization — role-based access control for chat commands.
//!
//! Every chat command is classified as an `(action, resource)` pair, e.g.
//! `("write", "builds")` for `!addbuild`. The sender's chat role
//! (`broadcaster`, `moderator`, `viewer`) is checked against an ordered list
//! of [`PolicyRule`]s; the first matching rule decides.

/// The effect of a policy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The command may run.
    Allow,
    /// The command is refused.
    Deny,
}

/// A single policy rule. `"*"` matches any value in its position.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Chat role this rule applies to.
    pub role: String,
    /// Action being controlled (`read`, `write`, `*`).
    pub action: String,
    /// Resource being accessed (`builds`, `counters`, `levels`, `chat`, `*`).
    pub resource: String,
    /// Whether to allow or deny.
    pub effect: Effect,
    /// Higher priorities are evaluated first; ties keep insertion order.
    pub priority: u32,
}

impl PolicyRule {
    /// Create an Allow rule with priority 0.
    pub fn allow(role: &str, action: &str, resource: &str) -> Self {
        Self::with_effect(role, action, resource, Effect::Allow)
    }

    /// Create a Deny rule with priority 0.
    pub fn deny(role: &str, action: &str, resource: &str) -> Self {
        Self::with_effect(role, action, resource, Effect::Deny)
    }

    fn with_effect(role: &str, action: &str, resource: &str, effect: Effect) -> Self {
        Self {
            role: role.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            effect,
            priority: 0,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    fn matches(&self, role: &str, action: &str, resource: &str) -> bool {
        (self.role == "*" || self.role == role)
            && (self.action == "*" || self.action == action)
            && (self.resource == "*" || self.resource == resource)
    }
}

/// The result of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied,
    /// No rule matched; callers treat this as a denial.
    NoMatch,
}

/// Ordered rule set evaluated for every chat command.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    /// Kept sorted by descending priority.
    rules: Vec<PolicyRule>,
}

impl PolicyEngine {
    /// Create an engine with no rules (everything is `NoMatch`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, keeping the list ordered by priority.
    pub fn add_rule(&mut self, rule: PolicyRule) {
        let pos = self.rules.partition_point(|r| r.priority >= rule.priority);
        self.rules.insert(pos, rule);
    }

    /// Evaluate a request; the first matching rule wins.
    pub fn evaluate(&self, role: &str, action: &str, resource: &str) -> PolicyDecision {
        self.rules
            .iter()
            .find(|rule| rule.matches(role, action, resource))
            .map_or(PolicyDecision::NoMatch, |rule| match rule.effect {
                Effect::Allow => PolicyDecision::Allowed,
                Effect::Deny => PolicyDecision::Denied,
            })
    }

    /// Whether a rule explicitly allows the request.
    pub fn is_allowed(&self, role: &str, action: &str, resource: &str) -> bool {
        self.evaluate(role, action, resource) == PolicyDecision::Allowed
    }

    /// Number of rules in the engine.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Build an engine from a list of rules.
pub fn build_policy(rules: Vec<PolicyRule>) -> PolicyEngine {
    let mut engine = PolicyEngine::new();
    for rule in rules {
        engine.add_rule(rule);
    }
    engine
}

/// Stock rules: channel owner and moderators may do anything, everyone may
/// run read-only commands.
pub fn default_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule::allow("broadcaster", "*", "*").with_priority(10),
        PolicyRule::allow("moderator", "*", "*").with_priority(10),
        PolicyRule::allow("*", "read", "*"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_gate_writes() {
        let engine = build_policy(default_rules());

        assert!(engine.is_allowed("moderator", "write", "builds"));
        assert!(engine.is_allowed("broadcaster", "write", "counters"));
        assert!(engine.is_allowed("viewer", "read", "builds"));
        assert!(!engine.is_allowed("viewer", "write", "builds"));
    }

    #[test]
    fn test_no_match_is_not_allowed() {
        let engine = build_policy(vec![PolicyRule::allow("moderator", "*", "*")]);

        assert_eq!(
            engine.evaluate("viewer", "read", "builds"),
            PolicyDecision::NoMatch
        );
        assert!(!engine.is_allowed("viewer", "read", "builds"));
    }

    #[test]
    fn test_priority_beats_insertion_order() {
        let mut engine = PolicyEngine::new();
        engine.add_rule(PolicyRule::allow("*", "*", "*").with_priority(1));
        engine.add_rule(PolicyRule::deny("viewer", "*", "counters").with_priority(50));

        assert!(!engine.is_allowed("viewer", "read", "counters"));
        assert!(engine.is_allowed("viewer", "read", "builds"));
        assert!(engine.is_allowed("moderator", "write", "counters"));
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let engine = build_policy(vec![
            PolicyRule::deny("viewer", "read", "levels"),
            PolicyRule::allow("viewer", "read", "levels"),
        ]);
        assert_eq!(
            engine.evaluate("viewer", "read", "levels"),
            PolicyDecision::Denied
        );
    }

    #[test]
    fn test_rule_count() {
        assert_eq!(build_policy(default_rules()).rule_count(), 3);
    }
}
