//! Path authorization.
//!
//! An [`AccessPolicy`] holds an ordered list of [`AccessRule`]s. For a
//! requested path the first rule whose pattern matches decides: the request
//! is allowed iff the identity holds at least one of the rule's required
//! authorities. Anonymous requests never satisfy a rule that requires an
//! authority. Paths that match no rule fall to the policy's
//! [`DefaultPolicy`], which is `Allow` unless configured otherwise.
//!
//! Paths matching an ignored pattern bypass evaluation altogether.
//!
//! ## Patterns
//!
//! Patterns are Ant-style and anchored:
//!
//! | Pattern | Matches |
//! |---|---|
//! | `?` | exactly one character other than `/` |
//! | `*` | any run of characters inside one path segment |
//! | `**` | any run of characters across segments |
//! | `/prefix/**` | `/prefix` itself and everything below it |

use std::collections::BTreeSet;
use std::fmt;

use formgate_core::error::GateError;
use formgate_core::settings::{AccessSettings, DefaultPolicy};
use regex::Regex;

use crate::user::{Authority, Identity};

/// The outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request is refused.
    Deny,
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<DefaultPolicy> for Decision {
    fn from(policy: DefaultPolicy) -> Self {
        match policy {
            DefaultPolicy::Allow => Self::Allow,
            DefaultPolicy::Deny => Self::Deny,
        }
    }
}

/// A compiled Ant-style path pattern.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles an Ant-style pattern. Patterns must start with `/`.
    pub fn compile(pattern: &str) -> Result<Self, GateError> {
        if !pattern.starts_with('/') {
            return Err(GateError::ConfigurationError(format!(
                "Path pattern '{pattern}' must start with '/'"
            )));
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');

        let mut i = 0;
        while i < chars.len() {
            let at = |offset: usize| chars.get(i + offset).copied();
            match chars[i] {
                // "/**" at a segment boundary also matches the bare prefix
                '/' if at(1) == Some('*')
                    && at(2) == Some('*')
                    && matches!(at(3), None | Some('/')) =>
                {
                    expr.push_str("(?:/.*)?");
                    i += 3;
                }
                '*' if at(1) == Some('*') => {
                    expr.push_str(".*");
                    i += 2;
                }
                '*' => {
                    expr.push_str("[^/]*");
                    i += 1;
                }
                '?' => {
                    expr.push_str("[^/]");
                    i += 1;
                }
                c => {
                    let mut buf = [0u8; 4];
                    expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                    i += 1;
                }
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            GateError::ConfigurationError(format!("Invalid path pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns `true` if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

/// A path pattern and the authorities, any one of which grants access.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pattern: PathPattern,
    required: BTreeSet<String>,
}

impl AccessRule {
    /// Creates a rule. An empty authority list permits everyone.
    pub fn new(pattern: &str, authorities: &[&str]) -> Result<Self, GateError> {
        Ok(Self {
            pattern: PathPattern::compile(pattern)?,
            required: authorities.iter().map(|a| (*a).to_string()).collect(),
        })
    }

    /// Returns the rule's pattern.
    pub const fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the authorities this rule accepts.
    pub const fn required_authorities(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Returns `true` if the rule lets `identity` through.
    pub fn permits(&self, identity: Option<&Identity>) -> bool {
        self.permits_authorities(identity.map(Identity::authorities))
    }

    /// Like [`permits`](Self::permits), for a bare authority set.
    /// `None` stands for an anonymous caller.
    pub fn permits_authorities(&self, granted: Option<&BTreeSet<String>>) -> bool {
        if self.required.is_empty() {
            return true;
        }
        granted.is_some_and(|granted| !granted.is_disjoint(&self.required))
    }
}

/// Ordered access rules plus ignored paths and a default decision.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    ignored: Vec<PathPattern>,
    default_policy: DefaultPolicy,
}

impl AccessPolicy {
    /// Creates an empty policy with the given default decision.
    pub fn new(default_policy: DefaultPolicy) -> Self {
        Self {
            rules: Vec::new(),
            ignored: Vec::new(),
            default_policy,
        }
    }

    /// Builds a policy from settings.
    ///
    /// Authority names are validated and normalised (`admin` → `ADMIN`) so a
    /// typo fails at startup instead of silently locking a path.
    pub fn from_settings(settings: &AccessSettings) -> Result<Self, GateError> {
        let mut policy = Self::new(settings.default_policy);
        for rule in &settings.rules {
            let authorities = rule
                .authorities
                .iter()
                .map(|a| a.parse::<Authority>().map(Authority::as_str))
                .collect::<Result<Vec<_>, _>>()?;
            policy.rules.push(AccessRule::new(&rule.pattern, &authorities)?);
        }
        for pattern in &settings.ignored {
            policy.ignored.push(PathPattern::compile(pattern)?);
        }
        Ok(policy)
    }

    /// Appends a rule; it is evaluated after all existing rules.
    #[must_use]
    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a pattern whose paths bypass authorization.
    #[must_use]
    pub fn with_ignored(mut self, pattern: PathPattern) -> Self {
        self.ignored.push(pattern);
        self
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Returns the decision for paths no rule matches.
    pub const fn default_policy(&self) -> DefaultPolicy {
        self.default_policy
    }

    /// Returns `true` if `path` bypasses the security chain.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.iter().any(|p| p.matches(path))
    }

    /// Returns the first rule matching `path`.
    pub fn matching_rule(&self, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Decides whether `identity` (or an anonymous caller) may access `path`.
    pub fn authorize(&self, path: &str, identity: Option<&Identity>) -> Decision {
        let decision = self.evaluate(path, identity.map(Identity::authorities));
        tracing::debug!(
            path,
            user = identity.map_or("<anonymous>", Identity::username),
            ?decision,
            "Authorization decision"
        );
        decision
    }

    /// Evaluates the policy for a bare authority set without logging.
    ///
    /// Used for dry runs, where there is no verified identity.
    pub fn evaluate(&self, path: &str, granted: Option<&BTreeSet<String>>) -> Decision {
        if self.is_ignored(path) {
            return Decision::Allow;
        }
        match self.matching_rule(path) {
            Some(rule) if rule.permits_authorities(granted) => Decision::Allow,
            Some(_) => Decision::Deny,
            None => Decision::from(self.default_policy),
        }
    }

    /// Like [`authorize`](Self::authorize), but a denial is an `AccessDenied` error.
    pub fn require(&self, path: &str, identity: Option<&Identity>) -> Result<(), GateError> {
        match self.authorize(path, identity) {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(GateError::AccessDenied(path.to_string())),
        }
    }
}
