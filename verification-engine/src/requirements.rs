//! Named predicates
//!
//! Contracts state their rules as named boolean predicates. Every predicate
//! is recorded, so a rejected transaction reports all broken rules rather
//! than the first one.

/// Outcome of one named predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Human-readable predicate name
    pub name: String,
    /// Whether it held
    pub holds: bool,
}

/// Predicates evaluated for one state group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    checks: Vec<Requirement>,
}

impl Requirements {
    /// No predicates
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a predicate
    pub fn require(&mut self, name: impl Into<String>, holds: bool) -> &mut Self {
        self.checks.push(Requirement {
            name: name.into(),
            holds,
        });
        self
    }

    /// Merge predicates recorded elsewhere
    pub fn extend(&mut self, other: Requirements) -> &mut Self {
        self.checks.extend(other.checks);
        self
    }

    /// All recorded predicates, in order
    pub fn checks(&self) -> &[Requirement] {
        &self.checks
    }

    /// Names of the predicates that failed
    pub fn violations(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|c| !c.holds)
            .map(|c| c.name.as_str())
    }

    /// Every predicate held
    pub fn is_satisfied(&self) -> bool {
        self.checks.iter().all(|c| c.holds)
    }
}

/// Build a set of requirements in one expression
///
/// ```
/// use verification_engine::requirements::require_that;
///
/// let checks = require_that(|r| {
///     r.require("the face value is not zero", true);
///     r.require("there is no input state", false);
/// });
/// assert_eq!(checks.violations().collect::<Vec<_>>(), vec!["there is no input state"]);
/// ```
pub fn require_that(build: impl FnOnce(&mut Requirements)) -> Requirements {
    let mut requirements = Requirements::new();
    build(&mut requirements);
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_predicates_are_kept() {
        let checks = require_that(|r| {
            r.require("a", false).require("b", true).require("c", false);
        });

        assert_eq!(checks.checks().len(), 3);
        assert!(!checks.is_satisfied());
        assert_eq!(checks.violations().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_empty_is_satisfied() {
        assert!(Requirements::new().is_satisfied());
    }
}
