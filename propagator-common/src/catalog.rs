use crate::error::PropagationError;
use crate::target::Target;

/// The external boundary that enumerates tenant databases. The engine does
/// not cache this list beyond one job.
pub trait Catalog: Send + Sync {
    fn list_targets(&self, pattern: &str) -> Result<Vec<Target>, PropagationError>;
}

/// A fixed in-memory catalog matching a `%`-wildcard pattern against each
/// target's database name. Intended for tests and the binary's env-driven
/// entry point; real deployments supply their own tenant registry.
pub struct StaticCatalog {
    targets: Vec<Target>,
}

impl StaticCatalog {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

impl Catalog for StaticCatalog {
    fn list_targets(&self, pattern: &str) -> Result<Vec<Target>, PropagationError> {
        Ok(self
            .targets
            .iter()
            .filter(|t| glob_match(pattern, &t.database))
            .cloned()
            .collect())
    }
}

/// Minimal `%`-as-wildcard matcher, the only metacharacter a `cmp_%`-style
/// tenant database pattern requires.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('%') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> Target {
        Target::new("host", 5432, name, "ref")
    }

    #[test]
    fn matches_prefix_wildcard() {
        let catalog = StaticCatalog::new(vec![target("cmp_42"), target("cmp_7"), target("other")]);
        let matched = catalog.list_targets("cmp_%").unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn matches_exact_pattern_without_wildcard() {
        let catalog = StaticCatalog::new(vec![target("cmp_42"), target("cmp_7")]);
        let matched = catalog.list_targets("cmp_42").unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].database, "cmp_42");
    }
}
