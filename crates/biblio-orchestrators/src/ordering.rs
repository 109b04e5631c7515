//! Provider discovery ordering shared by every orchestrator: an explicit
//! caller-supplied priority list wins outright;
//! otherwise paid-when-quota-permits, then free, then AI, preserving
//! registration order within a tier for determinism.

use std::sync::Arc;

use biblio_registry::Provider;

pub fn order_providers(
    mut providers: Vec<Arc<dyn Provider>>,
    explicit_priority: Option<&[String]>,
) -> Vec<Arc<dyn Provider>> {
    match explicit_priority {
        Some(priority) => {
            let rank = |p: &Arc<dyn Provider>| -> usize {
                priority
                    .iter()
                    .position(|name| name == p.name())
                    .unwrap_or(priority.len())
            };
            providers.sort_by_key(rank);
            providers
        }
        None => {
            // `sort_by_key` is stable, so registration order within a tier
            // (the order `by_capability` handed us) is preserved.
            providers.sort_by_key(|p| p.tier());
            providers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use biblio_common::{Capability, Tier};
    use biblio_registry::ProviderContext;
    use std::collections::HashSet;

    struct Stub {
        name: &'static str,
        tier: Tier,
        caps: HashSet<Capability>,
    }

    #[async_trait]
    impl Provider for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn tier(&self) -> Tier {
            self.tier
        }
        fn capabilities(&self) -> &HashSet<Capability> {
            &self.caps
        }
        async fn is_available(&self, _ctx: &ProviderContext) -> bool {
            true
        }
    }

    fn stub(name: &'static str, tier: Tier) -> Arc<dyn Provider> {
        Arc::new(Stub {
            name,
            tier,
            caps: HashSet::new(),
        })
    }

    #[test]
    fn default_order_is_paid_then_free_then_ai() {
        let ordered = order_providers(
            vec![stub("ai-1", Tier::Ai), stub("paid-1", Tier::Paid), stub("free-1", Tier::Free)],
            None,
        );
        let names: Vec<&str> = ordered.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["paid-1", "free-1", "ai-1"]);
    }

    #[test]
    fn explicit_priority_overrides_tier_order() {
        let priority = vec!["ai-1".to_string(), "paid-1".to_string()];
        let ordered = order_providers(
            vec![stub("paid-1", Tier::Paid), stub("ai-1", Tier::Ai), stub("free-1", Tier::Free)],
            Some(&priority),
        );
        let names: Vec<&str> = ordered.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ai-1", "paid-1", "free-1"]);
    }
}
