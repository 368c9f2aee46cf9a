//! Plan catalog.
//!
//! Plans are read-only reference data. The catalog is injected into the
//! application layer so deployments can supply their own plans.

use std::collections::BTreeMap;

use lumen_billing::Money;
use lumen_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A storage plan an event is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier (e.g. `"basic"`).
    pub id: String,
    /// Included capacity in whole GB.
    pub capacity_gb: u32,
    /// Days the event stays active after the account opens.
    pub duration_days: u32,
    /// List price of the plan itself.
    pub price: Money,
}

/// Source of plan definitions.
pub trait PlanCatalog: Send + Sync {
    /// Looks up a plan by identifier.
    fn find(&self, plan_id: &str) -> Option<Plan>;

    /// All plans, ordered by identifier.
    fn all(&self) -> Vec<Plan>;
}

/// Resolves `plan_id` or fails with `PlanNotFound`.
///
/// # Errors
///
/// Returns `DomainError::PlanNotFound` if the catalog has no such plan.
pub fn lookup_plan(catalog: &dyn PlanCatalog, plan_id: &str) -> Result<Plan, DomainError> {
    catalog
        .find(plan_id)
        .ok_or_else(|| DomainError::PlanNotFound(plan_id.to_owned()))
}

/// A fixed, in-process plan catalog.
#[derive(Debug, Clone)]
pub struct InMemoryPlanCatalog {
    plans: BTreeMap<String, Plan>,
}

impl InMemoryPlanCatalog {
    /// Builds a catalog from an explicit plan list. Later duplicates win.
    #[must_use]
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// The built-in plans: basic, plus and pro.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Plan {
                id: "basic".to_owned(),
                capacity_gb: 10,
                duration_days: 30,
                price: Money::from_minor(4_990),
            },
            Plan {
                id: "plus".to_owned(),
                capacity_gb: 50,
                duration_days: 90,
                price: Money::from_minor(12_990),
            },
            Plan {
                id: "pro".to_owned(),
                capacity_gb: 200,
                duration_days: 365,
                price: Money::from_minor(29_990),
            },
        ])
    }

    /// Parses a JSON array of plans.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the JSON is malformed, empty, or
    /// repeats a plan identifier.
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let plans: Vec<Plan> = serde_json::from_str(json)
            .map_err(|e| DomainError::Validation(format!("invalid plan catalog: {e}")))?;
        if plans.is_empty() {
            return Err(DomainError::Validation(
                "plan catalog must contain at least one plan".to_owned(),
            ));
        }
        let catalog = Self::new(plans.clone());
        if catalog.plans.len() != plans.len() {
            return Err(DomainError::Validation(
                "plan catalog repeats a plan id".to_owned(),
            ));
        }
        Ok(catalog)
    }
}

impl Default for InMemoryPlanCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PlanCatalog for InMemoryPlanCatalog {
    fn find(&self, plan_id: &str) -> Option<Plan> {
        self.plans.get(plan_id).cloned()
    }

    fn all(&self) -> Vec<Plan> {
        self.plans.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_three_plans() {
        let catalog = InMemoryPlanCatalog::with_defaults();

        let ids: Vec<String> = catalog.all().into_iter().map(|p| p.id).collect();

        assert_eq!(ids, vec!["basic", "plus", "pro"]);
        assert_eq!(catalog.find("basic").unwrap().capacity_gb, 10);
    }

    #[test]
    fn test_lookup_unknown_plan_returns_plan_not_found() {
        let catalog = InMemoryPlanCatalog::with_defaults();

        match lookup_plan(&catalog, "platinum").unwrap_err() {
            DomainError::PlanNotFound(id) => assert_eq!(id, "platinum"),
            other => panic!("expected PlanNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_reads_plans() {
        let json = r#"[{"id":"trial","capacity_gb":1,"duration_days":7,"price":0}]"#;

        let catalog = InMemoryPlanCatalog::from_json(json).unwrap();

        let plan = catalog.find("trial").unwrap();
        assert_eq!(plan.duration_days, 7);
        assert_eq!(plan.price, Money::ZERO);
    }

    #[test]
    fn test_from_json_rejects_duplicates_and_empty() {
        let dup = r#"[{"id":"a","capacity_gb":1,"duration_days":7,"price":0},
                      {"id":"a","capacity_gb":2,"duration_days":7,"price":0}]"#;

        assert!(InMemoryPlanCatalog::from_json(dup).is_err());
        assert!(InMemoryPlanCatalog::from_json("[]").is_err());
        assert!(InMemoryPlanCatalog::from_json("not json").is_err());
    }
}
