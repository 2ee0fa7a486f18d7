//! Pluggable disruption checks and their ordered registry.
//!
//! A check compares one backend's per-run measurements against a baseline
//! and reports which runs regressed. Each check is registered under a
//! [`CheckTemplate`] that names the resulting test case, e.g.
//! `"{backend} disruption P95 should not be worse"`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AggregatorError, AggregatorResult};
use crate::model::BackendDisruption;

/// Placeholder substituted with the backend name in a [`CheckTemplate`].
pub const BACKEND_PLACEHOLDER: &str = "{backend}";

/// Result of evaluating one check for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub failed_job_run_ids: Vec<String>,
    pub successful_job_run_ids: Vec<String>,
    pub failed: bool,
    pub message: String,
}

/// A statistical comparison of one backend against its baseline.
///
/// An `Err` is treated as systemic: it aborts the whole analysis rather
/// than failing a single backend.
#[async_trait]
pub trait DisruptionCheck: Send + Sync {
    async fn check(
        &self,
        cancel: &CancellationToken,
        disruption: &BackendDisruption,
        backend: &str,
    ) -> AggregatorResult<CheckOutcome>;
}

/// Adapts a synchronous closure into a [`DisruptionCheck`].
pub struct FnCheck<F>(F);

impl<F> FnCheck<F>
where
    F: Fn(&BackendDisruption, &str) -> AggregatorResult<CheckOutcome> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> DisruptionCheck for FnCheck<F>
where
    F: Fn(&BackendDisruption, &str) -> AggregatorResult<CheckOutcome> + Send + Sync,
{
    async fn check(
        &self,
        _cancel: &CancellationToken,
        disruption: &BackendDisruption,
        backend: &str,
    ) -> AggregatorResult<CheckOutcome> {
        (self.0)(disruption, backend)
    }
}

/// Test case name pattern with exactly one `{backend}` slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckTemplate(String);

impl CheckTemplate {
    pub fn new(template: impl Into<String>) -> AggregatorResult<Self> {
        let template = template.into();
        if template.matches(BACKEND_PLACEHOLDER).count() != 1 {
            return Err(AggregatorError::InvalidTemplate { template });
        }
        Ok(Self(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute `backend` into the slot.
    pub fn render(&self, backend: &str) -> String {
        self.0.replacen(BACKEND_PLACEHOLDER, backend, 1)
    }
}

impl std::fmt::Display for CheckTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered check.
#[derive(Clone)]
pub struct RegisteredCheck {
    pub template: CheckTemplate,
    pub check: Arc<dyn DisruptionCheck>,
}

/// Checks ordered by template text, so iteration order never depends on
/// registration order.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<RegisteredCheck>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under `template`. Rejects malformed and duplicate
    /// templates.
    pub fn register(
        &mut self,
        template: &str,
        check: Arc<dyn DisruptionCheck>,
    ) -> AggregatorResult<()> {
        let template = CheckTemplate::new(template)?;
        match self
            .checks
            .binary_search_by(|existing| existing.template.cmp(&template))
        {
            Ok(_) => Err(AggregatorError::DuplicateTemplate {
                template: template.0,
            }),
            Err(idx) => {
                self.checks.insert(idx, RegisteredCheck { template, check });
                Ok(())
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_check(
        mut self,
        template: &str,
        check: Arc<dyn DisruptionCheck>,
    ) -> AggregatorResult<Self> {
        self.register(template, check)?;
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCheck> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn templates(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.template.as_str()).collect()
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("templates", &self.templates())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn DisruptionCheck> {
        Arc::new(FnCheck::new(|_, _| {
            Ok(CheckOutcome {
                failed_job_run_ids: vec![],
                successful_job_run_ids: vec![],
                failed: false,
                message: "ok".to_string(),
            })
        }))
    }

    #[test]
    fn test_template_requires_single_slot() {
        assert!(CheckTemplate::new("{backend} P95 should not be worse").is_ok());
        assert!(CheckTemplate::new("no slot here").is_err());
        assert!(CheckTemplate::new("{backend} vs {backend}").is_err());
    }

    #[test]
    fn test_template_render() {
        let t = CheckTemplate::new("{backend} disruption P95 should not be worse").unwrap();
        assert_eq!(
            t.render("kube-api-new-connections"),
            "kube-api-new-connections disruption P95 should not be worse"
        );
    }

    #[test]
    fn test_registry_orders_by_template() {
        let registry = CheckRegistry::new()
            .with_check(
                "{backend} mean disruption should be less than historical plus two standard deviations",
                noop(),
            )
            .unwrap()
            .with_check("{backend} disruption P95 should not be worse", noop())
            .unwrap();

        assert_eq!(
            registry.templates(),
            vec![
                "{backend} disruption P95 should not be worse",
                "{backend} mean disruption should be less than historical plus two standard deviations",
            ]
        );
    }

    #[test]
    fn test_registry_rejects_duplicate() {
        let mut registry = CheckRegistry::new();
        registry.register("{backend} check", noop()).unwrap();
        let err = registry.register("{backend} check", noop()).unwrap_err();
        assert!(matches!(err, AggregatorError::DuplicateTemplate { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_fn_check_invokes_closure() {
        let check = FnCheck::new(|disruption, backend| {
            Ok(CheckOutcome {
                failed_job_run_ids: vec![],
                successful_job_run_ids: disruption.keys().cloned().collect(),
                failed: false,
                message: format!("{backend} ok"),
            })
        });
        let outcome = check
            .check(&CancellationToken::new(), &BackendDisruption::new(), "etcd")
            .await
            .unwrap();
        assert_eq!(outcome.message, "etcd ok");
    }
}
