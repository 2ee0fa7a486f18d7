//! Links from a job run's artifact location to human and storage views.

/// Formats links for a job run location (`<bucket root>/<job run ID>`).
pub trait UrlFormatter: Send + Sync {
    /// Page a person opens to inspect the job run.
    fn human_url(&self, location: &str) -> String;

    /// Browsable view of the job run's stored artifacts.
    fn artifact_url(&self, location: &str) -> String;
}

pub const DEFAULT_HUMAN_URL_BASE: &str = "https://prow.ci.openshift.org/view/gs/";
pub const DEFAULT_ARTIFACT_URL_BASE: &str =
    "https://gcsweb-ci.apps.ci.l2s4.p1.openshiftapps.com/gcs/";

/// Prefixes the location with a configurable base for each link kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsUrlFormatter {
    human_base: String,
    artifact_base: String,
}

impl GcsUrlFormatter {
    pub fn new(human_base: impl Into<String>, artifact_base: impl Into<String>) -> Self {
        Self {
            human_base: human_base.into(),
            artifact_base: artifact_base.into(),
        }
    }
}

impl Default for GcsUrlFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_HUMAN_URL_BASE, DEFAULT_ARTIFACT_URL_BASE)
    }
}

impl UrlFormatter for GcsUrlFormatter {
    fn human_url(&self, location: &str) -> String {
        join_location(&self.human_base, location)
    }

    fn artifact_url(&self, location: &str) -> String {
        join_location(&self.artifact_base, location)
    }
}

/// Join two slash-separated segments with exactly one `/` between them.
/// An empty side contributes nothing.
pub fn join_location(root: &str, child: &str) -> String {
    let root = root.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    match (root.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => root.to_string(),
        _ => format!("{root}/{child}"),
    }
}
