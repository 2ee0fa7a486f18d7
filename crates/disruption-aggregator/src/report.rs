//! JUnit-style report model and test case synthesis.
//!
//! A [`TestSuite`] is the wire contract with downstream report consumers:
//! an ordered list of [`TestCase`]s, each carrying a YAML diagnostic blob in
//! `system_out` and, when failed, a [`FailureOutput`] annotation.
//! [`TestSuite::to_junit_xml`] renders it for JUnit consumers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AggregatorResult;
use crate::urls::{join_location, UrlFormatter};

// ── suite / case ──────────────────────────────────────────────────────────

/// Failure annotation attached to a failed test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOutput {
    pub message: String,
    pub output: String,
}

/// One named test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_out: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_output: Option<FailureOutput>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_out: String::new(),
            failure_output: None,
        }
    }

    /// Mark the case failed; the annotation's output mirrors `system_out`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure_output = Some(FailureOutput {
            message: message.into(),
            output: self.system_out.clone(),
        });
    }

    pub fn failed(&self) -> bool {
        self.failure_output.is_some()
    }
}

/// Ordered collection of test cases with a running failure count.
///
/// Cases can only be added through [`TestSuite::push_case`], which keeps
/// `num_failed` equal to the number of failed cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuite {
    name: String,
    num_failed: u32,
    test_cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_failed: 0,
            test_cases: Vec::new(),
        }
    }

    pub fn push_case(&mut self, case: TestCase) {
        if case.failed() {
            self.num_failed += 1;
        }
        self.test_cases.push(case);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_failed(&self) -> u32 {
        self.num_failed
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    pub fn failed_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|c| c.failed())
    }

    /// SHA-256 hex digest of the suite's canonical JSON. Identical inputs to
    /// the analyzer yield identical digests.
    pub fn content_digest(&self) -> AggregatorResult<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Render the suite as a JUnit XML document, cases in suite order.
    pub fn to_junit_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\">\n",
            xml_escape(&self.name),
            self.test_cases.len(),
            self.num_failed
        ));
        for case in &self.test_cases {
            out.push_str(&format!("  <testcase name=\"{}\">", xml_escape(&case.name)));
            if let Some(failure) = &case.failure_output {
                out.push_str(&format!(
                    "<failure message=\"{}\">{}</failure>",
                    xml_escape(&failure.message),
                    xml_escape(&failure.output)
                ));
            }
            if !case.system_out.is_empty() {
                out.push_str(&format!(
                    "<system-out>{}</system-out>",
                    xml_escape(&case.system_out)
                ));
            }
            out.push_str("</testcase>\n");
        }
        out.push_str("</testsuite>\n");
        out
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ── diagnostic payload ────────────────────────────────────────────────────

/// Links for one job run referenced by a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunLink {
    pub job_run_id: String,
    pub human_url: String,
    pub gcs_artifact_url: String,
}

/// Diagnostic payload serialized into a test case's `system_out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseDetails {
    pub name: String,
    pub summary: String,
    #[serde(default)]
    pub failures: Vec<JobRunLink>,
    #[serde(default)]
    pub passes: Vec<JobRunLink>,
}

fn job_run_links(
    bucket_root: &str,
    job_run_ids: &[String],
    urls: &dyn UrlFormatter,
) -> Vec<JobRunLink> {
    job_run_ids
        .iter()
        .map(|job_run_id| {
            let location = join_location(bucket_root, job_run_id);
            JobRunLink {
                job_run_id: job_run_id.clone(),
                human_url: urls.human_url(&location),
                gcs_artifact_url: urls.artifact_url(&location),
            }
        })
        .collect()
}

/// Build the test case for one check result on one backend.
///
/// Failure and pass links keep the order of the input ID lists. A failure
/// to serialize the diagnostic payload is returned as an error.
pub fn disruption_to_test_case(
    test_case_name: &str,
    bucket_root: &str,
    failed_job_run_ids: &[String],
    successful_job_run_ids: &[String],
    failed: bool,
    message: &str,
    urls: &dyn UrlFormatter,
) -> AggregatorResult<TestCase> {
    let details = TestCaseDetails {
        name: test_case_name.to_string(),
        summary: message.to_string(),
        failures: job_run_links(bucket_root, failed_job_run_ids, urls),
        passes: job_run_links(bucket_root, successful_job_run_ids, urls),
    };

    let mut test_case = TestCase::new(test_case_name);
    test_case.system_out = serde_yaml::to_string(&details)?;
    if failed {
        test_case.fail(message);
    }
    Ok(test_case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urls::GcsUrlFormatter;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_failed_case_output_mirrors_system_out() {
        let case = disruption_to_test_case(
            "kube-api disruption P95 should not be worse",
            "origin-ci-test/logs/job",
            &ids(&["r1"]),
            &ids(&["r2", "r3"]),
            true,
            "P95 regressed",
            &GcsUrlFormatter::default(),
        )
        .expect("build case");

        let failure = case.failure_output.as_ref().expect("failure annotation");
        assert_eq!(failure.message, "P95 regressed");
        assert_eq!(failure.output, case.system_out);
        assert!(!case.system_out.is_empty());
    }

    #[test]
    fn test_passing_case_has_no_failure() {
        let case = disruption_to_test_case(
            "kube-api ok",
            "root",
            &[],
            &ids(&["r1"]),
            false,
            "fine",
            &GcsUrlFormatter::default(),
        )
        .expect("build case");
        assert!(case.failure_output.is_none());
    }

    #[test]
    fn test_details_preserve_order_and_links() {
        let case = disruption_to_test_case(
            "name",
            "origin-ci-test/logs/job",
            &ids(&["r9", "r1"]),
            &ids(&["r5", "r2"]),
            false,
            "summary text",
            &GcsUrlFormatter::new("https://human/", "https://gcs/"),
        )
        .expect("build case");

        let details: TestCaseDetails =
            serde_yaml::from_str(&case.system_out).expect("parse details");
        assert_eq!(details.summary, "summary text");
        let failures: Vec<&str> = details.failures.iter().map(|f| f.job_run_id.as_str()).collect();
        let passes: Vec<&str> = details.passes.iter().map(|p| p.job_run_id.as_str()).collect();
        assert_eq!(failures, vec!["r9", "r1"]);
        assert_eq!(passes, vec!["r5", "r2"]);
        assert_eq!(
            details.failures[0].human_url,
            "https://human/origin-ci-test/logs/job/r9"
        );
        assert_eq!(
            details.passes[1].gcs_artifact_url,
            "https://gcs/origin-ci-test/logs/job/r2"
        );
    }

    #[test]
    fn test_push_case_counts_failures() {
        let mut suite = TestSuite::new("BackendDisruption");
        let mut failed = TestCase::new("a");
        failed.fail("bad");
        suite.push_case(failed);
        suite.push_case(TestCase::new("b"));

        assert_eq!(suite.num_failed(), 1);
        assert_eq!(suite.failed_cases().count(), 1);
        assert_eq!(suite.test_cases().len(), 2);
    }

    #[test]
    fn test_content_digest_stable() {
        let mut a = TestSuite::new("s");
        a.push_case(TestCase::new("x"));
        let b = a.clone();
        assert_eq!(a.content_digest().unwrap(), b.content_digest().unwrap());

        a.push_case(TestCase::new("y"));
        assert_ne!(a.content_digest().unwrap(), b.content_digest().unwrap());
    }

    /// Value of attribute `name` on the first `tag` element in `xml`.
    fn attr<'a>(xml: &'a str, tag: &str, name: &str) -> &'a str {
        let start = xml.find(&format!("<{tag} ")).expect("element");
        let rest = &xml[start..];
        let key = format!("{name}=\"");
        let value = &rest[rest.find(&key).expect("attribute") + key.len()..];
        &value[..value.find('"').expect("closing quote")]
    }

    #[test]
    fn test_junit_xml_preserves_order_and_failures() {
        let mut suite = TestSuite::new("BackendDisruption");
        suite.push_case(TestCase::new("should collect disruption data"));
        let mut failed = TestCase::new("kube-api <new> disruption P95 should not be worse");
        failed.system_out = "summary: \"P95 & mean\"\n".to_string();
        failed.fail("P95 regressed");
        suite.push_case(failed);
        suite.push_case(TestCase::new("oauth-api disruption P95 should not be worse"));

        let xml = suite.to_junit_xml();

        assert!(xml.starts_with("<?xml"));
        assert_eq!(attr(&xml, "testsuite", "name"), "BackendDisruption");
        assert_eq!(attr(&xml, "testsuite", "tests"), "3");
        assert_eq!(attr(&xml, "testsuite", "failures"), "1");

        let names: Vec<&str> = xml
            .split("<testcase name=\"")
            .skip(1)
            .map(|chunk| &chunk[..chunk.find('"').expect("closing quote")])
            .collect();
        assert_eq!(
            names,
            vec![
                "should collect disruption data",
                "kube-api &lt;new&gt; disruption P95 should not be worse",
                "oauth-api disruption P95 should not be worse",
            ]
        );

        assert_eq!(xml.matches("<failure ").count(), 1);
        assert_eq!(attr(&xml, "failure", "message"), "P95 regressed");
        assert!(xml.contains(
            "P95 regressed\">summary: &quot;P95 &amp; mean&quot;\n</failure>"
        ));
        assert!(xml.contains("<system-out>summary: &quot;P95 &amp; mean&quot;\n</system-out>"));
        assert_eq!(xml.matches("<testcase ").count(), xml.matches("</testcase>").count());
    }
}
