//! Stage pipeline for the unlock flow
//!
//! Stages run strictly sequentially: each stage's unlock input is the
//! previous stage's extracted access code, a single-writer single-reader
//! baton threaded through the pipeline as an explicit [`StageOutcome`]
//! value. A stage that fails to produce a usable code poisons everything
//! after it: later stages see [`StageOutcome::Skip`] and short-circuit
//! without touching the UI.

use crate::cipher::ChallengeClient;
use crate::config::DownloadRetryConfig;
use crate::download::{DownloadDriver, DownloadHandle, DownloadOrchestrator};
use crate::error::Result;
use crate::portal::ManuscriptPortal;
use async_trait::async_trait;

/// Result of one stage, and the input baton of the next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage produced an access code for the next stage (empty when the
    /// chain deliberately ends, i.e. the final stage does not download)
    Continue(String),
    /// The stage failed or was poisoned by an earlier failure; all later
    /// stages must skip
    Skip(String),
}

impl StageOutcome {
    /// The access code carried forward, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            StageOutcome::Continue(code) => Some(code),
            StageOutcome::Skip(_) => None,
        }
    }
}

/// How a stage's manuscript gets unlocked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockMethod {
    /// The manuscript starts unlocked; nothing to do before downloading
    AlreadyUnlocked,
    /// Enter the previous stage's access code directly
    LiteralCode,
    /// Fetch a cipher challenge for this book (authorized by the previous
    /// code), decode it, and unlock with the decoded password
    ChallengeApi,
}

/// One century-labeled stage in the pipeline
#[derive(Clone, Debug)]
pub struct Stage {
    /// Century label identifying the manuscript card (e.g. "XIV")
    pub century: String,
    /// Unlock method for this stage
    pub method: UnlockMethod,
    /// Whether the locked card exposes a documentation modal to open and close
    pub expect_documentation: bool,
    /// Whether to download the PDF and extract the next stage's code
    pub download: bool,
}

impl Stage {
    /// Create a stage that downloads and has no documentation modal
    pub fn new(century: &str, method: UnlockMethod) -> Self {
        Self {
            century: century.to_string(),
            method,
            expect_documentation: false,
            download: true,
        }
    }

    /// The portal's canonical five-stage chain.
    ///
    /// Century XIV starts unlocked; XV and XVI take the prior code
    /// literally; XVII and XVIII go through the challenge API and carry a
    /// documentation modal. XVIII is the end of the chain and does not
    /// download.
    pub fn default_chain() -> Vec<Stage> {
        vec![
            Stage::new("XIV", UnlockMethod::AlreadyUnlocked),
            Stage::new("XV", UnlockMethod::LiteralCode),
            Stage::new("XVI", UnlockMethod::LiteralCode),
            Stage {
                century: "XVII".to_string(),
                method: UnlockMethod::ChallengeApi,
                expect_documentation: true,
                download: true,
            },
            Stage {
                century: "XVIII".to_string(),
                method: UnlockMethod::ChallengeApi,
                expect_documentation: true,
                download: false,
            },
        ]
    }
}

/// Per-stage record produced by [`UnlockFlowDriver::run`]
#[derive(Clone, Debug)]
pub struct StageReport {
    /// Century label of the stage
    pub century: String,
    /// How the stage concluded
    pub outcome: StageOutcome,
}

/// Sequences the unlock flow across stages.
///
/// Owns no algorithmic content: it orders portal calls, resolves challenge
/// unlocks through the API client, and hands downloads to the orchestrator,
/// propagating the access-code baton from one stage to the next.
pub struct UnlockFlowDriver<P: ManuscriptPortal> {
    portal: P,
    challenge_client: ChallengeClient,
    orchestrator: DownloadOrchestrator,
}

/// Adapter scoping the portal's download surface to one century
struct PortalDownloadDriver<'a, P: ManuscriptPortal> {
    portal: &'a mut P,
    century: &'a str,
}

#[async_trait]
impl<P: ManuscriptPortal> DownloadDriver for PortalDownloadDriver<'_, P> {
    async fn trigger_download(&mut self) -> Result<DownloadHandle> {
        self.portal.trigger_download(self.century).await
    }

    async fn error_banner_visible(&mut self) -> Result<bool> {
        self.portal.download_error_banner_visible().await
    }
}

impl<P: ManuscriptPortal> UnlockFlowDriver<P> {
    /// Create a flow driver over a portal session
    pub fn new(portal: P, challenge_client: ChallengeClient, retry: DownloadRetryConfig) -> Self {
        Self {
            portal,
            challenge_client,
            orchestrator: DownloadOrchestrator::new(retry),
        }
    }

    /// Consume the driver, returning the portal session
    pub fn into_portal(self) -> P {
        self.portal
    }

    /// Run the full stage chain, threading the access-code baton through it
    pub async fn run(&mut self, stages: &[Stage]) -> Vec<StageReport> {
        let mut baton = StageOutcome::Continue(String::new());
        let mut reports = Vec::with_capacity(stages.len());

        for stage in stages {
            baton = self.run_stage(stage, baton).await;
            reports.push(StageReport {
                century: stage.century.clone(),
                outcome: baton.clone(),
            });
        }

        reports
    }

    /// Run one stage with the previous stage's outcome as input.
    ///
    /// A `Skip` input propagates unchanged without any UI action. A stage
    /// whose unlock method needs a code but received an empty one also
    /// skips. Any stage error converts to `Skip`, poisoning the rest of the
    /// chain.
    pub async fn run_stage(&mut self, stage: &Stage, prior: StageOutcome) -> StageOutcome {
        let prior_code = match prior {
            StageOutcome::Skip(reason) => {
                tracing::warn!(
                    century = %stage.century,
                    reason = %reason,
                    "Skipping stage, poisoned by earlier failure"
                );
                return StageOutcome::Skip(reason);
            }
            StageOutcome::Continue(code) => code,
        };

        if stage.method != UnlockMethod::AlreadyUnlocked && prior_code.is_empty() {
            let reason = format!("no unlock code available for century {}", stage.century);
            tracing::error!(century = %stage.century, "Skipping stage, no unlock code");
            return StageOutcome::Skip(reason);
        }

        tracing::info!(century = %stage.century, "Starting stage");

        match self.stage_inner(stage, &prior_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    century = %stage.century,
                    error = %e,
                    "Stage failed"
                );
                StageOutcome::Skip(format!("century {}: {}", stage.century, e))
            }
        }
    }

    async fn stage_inner(&mut self, stage: &Stage, prior_code: &str) -> Result<StageOutcome> {
        self.portal.filter_by_century(&stage.century).await?;

        match stage.method {
            UnlockMethod::AlreadyUnlocked => {}
            UnlockMethod::LiteralCode => {
                self.portal
                    .verify_locked(&stage.century, stage.expect_documentation)
                    .await?;
                self.portal
                    .unlock_with_code(&stage.century, prior_code, false)
                    .await?;
            }
            UnlockMethod::ChallengeApi => {
                self.portal
                    .verify_locked(&stage.century, stage.expect_documentation)
                    .await?;

                let title = self.portal.book_title(&stage.century).await?;
                tracing::info!(century = %stage.century, title = %title, "Detected book title");

                let password = self
                    .challenge_client
                    .unlock_code_for(&title, prior_code)
                    .await?;
                self.portal
                    .unlock_with_code(&stage.century, &password, true)
                    .await?;
            }
        }

        self.portal.verify_unlocked(&stage.century).await?;

        if !stage.download {
            tracing::info!(century = %stage.century, "Stage complete, end of chain");
            return Ok(StageOutcome::Continue(String::new()));
        }

        let mut driver = PortalDownloadDriver {
            portal: &mut self.portal,
            century: &stage.century,
        };

        match self.orchestrator.download_and_extract(&mut driver).await {
            Some(code) => {
                tracing::info!(century = %stage.century, "Access code obtained");
                Ok(StageOutcome::Continue(code))
            }
            None => Ok(StageOutcome::Skip(format!(
                "no access code obtained for century {}",
                stage.century
            ))),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChallengeApiConfig;
    use crate::error::Error;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Scripted portal: records every call and serves downloads from a
    /// queue of file contents (None = no code in the file).
    struct MockPortal {
        calls: Vec<String>,
        title: String,
        dir: TempDir,
        downloads: Vec<Option<&'static str>>,
        next_download: usize,
        banner: bool,
    }

    impl MockPortal {
        fn new(downloads: Vec<Option<&'static str>>) -> Self {
            Self {
                calls: Vec::new(),
                title: "Codex Aureus".to_string(),
                dir: TempDir::new().unwrap(),
                downloads,
                next_download: 0,
                banner: false,
            }
        }
    }

    #[async_trait]
    impl ManuscriptPortal for MockPortal {
        async fn filter_by_century(&mut self, century: &str) -> Result<()> {
            self.calls.push(format!("filter {}", century));
            Ok(())
        }

        async fn verify_locked(&mut self, century: &str, expect_documentation: bool) -> Result<()> {
            self.calls
                .push(format!("verify_locked {} docs={}", century, expect_documentation));
            Ok(())
        }

        async fn verify_unlocked(&mut self, century: &str) -> Result<()> {
            self.calls.push(format!("verify_unlocked {}", century));
            Ok(())
        }

        async fn unlock_with_code(&mut self, century: &str, code: &str, used_api: bool) -> Result<()> {
            self.calls
                .push(format!("unlock {} code={} api={}", century, code, used_api));
            Ok(())
        }

        async fn book_title(&mut self, century: &str) -> Result<String> {
            self.calls.push(format!("book_title {}", century));
            Ok(self.title.clone())
        }

        async fn trigger_download(&mut self, century: &str) -> Result<DownloadHandle> {
            self.calls.push(format!("download {}", century));
            let content = self
                .downloads
                .get(self.next_download)
                .copied()
                .ok_or_else(|| Error::Portal("no scripted download left".to_string()))?;
            self.next_download += 1;

            let path = self.dir.path().join(format!("dl-{}.pdf", self.next_download));
            fs::write(&path, content.unwrap_or("no code here"))?;
            Ok(DownloadHandle { path })
        }

        async fn download_error_banner_visible(&mut self) -> Result<bool> {
            Ok(self.banner)
        }
    }

    fn fast_retry(max_attempts: u32) -> DownloadRetryConfig {
        DownloadRetryConfig {
            max_attempts,
            retry_delay: Duration::from_millis(1),
            settle_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    fn offline_client() -> ChallengeClient {
        // Valid but unused endpoint, for tests that never hit the API
        ChallengeClient::new(&ChallengeApiConfig::default()).unwrap()
    }

    fn client_for(server: &MockServer) -> ChallengeClient {
        ChallengeClient::new(&ChallengeApiConfig {
            endpoint: format!("{}/api/cipher/challenge", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_skip_propagates_without_ui_actions() {
        let portal = MockPortal::new(vec![]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(1));

        let stage = Stage::new("XV", UnlockMethod::LiteralCode);
        let outcome = driver
            .run_stage(&stage, StageOutcome::Skip("earlier failure".to_string()))
            .await;

        assert_eq!(outcome, StageOutcome::Skip("earlier failure".to_string()));
        assert!(driver.into_portal().calls.is_empty());
    }

    #[tokio::test]
    async fn test_empty_prior_code_skips_before_touching_ui() {
        let portal = MockPortal::new(vec![]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(1));

        let stage = Stage::new("XVI", UnlockMethod::LiteralCode);
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue(String::new()))
            .await;

        assert!(matches!(outcome, StageOutcome::Skip(_)));
        assert!(driver.into_portal().calls.is_empty());
    }

    #[tokio::test]
    async fn test_literal_stage_call_sequence() {
        let portal = MockPortal::new(vec![Some("acceso: NEXT42")]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(1));

        let stage = Stage::new("XV", UnlockMethod::LiteralCode);
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue("PRIOR7".to_string()))
            .await;

        assert_eq!(outcome, StageOutcome::Continue("NEXT42".to_string()));
        assert_eq!(
            driver.into_portal().calls,
            vec![
                "filter XV",
                "verify_locked XV docs=false",
                "unlock XV code=PRIOR7 api=false",
                "verify_unlocked XV",
                "download XV",
            ]
        );
    }

    #[tokio::test]
    async fn test_already_unlocked_stage_skips_unlock_steps() {
        let portal = MockPortal::new(vec![Some("acceso: OPEN01")]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(1));

        let stage = Stage::new("XIV", UnlockMethod::AlreadyUnlocked);
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue(String::new()))
            .await;

        assert_eq!(outcome, StageOutcome::Continue("OPEN01".to_string()));
        assert_eq!(
            driver.into_portal().calls,
            vec!["filter XIV", "verify_unlocked XIV", "download XIV"]
        );
    }

    #[tokio::test]
    async fn test_challenge_api_stage_unlocks_with_decoded_password() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cipher/challenge"))
            .and(query_param("bookTitle", "Codex Aureus"))
            .and(query_param("unlockCode", "PRIOR7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "challenge": {
                    "vault": ["X", "Y", "Z", "Q"],
                    "targets": [2, 0, 3],
                    "hint": "",
                    "bookTitle": "Codex Aureus"
                }
            })))
            .mount(&server)
            .await;

        let portal = MockPortal::new(vec![Some("acceso: API999")]);
        let mut driver = UnlockFlowDriver::new(portal, client_for(&server), fast_retry(1));

        let stage = Stage {
            century: "XVII".to_string(),
            method: UnlockMethod::ChallengeApi,
            expect_documentation: true,
            download: true,
        };
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue("PRIOR7".to_string()))
            .await;

        assert_eq!(outcome, StageOutcome::Continue("API999".to_string()));
        assert_eq!(
            driver.into_portal().calls,
            vec![
                "filter XVII",
                "verify_locked XVII docs=true",
                "book_title XVII",
                "unlock XVII code=ZXQ api=true",
                "verify_unlocked XVII",
                "download XVII",
            ]
        );
    }

    #[tokio::test]
    async fn test_api_rejection_poisons_the_stage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cipher/challenge"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let portal = MockPortal::new(vec![]);
        let mut driver = UnlockFlowDriver::new(portal, client_for(&server), fast_retry(1));

        let stage = Stage {
            century: "XVII".to_string(),
            method: UnlockMethod::ChallengeApi,
            expect_documentation: true,
            download: true,
        };
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue("PRIOR7".to_string()))
            .await;

        match outcome {
            StageOutcome::Skip(reason) => assert!(reason.contains("404"), "reason: {}", reason),
            other => panic!("expected Skip, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_poisons_later_stages_after_exhaustion() {
        // Stage XIV's downloads never contain a code: the orchestrator
        // exhausts its attempts and every later stage must self-skip
        let portal = MockPortal::new(vec![None, None]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(2));

        let stages = vec![
            Stage::new("XIV", UnlockMethod::AlreadyUnlocked),
            Stage::new("XV", UnlockMethod::LiteralCode),
            Stage::new("XVI", UnlockMethod::LiteralCode),
        ];
        let reports = driver.run(&stages).await;

        assert_eq!(reports.len(), 3);
        assert!(matches!(reports[0].outcome, StageOutcome::Skip(_)));
        assert!(matches!(reports[1].outcome, StageOutcome::Skip(_)));
        assert!(matches!(reports[2].outcome, StageOutcome::Skip(_)));

        // Stages XV and XVI never touched the UI
        let calls = driver.into_portal().calls;
        assert!(calls.iter().all(|c| !c.contains("XV ") && !c.ends_with("XV")));
        assert!(calls.iter().all(|c| !c.contains("XVI")));
    }

    #[tokio::test]
    async fn test_final_stage_without_download_ends_chain() {
        let portal = MockPortal::new(vec![]);
        let mut driver = UnlockFlowDriver::new(portal, offline_client(), fast_retry(1));

        let stage = Stage {
            century: "XIV".to_string(),
            method: UnlockMethod::AlreadyUnlocked,
            expect_documentation: false,
            download: false,
        };
        let outcome = driver
            .run_stage(&stage, StageOutcome::Continue(String::new()))
            .await;

        assert_eq!(outcome, StageOutcome::Continue(String::new()));
        assert_eq!(
            driver.into_portal().calls,
            vec!["filter XIV", "verify_unlocked XIV"]
        );
    }

    #[test]
    fn test_default_chain_shape() {
        let chain = Stage::default_chain();
        assert_eq!(chain.len(), 5);
        assert_eq!(chain[0].method, UnlockMethod::AlreadyUnlocked);
        assert_eq!(chain[1].method, UnlockMethod::LiteralCode);
        assert_eq!(chain[2].method, UnlockMethod::LiteralCode);
        assert_eq!(chain[3].method, UnlockMethod::ChallengeApi);
        assert!(chain[3].expect_documentation);
        assert_eq!(chain[4].method, UnlockMethod::ChallengeApi);
        assert!(!chain[4].download, "the chain ends at century XVIII");
    }

    #[test]
    fn test_outcome_code_accessor() {
        assert_eq!(
            StageOutcome::Continue("AB12".to_string()).code(),
            Some("AB12")
        );
        assert_eq!(StageOutcome::Skip("reason".to_string()).code(), None);
    }
}
