//! Job lifecycle orchestration.
//!
//! A submitted job is persisted as `pending`, then handed to the
//! analysis pool. The run walks the lifecycle strictly forward, announces
//! every step on the job's event topic, and reclaims the fetched working
//! tree on every exit path. When the pool refuses the submission the job
//! is failed on the spot instead of lingering as a pending row.

use std::fmt;
use std::sync::Arc;

use linthub_model::{
    Finding, Job, JobEvent, JobStatus, LogEntry, LogLevel, SubmitJobRequest,
};
use tokio::sync::broadcast;
use tracing::{error, warn};
use uuid::Uuid;

use crate::engine::RuleEngine;
use crate::error::{AnalysisError, Result};
use crate::events::JobEventBus;
use crate::fetch::{FetchedTree, RepoFetcher};
use crate::persistence::ports::{FindingRepository, JobRepository};
use crate::pool::AnalysisPool;
use crate::rules::{RulesService, parse_config};

#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: Arc<dyn JobRepository>,
    findings: Arc<dyn FindingRepository>,
    events: Arc<JobEventBus>,
    rules: Arc<RulesService>,
    fetcher: Arc<dyn RepoFetcher>,
    engine: Arc<dyn RuleEngine>,
    pool: Arc<AnalysisPool>,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        findings: Arc<dyn FindingRepository>,
        events: Arc<JobEventBus>,
        rules: Arc<RulesService>,
        fetcher: Arc<dyn RepoFetcher>,
        engine: Arc<dyn RuleEngine>,
        pool: Arc<AnalysisPool>,
    ) -> Self {
        Self {
            jobs,
            findings,
            events,
            rules,
            fetcher,
            engine,
            pool,
        }
    }

    /// Accept a submission: persist the pending job and queue its run.
    /// A saturated pool fails the job immediately and surfaces the
    /// refusal to the caller.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<Job> {
        let job = Job::new(request.repo_url);
        self.jobs.create(&job).await?;

        let runner = self.clone();
        let queued = job.clone();
        let config_override = request.config_override;
        let accepted = self.pool.submit(job.id, async move {
            runner.run(queued, config_override).await;
        });

        match accepted {
            Ok(()) => Ok(job),
            Err(refusal) => {
                self.fail(job.id, &refusal).await;
                self.events.retire(job.id);
                Err(refusal)
            }
        }
    }

    pub async fn job(&self, id: Uuid) -> Result<Option<Job>> {
        self.jobs.get(id).await
    }

    pub async fn findings_for(&self, id: Uuid) -> Result<Vec<Finding>> {
        self.findings.list_for_job(id).await
    }

    pub async fn logs_for(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        self.events.log_history(id).await
    }

    /// Live events for a job; history comes from [`Self::logs_for`].
    pub fn subscribe(&self, id: Uuid) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe(id)
    }

    async fn run(self, job: Job, config_override: Option<String>) {
        let job_id = job.id;
        let mut fetched = None;
        if let Err(outcome) =
            self.execute(&job, config_override, &mut fetched).await
        {
            self.fail(job_id, &outcome).await;
        }
        // Only failure paths leave the tree parked here; the outcome is
        // already recorded, so a reclamation error cannot change it.
        if let Some(tree) = fetched {
            self.reclaim(job_id, tree).await;
        }
        self.events.retire(job_id);
    }

    /// One pass over the pipeline. The fetched tree is parked in
    /// `fetched` so [`Self::run`] can reclaim it after a failure has
    /// been recorded; the success path takes it back down before the
    /// completion transition.
    async fn execute(
        &self,
        job: &Job,
        config_override: Option<String>,
        fetched: &mut Option<FetchedTree>,
    ) -> Result<()> {
        self.transition(job.id, JobStatus::Fetching, "starting fetch".into())
            .await?;

        let tree = fetched.insert(self.fetcher.fetch(&job.repo_url).await?);
        if tree.files.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        self.transition(
            job.id,
            JobStatus::Analyzing,
            format!("fetch complete, {} items found", tree.files.len()),
        )
        .await?;

        let config_xml = self.resolve_rules(config_override).await?;
        let findings = self.engine.analyze(&config_xml, tree).await?;

        self.findings.insert_many(job.id, &findings).await?;
        self.events
            .publish(
                job.id,
                LogLevel::Info,
                format!("saved {} results", findings.len()),
            )
            .await;

        if let Some(tree) = fetched.take() {
            self.reclaim(job.id, tree).await;
        }

        self.transition(
            job.id,
            JobStatus::Completed,
            format!("analysis complete, {} findings", findings.len()),
        )
        .await
    }

    /// The effective configuration document: the override when supplied
    /// and non-blank, otherwise the stored active rule set rendered to
    /// XML. A malformed override fails here, before the engine runs, so
    /// the job records a configuration error rather than an engine one.
    async fn resolve_rules(
        &self,
        config_override: Option<String>,
    ) -> Result<String> {
        match config_override {
            Some(xml) if !xml.trim().is_empty() => {
                parse_config(&xml)?;
                Ok(xml)
            }
            _ => self.rules.active_xml().await,
        }
    }

    /// Persist a forward transition, then announce it.
    async fn transition(
        &self,
        job_id: Uuid,
        status: JobStatus,
        message: String,
    ) -> Result<()> {
        self.jobs.update_status(job_id, status, None).await?;
        self.events.publish(job_id, LogLevel::Info, message).await;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, outcome: &AnalysisError) {
        let message = if outcome.is_expected() {
            outcome.to_string()
        } else {
            error!(job_id = %job_id, error = %outcome, "job failed unexpectedly");
            format!("unexpected internal error: {outcome}")
        };

        if let Err(update_err) = self
            .jobs
            .update_status(job_id, JobStatus::Failed, Some(&message))
            .await
        {
            error!(
                job_id = %job_id,
                error = %update_err,
                "failed to record job failure"
            );
        }
        self.events
            .publish(job_id, LogLevel::Error, message)
            .await;
    }

    /// A reclamation failure goes to the job's log stream and the server
    /// log; it never changes the outcome already decided for the job.
    async fn reclaim(&self, job_id: Uuid, tree: FetchedTree) {
        if let Err(cleanup) = tree.reclaim().await {
            warn!(
                job_id = %job_id,
                error = %cleanup,
                "failed to reclaim working tree"
            );
            self.events
                .publish(job_id, LogLevel::Error, cleanup.to_string())
                .await;
        }
    }
}

impl fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOrchestrator").finish_non_exhaustive()
    }
}
