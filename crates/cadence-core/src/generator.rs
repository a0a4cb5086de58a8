//! Batch processor: walks every active rule and materializes what is due.
//!
//! Each rule is handled independently. A step (insert one task, move one
//! cursor) commits atomically against the rule's version, so a crashed or
//! interrupted run resumes from whatever cursors made it to disk.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::materializer::materialize;
use crate::models::{GenerationConfig, Occurrence, RecurrenceRule, Task};
use crate::notify::{LogNotifier, OccurrenceNotifier};
use crate::recurrence::{plan_after, NextStep};
use crate::repository::GenerationRepository;

/// Summary of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub as_of: Option<NaiveDate>,
    pub rules_processed: usize,
    /// Tasks created in this run
    pub generated: usize,
    /// Rules with nothing due
    pub skipped: usize,
    /// Rules that reached their end date during this run
    pub ended: usize,
    /// Rules that could not be processed, e.g. a missing template
    pub failed: Vec<Uuid>,
    pub generated_task_ids: Vec<Uuid>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn absorb(&mut self, run: RuleRun) {
        self.rules_processed += 1;
        self.generated += run.generated.len();
        match run.outcome {
            RuleOutcome::UpToDate if run.generated.is_empty() => self.skipped += 1,
            RuleOutcome::UpToDate | RuleOutcome::CatchupLimit => {}
            RuleOutcome::Ended => self.ended += 1,
            RuleOutcome::Failed => self.failed.push(run.rule_id),
        }
        self.generated_task_ids.extend(run.generated);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOutcome {
    /// Next occurrence is after `as_of`, or the rule went away mid-run
    UpToDate,
    /// Per-run cap hit; the remainder is picked up next run
    CatchupLimit,
    Ended,
    Failed,
}

#[derive(Debug)]
struct RuleRun {
    rule_id: Uuid,
    generated: Vec<Uuid>,
    outcome: RuleOutcome,
}

impl RuleRun {
    fn new(rule_id: Uuid) -> Self {
        Self {
            rule_id,
            generated: Vec::new(),
            outcome: RuleOutcome::UpToDate,
        }
    }
}

/// What to do after a failed repository write.
enum Recovery {
    Retry(RecurrenceRule),
    Stop(RuleOutcome),
}

pub struct RecurrenceGenerator<R: GenerationRepository> {
    repo: R,
    config: GenerationConfig,
    notifier: Arc<dyn OccurrenceNotifier>,
}

impl<R: GenerationRepository> RecurrenceGenerator<R> {
    pub fn new(repo: R, config: GenerationConfig) -> Self {
        Self {
            repo,
            config,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OccurrenceNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Materializes every occurrence due on or before `as_of`.
    ///
    /// Only loading the rule set can fail the whole run. Per-rule problems are
    /// reported in [`GenerationReport::failed`] and never stop the other rules.
    /// Running twice with the same `as_of` creates nothing the second time.
    #[instrument(skip(self), fields(concurrency = self.config.concurrency))]
    pub async fn process_due_recurrences(&self, as_of: NaiveDate) -> Result<GenerationReport, CoreError> {
        let started = Instant::now();
        let rules = self.repo.find_active_rules().await?;
        debug!(rules = rules.len(), "loaded active recurrence rules");

        let runs: Vec<RuleRun> = stream::iter(rules)
            .map(|rule| self.process_rule(rule, as_of))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = GenerationReport {
            as_of: Some(as_of),
            ..Default::default()
        };
        for run in runs {
            report.absorb(run);
        }
        report.failed.sort();
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            generated = report.generated,
            skipped = report.skipped,
            ended = report.ended,
            failed = report.failed.len(),
            duration_ms = report.duration_ms,
            "recurrence run finished"
        );
        Ok(report)
    }

    async fn process_rule(&self, mut rule: RecurrenceRule, as_of: NaiveDate) -> RuleRun {
        let mut run = RuleRun::new(rule.id);
        let limit = if self.config.enable_catchup {
            self.config.max_catchup_per_rule.max(1)
        } else {
            1
        };
        let mut template: Option<Task> = None;
        let mut conflicts = 0usize;

        loop {
            if run.generated.len() >= limit && has_due_step(&rule, as_of) {
                if self.config.enable_catchup {
                    warn!(rule_id = %rule.id, limit, "catch-up limit reached, remaining occurrences deferred");
                }
                run.outcome = RuleOutcome::CatchupLimit;
                break;
            }

            let step = plan_after(&rule, rule.last_generated, rule.last_due);
            let result = match step {
                NextStep::Ended => match self.repo.mark_dormant(&rule).await {
                    Ok(_) => {
                        info!(rule_id = %rule.id, "recurrence ended");
                        run.outcome = RuleOutcome::Ended;
                        break;
                    }
                    Err(err) => Err(err),
                },
                NextStep::Occurrence(occurrence) | NextStep::Coalesced(occurrence)
                    if occurrence.due > as_of =>
                {
                    break;
                }
                NextStep::Coalesced(occurrence) => {
                    debug!(rule_id = %rule.id, scheduled = %occurrence.scheduled, "weekend shift coalesced");
                    self.repo.commit_occurrence(&rule, occurrence.scheduled, None).await
                }
                NextStep::Occurrence(occurrence) => {
                    if template.as_ref().map(|t| t.id) != Some(rule.template_task_id) {
                        template = match self.repo.find_template(rule.template_task_id).await {
                            Ok(found) => found,
                            Err(err) => {
                                error!(rule_id = %rule.id, error = %err, "could not load template");
                                run.outcome = RuleOutcome::Failed;
                                break;
                            }
                        };
                    }
                    self.generate(&rule, template.as_ref(), occurrence, &mut run).await
                }
            };

            match result {
                Ok(updated) => {
                    rule = updated;
                    conflicts = 0;
                }
                Err(err) => match self.recover(&rule, err, &mut conflicts).await {
                    Recovery::Retry(reloaded) => rule = reloaded,
                    Recovery::Stop(outcome) => {
                        run.outcome = outcome;
                        break;
                    }
                },
            }
        }

        run
    }

    /// One materialize-and-commit step. The notifier runs only after commit.
    async fn generate(
        &self,
        rule: &RecurrenceRule,
        template: Option<&Task>,
        occurrence: Occurrence,
        run: &mut RuleRun,
    ) -> Result<RecurrenceRule, CoreError> {
        let task = materialize(rule, template, occurrence.due)?;
        let updated = self
            .repo
            .commit_occurrence(rule, occurrence.scheduled, Some(&task))
            .await?;

        debug!(rule_id = %rule.id, task_id = %task.id, due = %occurrence.due, "occurrence committed");
        self.notifier.occurrence_generated(&updated, &task).await;
        run.generated.push(task.id);
        Ok(updated)
    }

    async fn recover(&self, rule: &RecurrenceRule, err: CoreError, conflicts: &mut usize) -> Recovery {
        match err {
            CoreError::PersistenceConflict(_) => {
                *conflicts += 1;
                if *conflicts > self.config.max_conflict_retries {
                    warn!(rule_id = %rule.id, attempts = *conflicts, "giving up on contended rule until next run");
                    return Recovery::Stop(RuleOutcome::UpToDate);
                }
                debug!(rule_id = %rule.id, attempt = *conflicts, "concurrent update, reloading rule");
                match self.repo.reload_rule(rule.id).await {
                    Ok(Some(reloaded)) if reloaded.is_active() => Recovery::Retry(reloaded),
                    // Deleted or ended by someone else: nothing left for this run.
                    Ok(_) => Recovery::Stop(RuleOutcome::UpToDate),
                    Err(err) => {
                        error!(rule_id = %rule.id, error = %err, "could not reload rule");
                        Recovery::Stop(RuleOutcome::Failed)
                    }
                }
            }
            CoreError::TemplateUnavailable(_) => {
                warn!(rule_id = %rule.id, template_id = %rule.template_task_id, "template missing, rule skipped");
                Recovery::Stop(RuleOutcome::Failed)
            }
            err => {
                error!(rule_id = %rule.id, error = %err, "failed to process rule");
                Recovery::Stop(RuleOutcome::Failed)
            }
        }
    }
}

/// True if the rule's next step is an occurrence due on or before `as_of`.
fn has_due_step(rule: &RecurrenceRule, as_of: NaiveDate) -> bool {
    match plan_after(rule, rule.last_generated, rule.last_due) {
        NextStep::Occurrence(occurrence) | NextStep::Coalesced(occurrence) => occurrence.due <= as_of,
        NextStep::Ended => false,
    }
}
