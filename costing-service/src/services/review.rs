//! The cost review step: one editable rollup per project.
//!
//! [`ReviewSession`] holds the current rollup snapshot and its form values and
//! enforces the phase rules. [`ReviewService`] owns the sessions and does the
//! backend round trips around them.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::{AppError, FieldMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::adjustment::{self, AdjustmentError, AdjustmentPolicy, AdjustmentScope};
use super::backend::{BackendError, CostsBackend};
use super::costing::CostOverflow;
use super::form_binding::{
    flatten, reconstitute, FieldError, FieldInput, FieldKey, FieldKeyParseError, FormValues,
    LineField,
};
use super::metrics;
use super::rollup::RollupTotals;
use crate::models::ProjectRollup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    Loading,
    Ready,
    Saving,
    SaveFailed,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Failed to load costs for project {project_id}: {source}")]
    LoadFailure {
        project_id: i64,
        #[source]
        source: BackendError,
    },

    #[error("{} field(s) are missing or invalid", .0.len())]
    ValidationFailure(Vec<FieldError>),

    #[error("Failed to save costs for project {project_id}: {source}")]
    SaveFailure {
        project_id: i64,
        #[source]
        source: BackendError,
    },

    #[error("Project {0} is busy loading or saving")]
    Busy(i64),

    #[error("No review is loaded for project {0}")]
    NotLoaded(i64),

    #[error(transparent)]
    InvalidKey(#[from] FieldKeyParseError),

    #[error("Field {0} is not part of this review")]
    UnknownField(String),

    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),

    #[error("Edited values take the project totals beyond the supported range")]
    OutOfRange(#[from] CostOverflow),
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::LoadFailure { .. } | ReviewError::SaveFailure { .. } => {
                AppError::BadGateway(err.to_string())
            }
            ReviewError::ValidationFailure(ref errors) => AppError::UnprocessableEntity {
                message: err.to_string(),
                fields: errors
                    .iter()
                    .map(|e| FieldMessage {
                        field: e.key.clone(),
                        message: e.message.clone(),
                    })
                    .collect(),
            },
            ReviewError::OutOfRange(_) | ReviewError::Adjustment(AdjustmentError::Overflow) => {
                AppError::UnprocessableEntity {
                    message: err.to_string(),
                    fields: Vec::new(),
                }
            }
            ReviewError::Busy(_) => AppError::Conflict(anyhow::Error::new(err)),
            ReviewError::NotLoaded(_) => AppError::NotFound(anyhow::Error::new(err)),
            ReviewError::InvalidKey(_)
            | ReviewError::UnknownField(_)
            | ReviewError::Adjustment(_) => AppError::BadRequest(anyhow::Error::new(err)),
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    pub project_id: i64,
    pub phase: ReviewPhase,
    pub rollup: ProjectRollup,
    pub totals: RollupTotals,
    pub form: BTreeMap<String, Option<Decimal>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    project_id: i64,
    phase: ReviewPhase,
    rollup: ProjectRollup,
    totals: RollupTotals,
    form: FormValues,
    last_error: Option<String>,
    policy: AdjustmentPolicy,
}

impl ReviewSession {
    pub fn new(project_id: i64, policy: AdjustmentPolicy) -> Self {
        Self {
            project_id,
            phase: ReviewPhase::Loading,
            rollup: ProjectRollup::default(),
            totals: RollupTotals::default(),
            form: FormValues::default(),
            last_error: None,
            policy,
        }
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn rollup(&self) -> &ProjectRollup {
        &self.rollup
    }

    pub fn form(&self) -> &FormValues {
        &self.form
    }

    pub fn totals(&self) -> &RollupTotals {
        &self.totals
    }

    /// Replace the snapshot with a freshly fetched rollup.
    ///
    /// A rollup whose totals cannot be computed is refused and the session
    /// is left untouched.
    pub fn loaded(&mut self, rollup: ProjectRollup) -> Result<(), CostOverflow> {
        let totals = rollup.totals()?;
        self.replace(rollup, totals);
        Ok(())
    }

    fn replace(&mut self, rollup: ProjectRollup, totals: RollupTotals) {
        self.form = flatten(&rollup);
        self.rollup = rollup;
        self.totals = totals;
        self.phase = ReviewPhase::Ready;
        self.last_error = None;
    }

    fn ensure_idle(&mut self) -> Result<(), ReviewError> {
        match self.phase {
            ReviewPhase::Loading | ReviewPhase::Saving => Err(ReviewError::Busy(self.project_id)),
            ReviewPhase::Ready | ReviewPhase::SaveFailed => {
                self.phase = ReviewPhase::Ready;
                Ok(())
            }
        }
    }

    /// Scale in-scope prices and refresh their form fields.
    ///
    /// Unsaved edits of the adjusted fields are replaced by the adjusted
    /// values; edits of other fields are kept.
    pub fn adjust(&mut self, scope: AdjustmentScope, percent: Decimal) -> Result<(), ReviewError> {
        self.ensure_idle()?;

        let adjusted = adjustment::adjust(&self.rollup, scope, percent, self.policy)?;
        let totals = adjusted.totals().map_err(AdjustmentError::from)?;
        for (key, input) in flatten(&adjusted).iter() {
            if scope_covers(scope, key) {
                self.form.set(*key, input.clone());
            }
        }
        self.rollup = adjusted;
        self.totals = totals;

        Ok(())
    }

    /// Apply raw user inputs. Either every key is known and all are applied,
    /// or nothing changes.
    pub fn edit(&mut self, edits: &[(FieldKey, String)]) -> Result<(), ReviewError> {
        self.ensure_idle()?;

        if let Some((key, _)) = edits.iter().find(|(key, _)| !self.form.contains(key)) {
            return Err(ReviewError::UnknownField(key.to_string()));
        }
        for (key, raw) in edits {
            self.form.set(*key, FieldInput::parse(raw));
        }

        Ok(())
    }

    /// Validate the form and enter `Saving`, returning the payload to persist.
    pub fn begin_save(&mut self) -> Result<ProjectRollup, ReviewError> {
        self.ensure_idle()?;

        let merged = reconstitute(&self.rollup, &self.form).map_err(ReviewError::ValidationFailure)?;
        merged.totals()?;
        self.phase = ReviewPhase::Saving;
        Ok(merged)
    }

    /// Show the refetched rollup, or the saved payload when there is no
    /// usable refetch.
    pub fn save_succeeded(&mut self, saved: ProjectRollup, refreshed: Option<ProjectRollup>) {
        if let Some(rollup) = refreshed {
            match self.loaded(rollup) {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Refetched costs unusable, keeping saved values")
                }
            }
        }
        // begin_save already priced the payload
        let totals = saved.totals().unwrap_or_default();
        self.replace(saved, totals);
    }

    /// The rollup and form stay as they were so the user can retry.
    pub fn save_failed(&mut self, message: String) {
        self.phase = ReviewPhase::SaveFailed;
        self.last_error = Some(message);
    }

    pub fn begin_reset(&mut self) -> Result<(), ReviewError> {
        self.ensure_idle()?;
        self.phase = ReviewPhase::Loading;
        Ok(())
    }

    /// Keep the current snapshot when the refetch did not succeed.
    pub fn reset_failed(&mut self, message: String) {
        self.phase = ReviewPhase::Ready;
        self.last_error = Some(message);
    }

    pub fn snapshot(&self) -> ReviewSnapshot {
        ReviewSnapshot {
            project_id: self.project_id,
            phase: self.phase,
            rollup: self.rollup.clone(),
            totals: self.totals.clone(),
            form: self.form.to_wire(),
            last_error: self.last_error.clone(),
        }
    }
}

fn scope_covers(scope: AdjustmentScope, key: &FieldKey) -> bool {
    match key {
        FieldKey::ProfitMargin => false,
        FieldKey::Line { field, .. } => matches!(
            (scope, field),
            (AdjustmentScope::All, _)
                | (AdjustmentScope::Materials, LineField::Material(_))
                | (AdjustmentScope::Labor, LineField::Labor(_))
        ),
    }
}

type SharedSession = Arc<Mutex<ReviewSession>>;

/// Review sessions keyed by project id.
pub struct ReviewService {
    backend: Arc<dyn CostsBackend>,
    sessions: DashMap<i64, SharedSession>,
    policy: AdjustmentPolicy,
}

impl ReviewService {
    pub fn new(backend: Arc<dyn CostsBackend>, policy: AdjustmentPolicy) -> Self {
        Self {
            backend,
            sessions: DashMap::new(),
            policy,
        }
    }

    fn session(&self, project_id: i64) -> Result<SharedSession, ReviewError> {
        self.sessions
            .get(&project_id)
            .map(|entry| entry.value().clone())
            .ok_or(ReviewError::NotLoaded(project_id))
    }

    /// Start a review. An existing session is refetched instead.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, project_id: i64) -> Result<ReviewSnapshot, ReviewError> {
        let mut created = false;
        let session = self
            .sessions
            .entry(project_id)
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(ReviewSession::new(project_id, self.policy)))
            })
            .value()
            .clone();
        if !created {
            return self.reset(project_id).await;
        }

        tracing::info!("Loading project costs");
        let fetched = self.backend.fetch_costs(project_id).await;
        let mut session = session.lock().await;
        match fetched.and_then(|rollup| session.loaded(rollup).map_err(BackendError::from)) {
            Ok(()) => {
                tracing::info!(phase = ?session.phase(), "Review ready");
                Ok(session.snapshot())
            }
            Err(source) => {
                self.sessions.remove(&project_id);
                tracing::warn!(error = %source, "Review load failed");
                Err(ReviewError::LoadFailure { project_id, source })
            }
        }
    }

    pub async fn snapshot(&self, project_id: i64) -> Result<ReviewSnapshot, ReviewError> {
        let session = self.session(project_id)?;
        let session = session.lock().await;
        Ok(session.snapshot())
    }

    /// Drop a session. An in-flight save still completes against the backend.
    pub fn discard(&self, project_id: i64) -> Result<(), ReviewError> {
        match self.sessions.remove(&project_id) {
            Some(_) => {
                tracing::info!(project_id, "Review discarded");
                Ok(())
            }
            None => Err(ReviewError::NotLoaded(project_id)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        project_id: i64,
        scope: AdjustmentScope,
        percent: Decimal,
    ) -> Result<ReviewSnapshot, ReviewError> {
        let session = self.session(project_id)?;
        let mut session = session.lock().await;

        session.adjust(scope, percent)?;
        metrics::record_adjustment(scope.as_str());
        tracing::info!("Applied bulk adjustment");

        Ok(session.snapshot())
    }

    #[tracing::instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn edit(
        &self,
        project_id: i64,
        inputs: BTreeMap<String, String>,
    ) -> Result<ReviewSnapshot, ReviewError> {
        let edits = inputs
            .into_iter()
            .map(|(key, raw)| Ok((key.parse::<FieldKey>()?, raw)))
            .collect::<Result<Vec<_>, ReviewError>>()?;

        let session = self.session(project_id)?;
        let mut session = session.lock().await;
        session.edit(&edits)?;
        tracing::debug!("Applied field edits");

        Ok(session.snapshot())
    }

    /// Validate, persist and refetch.
    ///
    /// The session lock is released while the backend call is in flight;
    /// the `Saving` phase rejects other mutations meanwhile.
    #[tracing::instrument(skip(self))]
    pub async fn save(&self, project_id: i64) -> Result<ReviewSnapshot, ReviewError> {
        let shared = self.session(project_id)?;

        let payload = {
            let mut session = shared.lock().await;
            match session.begin_save() {
                Ok(payload) => payload,
                Err(ReviewError::ValidationFailure(errors)) => {
                    metrics::record_save("invalid");
                    for error in &errors {
                        metrics::record_validation_failure(error.kind.as_str());
                    }
                    tracing::info!(invalid_fields = errors.len(), "Save rejected by validation");
                    return Err(ReviewError::ValidationFailure(errors));
                }
                Err(e) => return Err(e),
            }
        };

        if let Err(source) = self.backend.save_costs(project_id, &payload).await {
            metrics::record_save("failed");
            let err = ReviewError::SaveFailure { project_id, source };
            shared.lock().await.save_failed(err.to_string());
            return Err(err);
        }
        metrics::record_save("saved");

        let refreshed = match self.backend.fetch_costs(project_id).await {
            Ok(rollup) => Some(rollup),
            Err(e) => {
                tracing::warn!(error = %e, "Refetch after save failed, keeping saved values");
                None
            }
        };

        let mut session = shared.lock().await;
        session.save_succeeded(payload, refreshed);
        tracing::info!("Project costs saved");
        Ok(session.snapshot())
    }

    /// Refetch the original rollup, undoing adjustments and unsaved edits.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self, project_id: i64) -> Result<ReviewSnapshot, ReviewError> {
        let shared = self.session(project_id)?;
        shared.lock().await.begin_reset()?;

        let fetched = self.backend.fetch_costs(project_id).await;
        let mut session = shared.lock().await;
        match fetched.and_then(|rollup| session.loaded(rollup).map_err(BackendError::from)) {
            Ok(()) => {
                tracing::info!("Review reset");
                Ok(session.snapshot())
            }
            Err(source) => {
                let err = ReviewError::LoadFailure { project_id, source };
                session.reset_failed(err.to_string());
                Err(err)
            }
        }
    }
}
