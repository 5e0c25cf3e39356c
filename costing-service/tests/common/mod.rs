#![allow(dead_code)]

use async_trait::async_trait;
use costing_service::models::ProjectRollup;
use costing_service::services::{AdjustmentPolicy, BackendError, CostsBackend, ReviewService};
use costing_service::{build_router, AppState};
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const PROJECT_ID: i64 = 42;

pub fn d(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// A project as the backend returns it, using the backend's field names.
///
/// Module 7 is used standalone (quantity 2) and inside bundle 90 (detail
/// quantity 3, bundle quantity 2). Unit price 10 × 5 and labor 20 × 2h give a
/// module unit total of 90.
pub fn backend_payload() -> serde_json::Value {
    let module = json!({
        "moduleId": 7,
        "moduleName": "Lighting circuit",
        "systemName": "Electrical",
        "quantity": 2,
        "moduleMaterials": [{
            "projectMaterialId": 700,
            "materialName": "Cable 12AWG",
            "quantity": 5,
            "unitPrice": 10,
            "cifPrice": 8,
            "handlingCost": 0.5,
            "taxRate": 16,
            "supplierId": 3
        }],
        "moduleLabors": [{
            "moduleLaborId": 701,
            "laborType": "Electrician",
            "quantity": 1,
            "hourlyRate": 20,
            "hoursRequired": 2,
            "allowanceAmount": 0,
            "allowanceQuantity": 0
        }]
    });

    json!({
        "modules": [module.clone()],
        "modulesComposite": [{
            "moduleCompositeId": 90,
            "compositeName": "Panel kit",
            "quantity": 2,
            "compositeDetails": [{ "moduleId": 7, "quantity": 3, "module": module }]
        }],
        "profitMargin": 10,
        "distance": 12.5,
        "projectName": "Warehouse retrofit"
    })
}

pub fn fixture_rollup() -> ProjectRollup {
    serde_json::from_value(backend_payload()).expect("fixture payload should decode")
}

/// Holds `save_costs` until released, so tests can act while a save is in flight.
#[derive(Clone, Default)]
pub struct SaveGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
struct MockState {
    rollup: Option<ProjectRollup>,
    fail_fetch: bool,
    fail_save: bool,
    fetches: usize,
    saved: Vec<ProjectRollup>,
    save_gate: Option<SaveGate>,
}

/// In-memory costs backend. Saves replace the stored rollup.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn with_rollup(rollup: ProjectRollup) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().rollup = Some(rollup);
        backend
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn fail_save(&self, fail: bool) {
        self.state.lock().unwrap().fail_save = fail;
    }

    pub fn hold_saves(&self) -> SaveGate {
        let gate = SaveGate::default();
        self.state.lock().unwrap().save_gate = Some(gate.clone());
        gate
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub fn saved(&self) -> Vec<ProjectRollup> {
        self.state.lock().unwrap().saved.clone()
    }
}

fn unavailable() -> BackendError {
    BackendError::Status {
        status: 503,
        body: "backend unavailable".to_string(),
    }
}

#[async_trait]
impl CostsBackend for MockBackend {
    async fn fetch_costs(&self, _project_id: i64) -> Result<ProjectRollup, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        if state.fail_fetch {
            return Err(unavailable());
        }
        state.rollup.clone().ok_or(BackendError::Status {
            status: 404,
            body: "project not found".to_string(),
        })
    }

    async fn save_costs(
        &self,
        _project_id: i64,
        rollup: &ProjectRollup,
    ) -> Result<(), BackendError> {
        let gate = self.state.lock().unwrap().save_gate.clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_save {
            return Err(unavailable());
        }
        state.saved.push(rollup.clone());
        state.rollup = Some(rollup.clone());
        Ok(())
    }
}

pub fn review_service(backend: &MockBackend) -> ReviewService {
    ReviewService::new(Arc::new(backend.clone()), AdjustmentPolicy::default())
}

pub fn test_router(backend: &MockBackend) -> axum::Router {
    build_router(AppState::new(
        Arc::new(backend.clone()),
        AdjustmentPolicy::default(),
    ))
}
