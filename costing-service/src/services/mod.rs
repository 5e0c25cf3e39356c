pub mod adjustment;
pub mod backend;
pub mod costing;
pub mod form_binding;
pub mod metrics;
pub mod review;
pub mod rollup;

pub use adjustment::{adjust, AdjustmentPolicy, AdjustmentScope};
pub use backend::{BackendError, CostsBackend, HttpCostsBackend};
pub use costing::CostOverflow;
pub use form_binding::{flatten, reconstitute, FieldKey, FormValues};
pub use metrics::{get_metrics, init_metrics};
pub use review::{ReviewError, ReviewPhase, ReviewService, ReviewSession, ReviewSnapshot};
pub use rollup::{build_rollup, RollupTotals};
