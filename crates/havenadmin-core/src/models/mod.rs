//! Data models for the survey backend.
//!
//! - `SurveyResponse`, `Features`: submitted surveys and their validation
//! - `FormField`: survey form schema
//! - `ServerMetrics`, `DashboardMetrics`, `ChartData`: admin dashboard inputs

pub mod form;
pub mod metrics;
pub mod survey;

pub use form::{DependsOnValue, FieldType, FieldValidation, FormField};
pub use metrics::{ChartData, Colors, DashboardMetrics, Dataset, Distributions, ServerMetrics};
pub use survey::{Features, SurveyResponse, ValidationError};
