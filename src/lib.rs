//! Filter and chart-configuration engine for tabular datasets.
//!
//! ```text
//!  bytes + extension ──► data::loader ──► Dataset ──► SchemaInspector
//!                                            │              │
//!                                            ▼              ▼
//!                 DashboardConfig ──► FilterPipeline ──► ChartSpecResolver
//!                                            │              │
//!                                            ▼              ▼
//!                                     data::export       ChartSpec ──► ui
//! ```

pub mod chart;
pub mod color;
pub mod data;
pub mod settings;
pub mod state;
