use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;

use crate::chart::{resolve, ChartError, ChartKind, ChartRequest, ChartSpec, Resolution, Role};
use crate::data::export::{write_csv, ExportError};
use crate::data::filter::{numeric_bounds, temporal_bounds, FilterClause, FilterPipeline};
use crate::data::model::{CellValue, Dataset};
use crate::data::schema::{ColumnDescriptor, ColumnKind, ConfigurationError, SchemaInspector};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Presentation choices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl ChartSize {
    pub const ALL: [ChartSize; 3] = [ChartSize::Small, ChartSize::Medium, ChartSize::Large];

    /// `(width, height)` in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            ChartSize::Small => (400.0, 300.0),
            ChartSize::Medium => (700.0, 500.0),
            ChartSize::Large => (1000.0, 700.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Session – one uploaded dataset and its cached descriptors
// ---------------------------------------------------------------------------

/// Column counts shown above the preview. Every non-numeric column,
/// temporal included, counts as categorical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub numeric_columns: usize,
    pub categorical_columns: usize,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub source: String,
    pub dataset: Dataset,
    pub descriptors: Vec<ColumnDescriptor>,
}

impl Session {
    /// Classify once; the descriptors stay with the dataset for its lifetime.
    pub fn new(source: impl Into<String>, dataset: Dataset, inspector: &SchemaInspector) -> Self {
        let descriptors = inspector.classify(&dataset);
        Self {
            source: source.into(),
            dataset,
            descriptors,
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            numeric_columns: self.columns_where(|k| k == ColumnKind::Numeric).len(),
            categorical_columns: self.columns_where(|k| k != ColumnKind::Numeric).len(),
            rows: self.dataset.len(),
        }
    }

    /// Names of columns whose kind passes `pred`, in column order.
    pub fn columns_where(&self, pred: impl Fn(ColumnKind) -> bool) -> Vec<String> {
        self.descriptors
            .iter()
            .filter(|d| pred(d.kind))
            .map(|d| d.name.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Filter controls – the sidebar's filter widgets as plain data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RangeControl {
    pub column: String,
    /// Full extent of the original dataset.
    pub bounds: (f64, f64),
    pub selected: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateControl {
    pub column: String,
    pub bounds: (NaiveDate, NaiveDate),
    pub selected: (NaiveDate, NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipControl {
    pub column: String,
    pub options: BTreeSet<CellValue>,
    pub selected: BTreeSet<CellValue>,
}

/// Widget state for every filter. Turned into [`FilterClause`]s by
/// [`FilterControls::clauses`]; range controls left at their full extent
/// add no clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterControls {
    pub text_column: Option<String>,
    pub text_query: String,
    pub memberships: Vec<MembershipControl>,
    pub date: Option<DateControl>,
    pub ranges: Vec<RangeControl>,
}

impl FilterControls {
    /// One membership filter per leading string-valued column, one range per
    /// leading numeric column, a date filter on the first temporal column.
    /// Bounds come from the original dataset.
    pub fn defaults(session: &Session, settings: &Settings) -> Self {
        let ds = &session.dataset;
        let memberships = session
            .columns_where(ColumnKind::is_string_valued)
            .into_iter()
            .take(settings.membership_filters)
            .filter_map(|column| {
                let options = ds.column(&column)?.unique_values();
                Some(MembershipControl {
                    column,
                    options,
                    selected: BTreeSet::new(),
                })
            })
            .collect();
        let ranges = session
            .columns_where(|k| k == ColumnKind::Numeric)
            .into_iter()
            .take(settings.range_filters)
            .filter_map(|column| {
                let bounds = numeric_bounds(ds, &column)?;
                Some(RangeControl {
                    column,
                    bounds,
                    selected: bounds,
                })
            })
            .collect();
        let date = session
            .columns_where(|k| k == ColumnKind::Temporal)
            .into_iter()
            .next()
            .and_then(|column| Self::date_control(session, column));
        Self {
            text_column: None,
            text_query: String::new(),
            memberships,
            date,
            ranges,
        }
    }

    /// Date control over `column` spanning its full extent.
    pub fn date_control(session: &Session, column: String) -> Option<DateControl> {
        let (lo, hi) = temporal_bounds(&session.dataset, &column)?;
        let bounds = (lo.date(), hi.date());
        Some(DateControl {
            column,
            bounds,
            selected: bounds,
        })
    }

    pub fn clauses(&self) -> Vec<FilterClause> {
        let mut out = Vec::new();
        if let Some(column) = &self.text_column {
            if !self.text_query.is_empty() {
                out.push(FilterClause::text_contains(column.clone(), self.text_query.clone()));
            }
        }
        for m in &self.memberships {
            if !m.selected.is_empty() {
                out.push(FilterClause::membership(m.column.clone(), m.selected.iter().cloned()));
            }
        }
        if let Some(d) = &self.date {
            if d.selected != d.bounds {
                out.push(FilterClause::date_range_days(d.column.clone(), d.selected.0, d.selected.1));
            }
        }
        for r in &self.ranges {
            if r.selected != r.bounds {
                out.push(FilterClause::numeric_range(r.column.clone(), r.selected.0, r.selected.1));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// DashboardConfig and the reducer
// ---------------------------------------------------------------------------

/// Everything the user has chosen. Rebuilt or edited on every interaction and
/// fed whole to [`evaluate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardConfig {
    pub filters: FilterControls,
    /// Clauses beyond the sidebar controls.
    pub extra_clauses: Vec<FilterClause>,
    pub chart: ChartRequest,
    pub title: String,
    pub theme: Theme,
    pub size: ChartSize,
}

impl DashboardConfig {
    pub fn defaults(session: &Session, settings: &Settings) -> Self {
        let mut chart = default_request(ChartKind::Scatter, session);
        chart.bins = Some(settings.default_bins);
        Self {
            filters: FilterControls::defaults(session, settings),
            extra_clauses: Vec::new(),
            chart,
            title: settings.default_title.clone(),
            theme: Theme::default(),
            size: ChartSize::default(),
        }
    }

    pub fn clauses(&self) -> Vec<FilterClause> {
        let mut clauses = self.filters.clauses();
        clauses.extend(self.extra_clauses.iter().cloned());
        clauses
    }
}

/// Bindings a freshly picked chart kind starts with: the first column of a
/// fitting kind for each required role and no optional roles. Treemap paths
/// start empty.
pub fn default_request(kind: ChartKind, session: &Session) -> ChartRequest {
    let mut request = ChartRequest::new(kind);
    for spec in kind.roles().iter().filter(|r| r.required) {
        if spec.role == Role::Path {
            request.bindings.insert(Role::Path, Vec::new());
            continue;
        }
        if let Some(column) = session.columns_where(|k| spec.accepts.accepts(k)).into_iter().next() {
            request = request.bind(spec.role, column);
        }
    }
    request
}

/// What the chart area shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Ready(ChartSpec),
    /// Required roles still unbound.
    Incomplete(Vec<Role>),
    /// A deliberate empty selection; show a hint, not an error.
    NothingToRender(String),
    Failed(ChartError),
}

/// Row positions holding the minimum and the maximum of a numeric column in
/// the filtered data. Ties keep every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extremes {
    pub min_rows: BTreeSet<usize>,
    pub max_rows: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub filtered: Dataset,
    pub filter_errors: Vec<(usize, ConfigurationError)>,
    pub chart: ChartOutcome,
    /// Per column of `filtered`; `None` for non-numeric or empty columns.
    pub extremes: Vec<Option<Extremes>>,
}

/// Recompute everything derived from the session and the configuration.
/// Pure: same inputs, same output; the session's dataset is never touched.
pub fn evaluate(session: &Session, config: &DashboardConfig) -> Evaluation {
    let clauses = config.clauses();
    let (pipeline, filter_errors) = FilterPipeline::from_clauses(&clauses, &session.descriptors);
    let filtered = pipeline.apply(&session.dataset);

    let chart = match resolve(&config.chart, &filtered, &session.descriptors) {
        Ok(Resolution::Ready(spec)) => ChartOutcome::Ready(spec),
        Ok(Resolution::Incomplete { missing }) => ChartOutcome::Incomplete(missing),
        Err(ChartError::Validation(v)) if v.is_nothing_to_render() => {
            ChartOutcome::NothingToRender(v.to_string())
        }
        Err(e) => ChartOutcome::Failed(e),
    };

    let extremes = column_extremes(&filtered, &session.descriptors);
    log::debug!(
        "evaluated {} clauses: {} of {} rows kept",
        pipeline.len(),
        filtered.len(),
        session.dataset.len()
    );

    Evaluation {
        filtered,
        filter_errors,
        chart,
        extremes,
    }
}

/// Row positions of every minimum and every maximum of each numeric column.
pub fn column_extremes(dataset: &Dataset, descriptors: &[ColumnDescriptor]) -> Vec<Option<Extremes>> {
    dataset
        .columns()
        .iter()
        .map(|col| {
            let numeric = descriptors
                .iter()
                .any(|d| d.name == col.name && d.kind == ColumnKind::Numeric);
            if !numeric {
                return None;
            }
            let values: Vec<(usize, f64)> = col
                .values
                .iter()
                .enumerate()
                .filter_map(|(row, v)| Some((row, v.as_f64().filter(|v| !v.is_nan())?)))
                .collect();
            let lo = values.iter().map(|&(_, v)| v).reduce(f64::min)?;
            let hi = values.iter().map(|&(_, v)| v).reduce(f64::max)?;
            let rows_at = |target: f64| -> BTreeSet<usize> {
                values
                    .iter()
                    .filter(|&&(_, v)| v == target)
                    .map(|&(row, _)| row)
                    .collect()
            };
            Some(Extremes {
                min_rows: rows_at(lo),
                max_rows: rows_at(hi),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: Settings,

    /// Loaded dataset (None until user uploads a file).
    pub session: Option<Session>,

    pub config: DashboardConfig,

    /// Result of the last [`evaluate`] (cached until the config changes).
    pub evaluation: Option<Evaluation>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether a file loading operation is in progress.
    pub loading: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            session: None,
            config: DashboardConfig::default(),
            evaluation: None,
            status_message: None,
            loading: false,
        }
    }

    /// Ingest a newly loaded dataset: classify, build default controls, evaluate.
    pub fn set_dataset(&mut self, source: impl Into<String>, dataset: Dataset) {
        let session = Session::new(source, dataset, &self.settings.inspector());
        let summary = session.summary();
        log::info!(
            "loaded {}: {} rows, {} columns ({} numeric, {} categorical)",
            session.source,
            summary.rows,
            session.descriptors.len(),
            summary.numeric_columns,
            summary.categorical_columns
        );
        let theme = self.config.theme;
        self.config = DashboardConfig::defaults(&session, &self.settings);
        self.config.theme = theme;
        self.session = Some(session);
        self.status_message = None;
        self.loading = false;
        self.refresh();
    }

    /// Recompute the evaluation after any config change.
    pub fn refresh(&mut self) {
        self.evaluation = self.session.as_ref().map(|s| evaluate(s, &self.config));
    }

    /// Put every filter back to its default.
    pub fn reset_filters(&mut self) {
        if let Some(session) = &self.session {
            self.config.filters = FilterControls::defaults(session, &self.settings);
            self.config.extra_clauses.clear();
            self.refresh();
        }
    }

    /// Switch chart kind and start from that kind's default bindings.
    pub fn set_chart_kind(&mut self, kind: ChartKind) {
        if self.config.chart.kind == kind {
            return;
        }
        if let Some(session) = &self.session {
            let bins = self.config.chart.bins;
            self.config.chart = default_request(kind, session);
            self.config.chart.bins = bins;
            self.refresh();
        }
    }

    /// Write the currently filtered rows as CSV.
    pub fn export_filtered(&self, path: &Path) -> Result<(), ExportError> {
        let empty = Dataset::default();
        let data = self.evaluation.as_ref().map_or(&empty, |e| &e.filtered);
        write_csv(data, path)
    }
}
