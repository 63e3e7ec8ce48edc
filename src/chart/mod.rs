/// Chart layer: chart kinds and their role tables, request resolution, and
/// the statistics charts derive from data.
///
/// ```text
///   ChartRequest ──┐
///   Dataset ───────┼──► resolve ──► Resolution::Ready(ChartSpec)
///   descriptors ───┘               Resolution::Incomplete { missing }
///                                  Err(ChartError)
/// ```
pub mod resolve;
pub mod spec;
pub mod stats;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::data::schema::{ColumnKind, ConfigurationError};

pub use resolve::{resolve, Resolution};
pub use spec::{ChartSpec, Encoding};

pub const DEFAULT_BINS: usize = 30;
pub const MIN_BINS: usize = 5;
pub const MAX_BINS: usize = 100;

// ---------------------------------------------------------------------------
// Chart kinds and roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChartKind {
    #[default]
    Scatter,
    Line,
    Histogram,
    Box,
    Heatmap,
    Pie,
    Bar,
    Area,
    Violin,
    Treemap,
}

impl ChartKind {
    pub const ALL: [ChartKind; 10] = [
        ChartKind::Scatter,
        ChartKind::Line,
        ChartKind::Histogram,
        ChartKind::Box,
        ChartKind::Heatmap,
        ChartKind::Pie,
        ChartKind::Bar,
        ChartKind::Area,
        ChartKind::Violin,
        ChartKind::Treemap,
    ];

    /// The roles this kind declares, required ones first.
    pub fn roles(self) -> &'static [RoleSpec] {
        match self {
            ChartKind::Scatter => SCATTER_ROLES,
            ChartKind::Line | ChartKind::Area => LINE_ROLES,
            ChartKind::Histogram => HISTOGRAM_ROLES,
            ChartKind::Box | ChartKind::Violin => DISTRIBUTION_ROLES,
            ChartKind::Heatmap => &[],
            ChartKind::Pie => PIE_ROLES,
            ChartKind::Bar => BAR_ROLES,
            ChartKind::Treemap => TREEMAP_ROLES,
        }
    }
}

const fn req(role: Role, accepts: RoleKind) -> RoleSpec {
    RoleSpec { role, accepts, required: true }
}

const fn opt(role: Role, accepts: RoleKind) -> RoleSpec {
    RoleSpec { role, accepts, required: false }
}

const SCATTER_ROLES: &[RoleSpec] = &[
    req(Role::X, RoleKind::Numeric),
    req(Role::Y, RoleKind::Numeric),
    opt(Role::Color, RoleKind::Categorical),
];
const LINE_ROLES: &[RoleSpec] = &[
    req(Role::X, RoleKind::NumericOrCategorical),
    req(Role::Y, RoleKind::Numeric),
    opt(Role::Color, RoleKind::Categorical),
];
const HISTOGRAM_ROLES: &[RoleSpec] = &[req(Role::Value, RoleKind::Numeric)];
const DISTRIBUTION_ROLES: &[RoleSpec] = &[
    req(Role::Y, RoleKind::Numeric),
    req(Role::X, RoleKind::Categorical),
    opt(Role::Color, RoleKind::Categorical),
];
const PIE_ROLES: &[RoleSpec] = &[
    req(Role::Labels, RoleKind::Categorical),
    req(Role::Values, RoleKind::Numeric),
];
const BAR_ROLES: &[RoleSpec] = &[
    req(Role::X, RoleKind::Categorical),
    req(Role::Y, RoleKind::Numeric),
    opt(Role::Color, RoleKind::Categorical),
];
const TREEMAP_ROLES: &[RoleSpec] = &[
    req(Role::Path, RoleKind::Categorical),
    req(Role::Size, RoleKind::Numeric),
];

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A named slot a chart kind expects to be bound to column(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    X,
    Y,
    Color,
    Value,
    Labels,
    Values,
    Path,
    Size,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::X => "x",
            Role::Y => "y",
            Role::Color => "color",
            Role::Value => "value",
            Role::Labels => "labels",
            Role::Values => "values",
            Role::Path => "path",
            Role::Size => "size",
        }
    }

    /// Only `path` takes an ordered list of columns.
    pub fn takes_many(self) -> bool {
        self == Role::Path
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "x" => Role::X,
            "y" => Role::Y,
            "color" => Role::Color,
            "value" => Role::Value,
            "labels" => Role::Labels,
            "values" => Role::Values,
            "path" => Role::Path,
            "size" => Role::Size,
            other => return Err(format!("unknown role '{other}'")),
        })
    }
}

/// Column kinds a role accepts. "Categorical" means string-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Numeric,
    Categorical,
    NumericOrCategorical,
}

impl RoleKind {
    pub fn accepts(self, kind: ColumnKind) -> bool {
        match self {
            RoleKind::Numeric => kind == ColumnKind::Numeric,
            RoleKind::Categorical => kind.is_string_valued(),
            RoleKind::NumericOrCategorical => kind == ColumnKind::Numeric || kind.is_string_valued(),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            RoleKind::Numeric => "numeric",
            RoleKind::Categorical => "categorical",
            RoleKind::NumericOrCategorical => "numeric or categorical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSpec {
    pub role: Role,
    pub accepts: RoleKind,
    pub required: bool,
}

// ---------------------------------------------------------------------------
// ChartRequest
// ---------------------------------------------------------------------------

/// The user's chosen chart kind and role bindings, not yet validated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub bindings: BTreeMap<Role, Vec<String>>,
    /// Histogram bin count; `None` means [`DEFAULT_BINS`].
    pub bins: Option<usize>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Bind a single column to `role`, replacing any previous binding.
    pub fn bind(mut self, role: Role, column: impl Into<String>) -> Self {
        self.bindings.insert(role, vec![column.into()]);
        self
    }

    /// Bind an ordered list of columns to `role` (used for `path`).
    pub fn bind_many<S: Into<String>>(mut self, role: Role, columns: impl IntoIterator<Item = S>) -> Self {
        self.bindings
            .insert(role, columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = Some(bins);
        self
    }

    /// First column bound to `role`, if any.
    pub fn column(&self, role: Role) -> Option<&str> {
        self.bindings.get(&role)?.first().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A chart-kind specific requirement is not met.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{role} expects a {expected} column, but '{column}' is {actual}")]
    IncompatibleKind {
        role: Role,
        column: String,
        expected: &'static str,
        actual: ColumnKind,
    },
    #[error("{role} takes a single column, got {count}")]
    TooManyColumns { role: Role, count: usize },
    #[error("a heatmap needs at least two numeric columns, found {found}")]
    InsufficientNumericColumns { found: usize },
    #[error("select at least one hierarchy column")]
    EmptyPath,
    #[error("bins must be between 5 and 100, got {0}")]
    BinsOutOfRange(usize),
}

impl ValidationError {
    /// A deliberate empty selection: render nothing instead of an error.
    pub fn is_nothing_to_render(&self) -> bool {
        matches!(self, ValidationError::EmptyPath)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in [
            Role::X,
            Role::Y,
            Role::Color,
            Role::Value,
            Role::Labels,
            Role::Values,
            Role::Path,
            Role::Size,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("z".parse::<Role>().is_err());
    }

    #[test]
    fn role_tables_match_chart_kinds() {
        let required = |k: ChartKind| {
            k.roles()
                .iter()
                .filter(|r| r.required)
                .map(|r| r.role)
                .collect::<Vec<_>>()
        };
        assert_eq!(required(ChartKind::Box), vec![Role::Y, Role::X]);
        assert_eq!(required(ChartKind::Treemap), vec![Role::Path, Role::Size]);
        assert!(ChartKind::Heatmap.roles().is_empty());
        let line_x = ChartKind::Line.roles()[0];
        assert!(line_x.accepts.accepts(ColumnKind::Text));
        assert!(line_x.accepts.accepts(ColumnKind::Numeric));
        assert!(!line_x.accepts.accepts(ColumnKind::Temporal));
    }

    #[test]
    fn only_empty_path_means_nothing_to_render() {
        assert!(ValidationError::EmptyPath.is_nothing_to_render());
        assert!(!ValidationError::BinsOutOfRange(3).is_nothing_to_render());
    }
}
