use std::collections::BTreeMap;

use crate::data::model::{CellValue, Dataset};
use crate::data::schema::{find_descriptor, ColumnDescriptor, ColumnKind, ConfigurationError};

use super::spec::{
    ChartSpec, CorrelationMatrix, Encoding, HistogramEncoding, PieEncoding, PieSlice,
    TreemapEncoding, TreemapNode, XyEncoding,
};
use super::stats::{histogram, pearson};
use super::{ChartError, ChartKind, ChartRequest, Role, ValidationError, DEFAULT_BINS, MAX_BINS, MIN_BINS};

/// Label used for null cells in treemap paths.
pub const MISSING_LABEL: &str = "(missing)";

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(ChartSpec),
    /// Some required role is still unbound; render nothing.
    Incomplete { missing: Vec<Role> },
}

impl Resolution {
    pub fn spec(&self) -> Option<&ChartSpec> {
        match self {
            Resolution::Ready(spec) => Some(spec),
            Resolution::Incomplete { .. } => None,
        }
    }
}

/// Resolve a chart request against the (filtered) dataset and its descriptors.
///
/// Bound roles are checked first, so a wrong column is reported even while
/// another required role is still empty. Roles the chart kind does not
/// declare are ignored.
pub fn resolve(
    request: &ChartRequest,
    dataset: &Dataset,
    descriptors: &[ColumnDescriptor],
) -> Result<Resolution, ChartError> {
    let mut bound: BTreeMap<Role, Vec<String>> = BTreeMap::new();
    let mut missing = Vec::new();
    for spec in request.kind.roles() {
        let columns = match request.bindings.get(&spec.role) {
            Some(cols) if !cols.is_empty() => cols,
            Some(_) if spec.role.takes_many() => return Err(ValidationError::EmptyPath.into()),
            _ => {
                if spec.required {
                    missing.push(spec.role);
                }
                continue;
            }
        };
        if !spec.role.takes_many() && columns.len() > 1 {
            return Err(ValidationError::TooManyColumns {
                role: spec.role,
                count: columns.len(),
            }
            .into());
        }
        for column in columns {
            let descriptor = find_descriptor(descriptors, column)
                .ok_or_else(|| ConfigurationError::UnknownColumn(column.clone()))?;
            if !spec.accepts.accepts(descriptor.kind) {
                return Err(ValidationError::IncompatibleKind {
                    role: spec.role,
                    column: column.clone(),
                    expected: spec.accepts.describe(),
                    actual: descriptor.kind,
                }
                .into());
            }
        }
        bound.insert(spec.role, columns.clone());
    }

    let bins = request.bins.unwrap_or(DEFAULT_BINS);
    if request.kind == ChartKind::Histogram && !(MIN_BINS..=MAX_BINS).contains(&bins) {
        return Err(ValidationError::BinsOutOfRange(bins).into());
    }

    if !missing.is_empty() {
        return Ok(Resolution::Incomplete { missing });
    }

    let one = |role: Role| -> String {
        bound
            .get(&role)
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or_default()
    };
    let xy = || XyEncoding {
        x: one(Role::X),
        y: one(Role::Y),
        color: bound.get(&Role::Color).and_then(|c| c.first()).cloned(),
    };

    let encoding = match request.kind {
        ChartKind::Scatter => Encoding::Scatter(xy()),
        ChartKind::Line => Encoding::Line(xy()),
        ChartKind::Area => Encoding::Area(xy()),
        ChartKind::Bar => Encoding::Bar(xy()),
        ChartKind::Box => Encoding::Box(xy()),
        ChartKind::Violin => Encoding::Violin(xy()),
        ChartKind::Histogram => {
            let value = one(Role::Value);
            let values: Vec<f64> = numbers(dataset, &value).flatten().collect();
            Encoding::Histogram(HistogramEncoding {
                bins: histogram(&values, bins),
                value,
            })
        }
        ChartKind::Pie => {
            let (labels, values) = (one(Role::Labels), one(Role::Values));
            Encoding::Pie(PieEncoding {
                slices: pie_slices(dataset, &labels, &values),
                labels,
                values,
            })
        }
        ChartKind::Treemap => {
            let path = bound.get(&Role::Path).cloned().unwrap_or_default();
            let size = one(Role::Size);
            Encoding::Treemap(TreemapEncoding {
                root: treemap(dataset, &path, &size),
                path,
                size,
            })
        }
        // Bindings are ignored; the matrix covers every numeric column.
        ChartKind::Heatmap => return resolve_heatmap(dataset, descriptors).map(Resolution::Ready),
    };

    let data = dataset.select(&encoding.columns());
    log::debug!("resolved {} chart over {} rows", request.kind, data.len());
    Ok(Resolution::Ready(ChartSpec { encoding, data }))
}

fn resolve_heatmap(
    dataset: &Dataset,
    descriptors: &[ColumnDescriptor],
) -> Result<ChartSpec, ChartError> {
    let columns: Vec<String> = descriptors
        .iter()
        .filter(|d| d.kind == ColumnKind::Numeric && dataset.column(&d.name).is_some())
        .map(|d| d.name.clone())
        .collect();
    if columns.len() < 2 {
        return Err(ValidationError::InsufficientNumericColumns {
            found: columns.len(),
        }
        .into());
    }

    let cells: Vec<&[CellValue]> = columns
        .iter()
        .filter_map(|c| dataset.column(c))
        .map(|c| c.values.as_slice())
        .collect();
    let values = (0..cells.len())
        .map(|i| {
            (0..cells.len())
                .map(|j| {
                    let r = pearson(cells[i], cells[j]);
                    if i == j {
                        r.map(|_| 1.0)
                    } else {
                        r
                    }
                })
                .collect()
        })
        .collect();

    let matrix = CorrelationMatrix { columns, values };
    Ok(ChartSpec {
        data: dataset.select(&matrix.columns),
        encoding: Encoding::Heatmap(matrix),
    })
}

/// Numeric view of a column; non-numeric cells are `None`.
fn numbers<'a>(dataset: &'a Dataset, column: &str) -> impl Iterator<Item = Option<f64>> + 'a {
    dataset
        .column(column)
        .into_iter()
        .flat_map(|c| c.values.iter().map(|v| v.as_f64().filter(|f| f.is_finite())))
}

fn pie_slices(dataset: &Dataset, labels: &str, values: &str) -> Vec<PieSlice> {
    let (Some(label_col), Some(_)) = (dataset.column(labels), dataset.column(values)) else {
        return Vec::new();
    };
    let mut slices: Vec<PieSlice> = Vec::new();
    for (label, value) in label_col.values.iter().zip(numbers(dataset, values)) {
        let (false, Some(value)) = (label.is_null(), value) else {
            continue;
        };
        let label = label.to_string();
        match slices.iter_mut().find(|s| s.label == label) {
            Some(slice) => slice.value += value,
            None => slices.push(PieSlice { label, value }),
        }
    }
    slices
}

/// Sum `size` along `path`; nodes keep first-seen order. Rows without a size are skipped.
fn treemap(dataset: &Dataset, path: &[String], size: &str) -> TreemapNode {
    let mut root = TreemapNode {
        label: String::new(),
        value: 0.0,
        children: Vec::new(),
    };
    let levels: Vec<&[CellValue]> = path
        .iter()
        .filter_map(|p| dataset.column(p))
        .map(|c| c.values.as_slice())
        .collect();

    for (row, value) in numbers(dataset, size).enumerate() {
        let Some(value) = value else { continue };
        root.value += value;
        let mut node = &mut root;
        for level in &levels {
            let label = match &level[row] {
                CellValue::Null => MISSING_LABEL.to_string(),
                other => other.to_string(),
            };
            let idx = match node.children.iter().position(|c| c.label == label) {
                Some(idx) => idx,
                None => {
                    node.children.push(TreemapNode {
                        label,
                        value: 0.0,
                        children: Vec::new(),
                    });
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
            node.value += value;
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use crate::data::schema::classify;
    use pretty_assertions::assert_eq;

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|s| CellValue::guess(s)).collect()
    }

    fn sales() -> Dataset {
        Dataset::new(vec![
            Column::new("region", cells(&["north", "north", "south", "south"])),
            Column::new("product", cells(&["a", "b", "a", ""])),
            Column::new("units", cells(&["1", "2", "3", "4"])),
            Column::new("price", cells(&["10", "8", "7", "5"])),
            Column::new("day", cells(&["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"])),
        ])
        .unwrap()
    }

    fn run(request: ChartRequest) -> Result<Resolution, ChartError> {
        let ds = sales();
        resolve(&request, &ds, &classify(&ds))
    }

    fn ready(request: ChartRequest) -> ChartSpec {
        match run(request) {
            Ok(Resolution::Ready(spec)) => spec,
            other => panic!("expected a chart, got {other:?}"),
        }
    }

    #[test]
    fn scatter_with_color() {
        let spec = ready(
            ChartRequest::new(ChartKind::Scatter)
                .bind(Role::X, "units")
                .bind(Role::Y, "price")
                .bind(Role::Color, "region"),
        );
        assert_eq!(spec.kind(), ChartKind::Scatter);
        assert_eq!(
            spec.encoding,
            Encoding::Scatter(XyEncoding {
                x: "units".into(),
                y: "price".into(),
                color: Some("region".into()),
            })
        );
        assert_eq!(
            spec.data.column_names().collect::<Vec<_>>(),
            vec!["units", "price", "region"]
        );
    }

    #[test]
    fn unbound_required_role_is_incomplete() {
        let out = run(ChartRequest::new(ChartKind::Bar).bind(Role::X, "region")).unwrap();
        assert_eq!(out, Resolution::Incomplete { missing: vec![Role::Y] });
    }

    #[test]
    fn incompatible_kind_is_a_validation_error() {
        let err = run(
            ChartRequest::new(ChartKind::Scatter)
                .bind(Role::X, "region")
                .bind(Role::Y, "price"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ChartError::Validation(ValidationError::IncompatibleKind { role: Role::X, .. })
        ));
        let err = run(ChartRequest::new(ChartKind::Line).bind(Role::X, "day")).unwrap_err();
        assert!(matches!(err, ChartError::Validation(_)));
    }

    #[test]
    fn unknown_column_is_a_configuration_error() {
        let err = run(ChartRequest::new(ChartKind::Histogram).bind(Role::Value, "nope")).unwrap_err();
        assert_eq!(
            err,
            ChartError::Configuration(ConfigurationError::UnknownColumn("nope".into()))
        );
    }

    #[test]
    fn line_accepts_categorical_x() {
        let spec = ready(
            ChartRequest::new(ChartKind::Line)
                .bind(Role::X, "region")
                .bind(Role::Y, "units"),
        );
        assert_eq!(spec.kind(), ChartKind::Line);
    }

    #[test]
    fn histogram_bins_are_validated_and_counted() {
        let err = run(
            ChartRequest::new(ChartKind::Histogram)
                .bind(Role::Value, "units")
                .with_bins(4),
        )
        .unwrap_err();
        assert_eq!(err, ChartError::Validation(ValidationError::BinsOutOfRange(4)));

        let spec = ready(ChartRequest::new(ChartKind::Histogram).bind(Role::Value, "units"));
        let Encoding::Histogram(h) = &spec.encoding else {
            panic!("not a histogram");
        };
        assert_eq!(h.bins.counts.len(), DEFAULT_BINS);
        assert_eq!(h.bins.total(), 4);
    }

    #[test]
    fn single_column_roles_reject_lists() {
        let err = run(
            ChartRequest::new(ChartKind::Pie)
                .bind_many(Role::Labels, ["region", "product"])
                .bind(Role::Values, "units"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ChartError::Validation(ValidationError::TooManyColumns {
                role: Role::Labels,
                count: 2
            })
        );
    }

    #[test]
    fn pie_sums_values_per_label() {
        let spec = ready(
            ChartRequest::new(ChartKind::Pie)
                .bind(Role::Labels, "region")
                .bind(Role::Values, "units"),
        );
        let Encoding::Pie(p) = &spec.encoding else {
            panic!("not a pie");
        };
        assert_eq!(
            p.slices,
            vec![
                PieSlice { label: "north".into(), value: 3.0 },
                PieSlice { label: "south".into(), value: 7.0 },
            ]
        );
    }

    #[test]
    fn heatmap_needs_two_numeric_columns() {
        let ds = Dataset::new(vec![
            Column::new("n", cells(&["1", "2"])),
            Column::new("s", cells(&["a", "b"])),
        ])
        .unwrap();
        let err = resolve(&ChartRequest::new(ChartKind::Heatmap), &ds, &classify(&ds)).unwrap_err();
        assert_eq!(
            err,
            ChartError::Validation(ValidationError::InsufficientNumericColumns { found: 1 })
        );
    }

    #[test]
    fn heatmap_ignores_bindings_and_correlates_numeric_columns() {
        let spec = ready(ChartRequest::new(ChartKind::Heatmap).bind(Role::X, "nope"));
        let Encoding::Heatmap(m) = &spec.encoding else {
            panic!("not a heatmap");
        };
        assert_eq!(m.dimension(), 2);
        assert_eq!(m.columns, vec!["units", "price"]);
        assert_eq!(m.get(0, 0), Some(1.0));
        assert!(m.get(0, 1).unwrap() < -0.9);
        assert_eq!(m.get(0, 1), m.get(1, 0));
    }

    #[test]
    fn treemap_empty_path_versus_unbound_path() {
        let err = run(
            ChartRequest::new(ChartKind::Treemap)
                .bind_many(Role::Path, Vec::<String>::new())
                .bind(Role::Size, "units"),
        )
        .unwrap_err();
        let ChartError::Validation(v) = &err else {
            panic!("{err:?}");
        };
        assert!(v.is_nothing_to_render());

        let out = run(ChartRequest::new(ChartKind::Treemap).bind(Role::Size, "units")).unwrap();
        assert_eq!(out, Resolution::Incomplete { missing: vec![Role::Path] });
    }

    #[test]
    fn treemap_hierarchy_depth_matches_path() {
        let spec = ready(
            ChartRequest::new(ChartKind::Treemap)
                .bind_many(Role::Path, ["region", "product"])
                .bind(Role::Size, "units"),
        );
        assert_eq!(spec.hierarchy_depth(), 2);
        let Encoding::Treemap(t) = &spec.encoding else {
            panic!("not a treemap");
        };
        assert_eq!(t.root.depth(), 2);
        assert_eq!(t.root.value, 10.0);
        let south = &t.root.children[1];
        assert_eq!(south.label, "south");
        assert_eq!(south.value, 7.0);
        assert_eq!(south.children[1].label, MISSING_LABEL);
    }

    #[test]
    fn treemap_without_rows_has_no_depth() {
        let ds = sales().take(&[]);
        let request = ChartRequest::new(ChartKind::Treemap)
            .bind_many(Role::Path, ["region", "product"])
            .bind(Role::Size, "units");
        let Ok(Resolution::Ready(spec)) = resolve(&request, &ds, &classify(&sales())) else {
            panic!("expected a chart");
        };
        assert_eq!(spec.hierarchy_depth(), 0);
        let Encoding::Treemap(t) = &spec.encoding else {
            panic!("not a treemap");
        };
        assert_eq!(t.path.len(), 2);
        assert!(t.root.children.is_empty());
    }
}
