use crate::data::model::Dataset;

use super::stats::HistogramBins;
use super::ChartKind;

// ---------------------------------------------------------------------------
// ChartSpec – a resolved, renderable chart
// ---------------------------------------------------------------------------

/// A validated chart: the encoding with concrete column references and any
/// derived data, plus the filtered dataset projected onto the referenced
/// columns. Every referenced column exists in `data` and satisfies its
/// role's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub encoding: Encoding,
    pub data: Dataset,
}

impl ChartSpec {
    pub fn kind(&self) -> ChartKind {
        self.encoding.kind()
    }

    /// Levels in the built treemap; 0 for other kinds, or when no row with a
    /// size value survived filtering.
    pub fn hierarchy_depth(&self) -> usize {
        match &self.encoding {
            Encoding::Treemap(t) => t.root.depth(),
            _ => 0,
        }
    }
}

/// x / y / optional color, shared by the cartesian kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct XyEncoding {
    pub x: String,
    pub y: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramEncoding {
    pub value: String,
    pub bins: HistogramBins,
}

/// Values summed per label, in first-seen label order.
#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieEncoding {
    pub labels: String,
    pub values: String,
    pub slices: Vec<PieSlice>,
}

/// Pairwise Pearson coefficients of the numeric columns. `None` where the
/// coefficient is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn dimension(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        *self.values.get(row)?.get(col)?
    }
}

/// One node of an aggregated treemap hierarchy; `value` is the summed size
/// of every row below it.
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapNode {
    pub label: String,
    pub value: f64,
    pub children: Vec<TreemapNode>,
}

impl TreemapNode {
    /// Levels below this node: 0 for a leaf.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreemapEncoding {
    pub path: Vec<String>,
    pub size: String,
    pub root: TreemapNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Encoding {
    Scatter(XyEncoding),
    Line(XyEncoding),
    Area(XyEncoding),
    Bar(XyEncoding),
    Box(XyEncoding),
    Violin(XyEncoding),
    Histogram(HistogramEncoding),
    Pie(PieEncoding),
    Heatmap(CorrelationMatrix),
    Treemap(TreemapEncoding),
}

impl Encoding {
    pub fn kind(&self) -> ChartKind {
        match self {
            Encoding::Scatter(_) => ChartKind::Scatter,
            Encoding::Line(_) => ChartKind::Line,
            Encoding::Area(_) => ChartKind::Area,
            Encoding::Bar(_) => ChartKind::Bar,
            Encoding::Box(_) => ChartKind::Box,
            Encoding::Violin(_) => ChartKind::Violin,
            Encoding::Histogram(_) => ChartKind::Histogram,
            Encoding::Pie(_) => ChartKind::Pie,
            Encoding::Heatmap(_) => ChartKind::Heatmap,
            Encoding::Treemap(_) => ChartKind::Treemap,
        }
    }

    /// Every column the encoding references, without repeats.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut add = |c: &String| {
            if !out.contains(c) {
                out.push(c.clone());
            }
        };
        match self {
            Encoding::Scatter(e)
            | Encoding::Line(e)
            | Encoding::Area(e)
            | Encoding::Bar(e)
            | Encoding::Box(e)
            | Encoding::Violin(e) => {
                add(&e.x);
                add(&e.y);
                if let Some(c) = &e.color {
                    add(c);
                }
            }
            Encoding::Histogram(h) => add(&h.value),
            Encoding::Pie(p) => {
                add(&p.labels);
                add(&p.values);
            }
            Encoding::Heatmap(m) => m.columns.iter().for_each(&mut add),
            Encoding::Treemap(t) => {
                t.path.iter().for_each(&mut add);
                add(&t.size);
            }
        }
        out
    }
}
