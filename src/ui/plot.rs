use std::collections::HashMap;
use std::ops::RangeInclusive;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Line, Plot, PlotPoints, PlotUi,
    Points, Polygon,
};

use rusty_lens::chart::resolve::MISSING_LABEL;
use rusty_lens::chart::spec::{
    CorrelationMatrix, HistogramEncoding, PieEncoding, TreemapEncoding, TreemapNode, XyEncoding,
};
use rusty_lens::chart::stats::{kernel_density, quartiles, whiskers};
use rusty_lens::chart::{ChartKind, ChartSpec, Encoding};
use rusty_lens::color::{contrasting_text, diverging, generate_palette, ColorMap};
use rusty_lens::data::model::{CellValue, Dataset};
use rusty_lens::state::{ChartOutcome, ChartSize};

// ---------------------------------------------------------------------------
// Chart area (central panel)
// ---------------------------------------------------------------------------

/// Draw whatever the last evaluation produced for the chart.
pub fn chart_area(ui: &mut Ui, outcome: &ChartOutcome, title: &str, size: ChartSize) {
    match outcome {
        ChartOutcome::Ready(spec) => {
            ui.heading(title);
            chart(ui, spec, size);
        }
        ChartOutcome::Incomplete(missing) => {
            let roles: Vec<&str> = missing.iter().map(|r| r.as_str()).collect();
            ui.label(format!("Choose a column for: {}", roles.join(", ")));
        }
        ChartOutcome::NothingToRender(hint) => {
            ui.label(hint);
        }
        ChartOutcome::Failed(e) => {
            ui.colored_label(Color32::RED, format!("Cannot draw chart: {e}"));
        }
    }
}

/// Render a resolved chart at the requested size.
pub fn chart(ui: &mut Ui, spec: &ChartSpec, size: ChartSize) {
    let (width, height) = size.dimensions();
    let data = &spec.data;
    match &spec.encoding {
        Encoding::Scatter(e) => xy_plot(ui, spec, (width, height), e, |p, _| scatter(p, data, e)),
        Encoding::Line(e) => xy_plot(ui, spec, (width, height), e, |p, axis| lines(p, data, e, axis, false)),
        Encoding::Area(e) => xy_plot(ui, spec, (width, height), e, |p, axis| lines(p, data, e, axis, true)),
        Encoding::Bar(e) => xy_plot(ui, spec, (width, height), e, |p, axis| bars(p, data, e, axis)),
        Encoding::Box(e) => xy_plot(ui, spec, (width, height), e, |p, axis| boxes(p, data, e, axis)),
        Encoding::Violin(e) => xy_plot(ui, spec, (width, height), e, |p, axis| violins(p, data, e, axis)),
        Encoding::Histogram(h) => histogram(ui, width, height, h),
        Encoding::Pie(p) => pie(ui, width, height, p),
        Encoding::Heatmap(m) => heatmap(ui, width, height, m),
        Encoding::Treemap(t) => treemap(ui, width, height, t),
    }
}

fn xy_plot(
    ui: &mut Ui,
    spec: &ChartSpec,
    (width, height): (f32, f32),
    e: &XyEncoding,
    draw: impl FnOnce(&mut PlotUi, Option<&CategoryAxis>),
) {
    let axis = x_axis(spec.kind(), &spec.data, e);
    let mut plot = Plot::new(spec.kind().to_string())
        .width(width)
        .height(height)
        .legend(Legend::default())
        .x_axis_label(e.x.clone())
        .y_axis_label(e.y.clone());
    if let Some(axis) = axis.clone() {
        plot = plot.x_axis_formatter(axis.formatter());
    }
    plot.show(ui, |plot_ui| draw(plot_ui, axis.as_ref()));
}

// ---------------------------------------------------------------------------
// Grouping helpers
// ---------------------------------------------------------------------------

/// Distinct labels of a column in first-seen order; nulls become
/// [`MISSING_LABEL`].
#[derive(Debug, Clone, Default)]
pub struct CategoryAxis {
    pub labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl CategoryAxis {
    pub fn from_values(values: &[CellValue]) -> Self {
        let mut axis = Self::default();
        for v in values {
            let label = label_of(v);
            if !axis.index.contains_key(&label) {
                axis.index.insert(label.clone(), axis.labels.len());
                axis.labels.push(label);
            }
        }
        axis
    }

    pub fn position(&self, value: &CellValue) -> Option<f64> {
        self.index.get(&label_of(value)).map(|&i| i as f64)
    }

    fn formatter(self) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String + 'static {
        move |mark: GridMark, _range: &RangeInclusive<f64>| {
            let rounded = mark.value.round();
            if (mark.value - rounded).abs() > 1e-6 || rounded < 0.0 {
                return String::new();
            }
            self.labels.get(rounded as usize).cloned().unwrap_or_default()
        }
    }
}

fn label_of(v: &CellValue) -> String {
    match v {
        CellValue::Null => MISSING_LABEL.to_string(),
        other => other.to_string(),
    }
}

/// Rows split by the color column: `(label, rows, colour)`. Without a
/// color binding a single unnamed group covers every row.
fn color_groups(data: &Dataset, color: Option<&str>) -> Vec<(Option<String>, Vec<usize>, Color32)> {
    let Some(col) = color.and_then(|c| data.column(c)) else {
        return vec![(None, (0..data.len()).collect(), Color32::LIGHT_BLUE)];
    };
    let map = ColorMap::new(&col.name, &col.unique_values());
    let mut groups: Vec<(Option<String>, Vec<usize>, Color32)> = Vec::new();
    for (row, v) in col.values.iter().enumerate() {
        let label = label_of(v);
        match groups.iter_mut().find(|g| g.0.as_deref() == Some(label.as_str())) {
            Some(g) => g.1.push(row),
            None => groups.push((Some(label), vec![row], map.color_for(v))),
        }
    }
    groups
}

fn values(data: &Dataset, column: &str) -> Vec<CellValue> {
    data.column(column).map(|c| c.values.clone()).unwrap_or_default()
}

fn number(v: &CellValue) -> Option<f64> {
    v.as_f64().filter(|f| f.is_finite())
}

/// x position of a cell: its number, or its category index when `axis` is set.
fn x_of(v: &CellValue, axis: Option<&CategoryAxis>) -> Option<f64> {
    match axis {
        Some(axis) => axis.position(v),
        None => number(v),
    }
}

/// Bar, box and violin always place x by category; line and area only when
/// x holds non-numeric values. Scatter x is always numeric.
pub fn x_axis(kind: ChartKind, data: &Dataset, e: &XyEncoding) -> Option<CategoryAxis> {
    let xs = values(data, &e.x);
    let categorical = match kind {
        ChartKind::Bar | ChartKind::Box | ChartKind::Violin => true,
        ChartKind::Line | ChartKind::Area => xs.iter().any(|v| !v.is_null() && number(v).is_none()),
        _ => false,
    };
    categorical.then(|| CategoryAxis::from_values(&xs))
}

// ---------------------------------------------------------------------------
// Cartesian kinds
// ---------------------------------------------------------------------------

fn scatter(plot_ui: &mut PlotUi, data: &Dataset, e: &XyEncoding) {
    let (xs, ys) = (values(data, &e.x), values(data, &e.y));
    for (label, rows, color) in color_groups(data, e.color.as_deref()) {
        let pts: PlotPoints = rows
            .iter()
            .filter_map(|&r| Some([number(&xs[r])?, number(&ys[r])?]))
            .collect();
        let mut points = Points::new(pts).color(color).radius(3.0);
        if let Some(label) = label {
            points = points.name(label);
        }
        plot_ui.points(points);
    }
}

fn lines(plot_ui: &mut PlotUi, data: &Dataset, e: &XyEncoding, axis: Option<&CategoryAxis>, area: bool) {
    let (xs, ys) = (values(data, &e.x), values(data, &e.y));
    for (label, rows, color) in color_groups(data, e.color.as_deref()) {
        let mut pts: Vec<[f64; 2]> = rows
            .iter()
            .filter_map(|&r| Some([x_of(&xs[r], axis)?, number(&ys[r])?]))
            .collect();
        pts.sort_by(|a, b| a[0].total_cmp(&b[0]));
        let mut line = Line::new(PlotPoints::new(pts)).color(color).width(1.5);
        if area {
            line = line.fill(0.0);
        }
        if let Some(label) = label {
            line = line.name(label);
        }
        plot_ui.line(line);
    }
}

/// Bars summed per category; colour groups stack.
fn bars(plot_ui: &mut PlotUi, data: &Dataset, e: &XyEncoding, axis: Option<&CategoryAxis>) {
    let Some(axis) = axis else {
        return;
    };
    let (xs, ys) = (values(data, &e.x), values(data, &e.y));
    let mut charts: Vec<BarChart> = Vec::new();
    for (label, rows, color) in color_groups(data, e.color.as_deref()) {
        let mut sums = vec![0.0; axis.labels.len()];
        for &r in &rows {
            if let (Some(x), Some(y)) = (axis.position(&xs[r]), number(&ys[r])) {
                sums[x as usize] += y;
            }
        }
        let bars: Vec<Bar> = sums
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| Bar::new(i as f64, *v).width(0.7))
            .collect();
        let mut chart = BarChart::new(bars).color(color);
        if let Some(label) = label {
            chart = chart.name(label);
        }
        let below: Vec<&BarChart> = charts.iter().collect();
        chart = chart.stack_on(&below);
        charts.push(chart);
    }
    for chart in charts {
        plot_ui.bar_chart(chart);
    }
}

/// Numeric y values per (category, colour group); colour groups sit side by
/// side within a category.
fn distributions(
    data: &Dataset,
    e: &XyEncoding,
    axis: &CategoryAxis,
) -> Vec<(Option<String>, Color32, Vec<(f64, Vec<f64>)>, f64)> {
    let (xs, ys) = (values(data, &e.x), values(data, &e.y));
    let groups = color_groups(data, e.color.as_deref());
    let n = groups.len().max(1) as f64;
    let width = 0.8 / n;
    groups
        .into_iter()
        .enumerate()
        .map(|(g, (label, rows, color))| {
            let offset = -0.4 + width * (g as f64 + 0.5);
            let mut per_category: Vec<(f64, Vec<f64>)> = Vec::new();
            for &r in &rows {
                let (Some(x), Some(y)) = (axis.position(&xs[r]), number(&ys[r])) else {
                    continue;
                };
                let x = x + offset;
                match per_category.iter_mut().find(|(px, _)| *px == x) {
                    Some((_, ys)) => ys.push(y),
                    None => per_category.push((x, vec![y])),
                }
            }
            (label, color, per_category, width)
        })
        .collect()
}

fn boxes(plot_ui: &mut PlotUi, data: &Dataset, e: &XyEncoding, axis: Option<&CategoryAxis>) {
    let Some(axis) = axis else {
        return;
    };
    for (label, color, per_category, width) in distributions(data, e, axis) {
        let elems: Vec<BoxElem> = per_category
            .iter()
            .filter_map(|(x, ys)| {
                let (q1, median, q3) = quartiles(ys)?;
                let (lo, hi) = whiskers(ys, q1, q3);
                Some(
                    BoxElem::new(*x, BoxSpread::new(lo, q1, median, q3, hi))
                        .box_width(width * 0.8)
                        .fill(color.linear_multiply(0.3))
                        .stroke(Stroke::new(1.5, color)),
                )
            })
            .collect();
        let mut plot = BoxPlot::new(elems).color(color);
        if let Some(label) = label {
            plot = plot.name(label);
        }
        plot_ui.box_plot(plot);
    }
}

fn violins(plot_ui: &mut PlotUi, data: &Dataset, e: &XyEncoding, axis: Option<&CategoryAxis>) {
    let Some(axis) = axis else {
        return;
    };
    for (label, color, per_category, width) in distributions(data, e, axis) {
        for (i, (x, ys)) in per_category.iter().enumerate() {
            let kde = kernel_density(ys, 64);
            let peak = kde.iter().map(|(_, d)| *d).fold(0.0, f64::max);
            if peak <= 0.0 {
                continue;
            }
            let half = width * 0.45;
            let outline: Vec<[f64; 2]> = kde
                .iter()
                .map(|(y, d)| [x - d / peak * half, *y])
                .chain(kde.iter().rev().map(|(y, d)| [x + d / peak * half, *y]))
                .collect();
            let mut line = Line::new(PlotPoints::new(outline)).color(color).width(1.5);
            // One legend entry per colour group.
            if let (0, Some(label)) = (i, &label) {
                line = line.name(label);
            }
            plot_ui.line(line);
            if let Some((q1, median, q3)) = quartiles(ys) {
                let inner = half * 0.15;
                plot_ui.polygon(
                    Polygon::new(PlotPoints::new(vec![
                        [x - inner, q1],
                        [x + inner, q1],
                        [x + inner, q3],
                        [x - inner, q3],
                    ]))
                    .fill_color(color.linear_multiply(0.5))
                    .stroke(Stroke::new(1.0, color)),
                );
                plot_ui.line(
                    Line::new(PlotPoints::new(vec![[x - half * 0.5, median], [x + half * 0.5, median]]))
                        .color(color)
                        .width(2.5),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

fn histogram(ui: &mut Ui, width: f32, height: f32, h: &HistogramEncoding) {
    let bars: Vec<Bar> = h
        .bins
        .counts
        .iter()
        .zip(h.bins.edges.windows(2))
        .map(|(&count, edge)| {
            Bar::new((edge[0] + edge[1]) / 2.0, count as f64).width(edge[1] - edge[0])
        })
        .collect();
    Plot::new("histogram")
        .width(width)
        .height(height)
        .x_axis_label(h.value.clone())
        .y_axis_label("count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_BLUE).name(&h.value));
        });
}

// ---------------------------------------------------------------------------
// Painter-based kinds
// ---------------------------------------------------------------------------

fn canvas(ui: &mut Ui, width: f32, height: f32) -> (Rect, egui::Painter) {
    let (response, painter) = ui.allocate_painter(egui::vec2(width, height), Sense::hover());
    (response.rect, painter)
}

fn pie(ui: &mut Ui, width: f32, height: f32, p: &PieEncoding) {
    let (rect, painter) = canvas(ui, width, height);
    let text_color = ui.visuals().text_color();
    let total: f64 = p.slices.iter().map(|s| s.value.max(0.0)).sum();
    if total <= 0.0 {
        painter.text(rect.center(), Align2::CENTER_CENTER, "no positive values", FontId::proportional(14.0), text_color);
        return;
    }

    let pie_rect = Rect::from_min_size(rect.min, egui::vec2(rect.width() * 0.7, rect.height()));
    let center = pie_rect.center();
    let radius = pie_rect.width().min(pie_rect.height()) * 0.45;
    let colors = generate_palette(p.slices.len());

    let mut start = -std::f32::consts::FRAC_PI_2;
    for (slice, color) in p.slices.iter().zip(&colors) {
        let sweep = (slice.value.max(0.0) / total) as f32 * std::f32::consts::TAU;
        for poly in wedge(center, radius, start, sweep) {
            painter.add(Shape::convex_polygon(poly, *color, Stroke::NONE));
        }
        start += sweep;
    }

    // Legend
    let mut y = rect.top() + 10.0;
    let x = pie_rect.right() + 10.0;
    for (slice, color) in p.slices.iter().zip(&colors) {
        painter.rect_filled(Rect::from_min_size(Pos2::new(x, y), egui::vec2(12.0, 12.0)), 0.0, *color);
        let share = slice.value.max(0.0) / total * 100.0;
        painter.text(
            Pos2::new(x + 18.0, y + 6.0),
            Align2::LEFT_CENTER,
            format!("{} ({share:.1}%)", slice.label),
            FontId::proportional(12.0),
            text_color,
        );
        y += 18.0;
    }
}

/// A circular sector as convex polygons of at most a quarter turn each.
pub fn wedge(center: Pos2, radius: f32, start: f32, sweep: f32) -> Vec<Vec<Pos2>> {
    const MAX_PIECE: f32 = std::f32::consts::FRAC_PI_2;
    const STEPS_PER_PIECE: usize = 16;
    let pieces = (sweep / MAX_PIECE).ceil().max(1.0) as usize;
    let piece = sweep / pieces as f32;
    (0..pieces)
        .map(|i| {
            let a0 = start + piece * i as f32;
            std::iter::once(center)
                .chain((0..=STEPS_PER_PIECE).map(|s| {
                    let a = a0 + piece * s as f32 / STEPS_PER_PIECE as f32;
                    center + radius * egui::vec2(a.cos(), a.sin())
                }))
                .collect()
        })
        .collect()
}

fn heatmap(ui: &mut Ui, width: f32, height: f32, m: &CorrelationMatrix) {
    let (rect, painter) = canvas(ui, width, height);
    let text_color = ui.visuals().text_color();
    let n = m.dimension();
    if n == 0 {
        return;
    }
    let margin = egui::vec2(rect.width() * 0.2, rect.height() * 0.12);
    let cell = egui::vec2(
        (rect.width() - margin.x) / n as f32,
        (rect.height() - margin.y) / n as f32,
    );
    let origin = rect.min + margin;

    for (i, name) in m.columns.iter().enumerate() {
        let font = FontId::proportional(11.0);
        painter.text(
            Pos2::new(origin.x - 4.0, origin.y + cell.y * (i as f32 + 0.5)),
            Align2::RIGHT_CENTER,
            name,
            font.clone(),
            text_color,
        );
        painter.text(
            Pos2::new(origin.x + cell.x * (i as f32 + 0.5), origin.y - 4.0),
            Align2::CENTER_BOTTOM,
            name,
            font,
            text_color,
        );
    }

    for row in 0..n {
        for col in 0..n {
            let value = m.get(row, col);
            let fill = diverging(value);
            let min = origin + egui::vec2(cell.x * col as f32, cell.y * row as f32);
            let r = Rect::from_min_size(min, cell).shrink(1.0);
            painter.rect_filled(r, 0.0, fill);
            let label = value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
            painter.text(r.center(), Align2::CENTER_CENTER, label, FontId::proportional(11.0), contrasting_text(fill));
        }
    }
}

fn treemap(ui: &mut Ui, width: f32, height: f32, t: &TreemapEncoding) {
    let (rect, painter) = canvas(ui, width, height);
    let top_colors = generate_palette(t.root.children.len());
    for tile in treemap_layout(&t.root, rect) {
        let base = top_colors.get(tile.branch).copied().unwrap_or(Color32::GRAY);
        // Deeper levels get lighter.
        let fill = base.linear_multiply(1.0 - 0.2 * (tile.depth.saturating_sub(1)) as f32);
        painter.rect_filled(tile.rect.shrink(1.0), 0.0, fill);
        if tile.is_leaf && tile.rect.width() > 30.0 && tile.rect.height() > 14.0 {
            painter.text(
                tile.rect.center(),
                Align2::CENTER_CENTER,
                &tile.label,
                FontId::proportional(11.0),
                contrasting_text(fill),
            );
        }
    }
}

/// A placed treemap node.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub label: String,
    pub rect: Rect,
    pub depth: usize,
    /// Index of the top-level ancestor; selects the colour.
    pub branch: usize,
    pub is_leaf: bool,
}

/// Slice-and-dice layout: children split their parent's rectangle in
/// proportion to value, alternating horizontal and vertical cuts by depth.
/// Non-positive values get no area.
pub fn treemap_layout(root: &TreemapNode, rect: Rect) -> Vec<Tile> {
    let mut tiles = Vec::new();
    place(root, rect, 0, 0, &mut tiles);
    tiles
}

fn place(node: &TreemapNode, rect: Rect, depth: usize, branch: usize, out: &mut Vec<Tile>) {
    let total: f64 = node.children.iter().map(|c| c.value.max(0.0)).sum();
    if total <= 0.0 {
        return;
    }
    let horizontal = depth % 2 == 0;
    let mut offset = 0.0f32;
    for (i, child) in node.children.iter().enumerate() {
        let share = (child.value.max(0.0) / total) as f32;
        if share <= 0.0 {
            continue;
        }
        let child_rect = if horizontal {
            let w = rect.width() * share;
            Rect::from_min_size(rect.min + egui::vec2(offset, 0.0), egui::vec2(w, rect.height()))
        } else {
            let h = rect.height() * share;
            Rect::from_min_size(rect.min + egui::vec2(0.0, offset), egui::vec2(rect.width(), h))
        };
        offset += if horizontal { child_rect.width() } else { child_rect.height() };
        let branch = if depth == 0 { i } else { branch };
        out.push(Tile {
            label: child.label.clone(),
            rect: child_rect,
            depth: depth + 1,
            branch,
            is_leaf: child.children.is_empty(),
        });
        place(child, child_rect, depth + 1, branch, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(label: &str, value: f64, children: Vec<TreemapNode>) -> TreemapNode {
        TreemapNode {
            label: label.into(),
            value,
            children,
        }
    }

    #[test]
    fn category_axis_keeps_first_seen_order() {
        let axis = CategoryAxis::from_values(&[
            CellValue::Text("b".into()),
            CellValue::Null,
            CellValue::Text("a".into()),
            CellValue::Text("b".into()),
        ]);
        assert_eq!(axis.labels, vec!["b", MISSING_LABEL, "a"]);
        assert_eq!(axis.position(&CellValue::Text("a".into())), Some(2.0));
    }

    #[test]
    fn treemap_tiles_split_area_by_value() {
        let root = node(
            "",
            4.0,
            vec![
                node("east", 3.0, vec![node("x", 1.0, vec![]), node("y", 2.0, vec![])]),
                node("west", 1.0, vec![]),
            ],
        );
        let rect = Rect::from_min_size(Pos2::ZERO, egui::vec2(400.0, 100.0));
        let tiles = treemap_layout(&root, rect);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].rect.width(), 300.0);
        // "y" gets two thirds of east's height.
        let y = tiles.iter().find(|t| t.label == "y").unwrap();
        assert!((y.rect.height() - 200.0 / 3.0).abs() < 1e-3);
        assert_eq!(y.branch, 0);
        assert!(y.is_leaf);
        assert_eq!(tiles.iter().find(|t| t.label == "west").unwrap().branch, 1);
    }

    #[test]
    fn wedge_splits_large_sweeps() {
        let polys = wedge(Pos2::ZERO, 10.0, 0.0, std::f32::consts::PI * 1.5);
        assert_eq!(polys.len(), 3);
        assert!(polys.iter().all(|p| p[0] == Pos2::ZERO));
        assert_eq!(wedge(Pos2::ZERO, 10.0, 0.0, 0.1).len(), 1);
    }
}
