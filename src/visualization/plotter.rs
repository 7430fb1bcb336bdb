use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use thiserror::Error;

use crate::comparison::{ComparisonSet, PairComparison};
use crate::config::PresenceThresholds;
use crate::frequency::FrequencyTable;
use crate::phylo::PhyloTree;

use super::tree_layout::{classify_presence, layout_tree, TreeLayout};

#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Plot error: {0}")]
    PlotError(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for VisualizationError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        VisualizationError::PlotError(err.to_string())
    }
}

/// Colour of each comparison set in the scatter plot
pub fn set_color(set: ComparisonSet) -> RGBColor {
    match set {
        ComparisonSet::All => RGBColor(128, 128, 128),
        ComparisonSet::Carrier => RGBColor(0, 0, 255),
        ComparisonSet::NonCarrier => RGBColor(255, 0, 0),
        ComparisonSet::CarrierVsNonCarrier => RGBColor(0, 0, 0),
        ComparisonSet::Partial => RGBColor(255, 165, 0),
    }
}

/// Gene pair shown on an annotated tree: the leaf square follows `reference`,
/// the circle beside it follows `partner`.
pub struct TreeAnnotation<'a> {
    pub reference: &'a str,
    pub partner: &'a str,
    pub thresholds: PresenceThresholds,
}

/// Pixel geometry of tree renderings
#[derive(Debug, Clone, Copy)]
pub struct TreeStyle {
    pub width: u32,
    pub leaf_spacing: u32,
}

impl Default for TreeStyle {
    fn default() -> Self {
        TreeStyle {
            width: 760,
            leaf_spacing: 22,
        }
    }
}

const TREE_MARGIN: i32 = 20;
const LABEL_AREA: i32 = 140;

fn draw_annotated_tree<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    tree: &PhyloTree,
    layout: &TreeLayout,
    table: &FrequencyTable,
    annotation: &TreeAnnotation,
    style: TreeStyle,
) -> Result<(), VisualizationError> {
    root.fill(&WHITE)?;
    let area = root.titled(
        &format!("{}/{}", annotation.reference, annotation.partner),
        ("sans-serif", 15),
    )?;

    let drawable = style.width as i32 - 2 * TREE_MARGIN - LABEL_AREA;
    let scale = if layout.max_depth > 0.0 {
        drawable as f64 / layout.max_depth
    } else {
        0.0
    };
    let spacing = style.leaf_spacing as f64;
    let px = |x: f64| TREE_MARGIN + (x * scale).round() as i32;
    let py = |y: f64| TREE_MARGIN + (y * spacing).round() as i32;

    let branch_style = BLACK.stroke_width(1);
    let label_font = ("sans-serif", 12).into_font().color(&BLACK);
    let support_font = ("sans-serif", 9).into_font().color(&RGBColor(110, 110, 110));

    for id in tree.preorder() {
        let node = tree.node(id);
        let (x, y) = layout.positions[id];

        if let Some(parent) = node.parent {
            let parent_x = layout.positions[parent].0;
            area.draw(&PathElement::new(
                vec![(px(parent_x), py(y)), (px(x), py(y))],
                branch_style,
            ))?;
        }

        if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
            area.draw(&PathElement::new(
                vec![
                    (px(x), py(layout.positions[first].1)),
                    (px(x), py(layout.positions[last].1)),
                ],
                branch_style,
            ))?;
            area.draw(&Circle::new((px(x), py(y)), 3, BLACK.filled()))?;
            if let Some(support) = node.support {
                area.draw(&Text::new(
                    format!("{}", support),
                    (px(x) - 4, py(y) - 12),
                    support_font.clone(),
                ))?;
            }
            continue;
        }

        let name = node.name.as_deref().unwrap_or_default();
        let reference = classify_presence(
            table.frequency(annotation.reference, name),
            &annotation.thresholds,
        );
        let partner = classify_presence(
            table.frequency(annotation.partner, name),
            &annotation.thresholds,
        );

        let (cx, cy) = (px(x), py(y));
        area.draw(&Rectangle::new(
            [(cx - 4, cy - 4), (cx + 5, cy + 5)],
            reference.color().filled(),
        ))?;
        area.draw(&Circle::new((cx + 18, cy), 6, partner.color().filled()))?;
        area.draw(&Text::new(name.to_string(), (cx + 30, cy - 6), label_font.clone()))?;
    }

    root.present()?;
    Ok(())
}

/// `(set, similarity, distance)` of every pair with a defined similarity.
fn scatter_points(comparisons: &[PairComparison]) -> Vec<(ComparisonSet, f64, f64)> {
    comparisons
        .iter()
        .filter_map(|c| c.similarity.map(|s| (c.set, s, c.distance)))
        .collect()
}

fn draw_comparison_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    comparisons: &[PairComparison],
) -> Result<(), VisualizationError> {
    root.fill(&WHITE)?;

    let points = scatter_points(comparisons);

    let (mut x_min, mut x_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });
    if !x_min.is_finite() {
        (x_min, x_max) = (0.0, 1.0);
    }
    let x_pad = ((x_max - x_min) * 0.05).max(0.01);
    let y_max = points.iter().map(|p| p.2).fold(0.0, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min - x_pad)..(x_max + x_pad), 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Functional similarity")
        .y_desc("Evolutionary Distance")
        .draw()?;

    for set in ComparisonSet::all_sets() {
        let color = set_color(set);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.0 == set)
                    .map(|p| Circle::new((p.1, p.2), 3, color.filled())),
            )?
            .label(set.as_str())
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Writes figures into an output directory.
pub struct Visualizer {
    output_dir: PathBuf,
    export_png: bool,
}

impl Visualizer {
    /// Create a new visualizer
    pub fn new(output_dir: impl AsRef<Path>, export_png: bool) -> Result<Self, VisualizationError> {
        let output_path = output_dir.as_ref().to_path_buf();
        if !output_path.exists() {
            fs::create_dir_all(&output_path)?;
        }
        Ok(Visualizer {
            output_dir: output_path,
            export_png,
        })
    }

    /// Renders the tree with leaves annotated by two genes' lineage frequencies.
    ///
    /// Written to `<reference>_<partner>.svg` (lowercase), plus a PNG copy when enabled.
    pub fn render_annotated_tree(
        &self,
        tree: &PhyloTree,
        table: &FrequencyTable,
        annotation: &TreeAnnotation,
        style: TreeStyle,
    ) -> Result<Vec<PathBuf>, VisualizationError> {
        for leaf in tree.leaf_names() {
            if !table.lineage_map.contains_key(&leaf) {
                warn!("Tree leaf '{}' has no lineage frequencies; drawn grey", leaf);
            }
        }

        let stem = format!(
            "{}_{}",
            annotation.reference.to_lowercase(),
            annotation.partner.to_lowercase()
        );
        let layout = layout_tree(tree);
        let leaves = layout.leaf_count.max(1) as u32;
        let height = 2 * TREE_MARGIN as u32 + 30 + leaves * style.leaf_spacing;
        let size = (style.width, height);

        let mut outputs = Vec::new();
        let svg_path = self.output_dir.join(format!("{}.svg", stem));
        {
            let root = SVGBackend::new(&svg_path, size).into_drawing_area();
            draw_annotated_tree(&root, tree, &layout, table, annotation, style)?;
        }
        outputs.push(svg_path);

        if self.export_png {
            let png_path = self.output_dir.join(format!("{}.png", stem));
            {
                let root = BitMapBackend::new(&png_path, size).into_drawing_area();
                draw_annotated_tree(&root, tree, &layout, table, annotation, style)?;
            }
            outputs.push(png_path);
        }

        info!("Rendered {}/{} tree: {:?}", annotation.reference, annotation.partner, outputs);
        Ok(outputs)
    }

    /// Scatter plot of functional similarity against evolutionary distance,
    /// coloured by comparison set.
    pub fn render_comparison_scatter(
        &self,
        comparisons: &[PairComparison],
        size: u32,
    ) -> Result<Vec<PathBuf>, VisualizationError> {
        let mut outputs = Vec::new();
        let svg_path = self.output_dir.join("similarity_vs_distance.svg");
        {
            let root = SVGBackend::new(&svg_path, (size, size)).into_drawing_area();
            draw_comparison_scatter(&root, comparisons)?;
        }
        outputs.push(svg_path);

        if self.export_png {
            let png_path = self.output_dir.join("similarity_vs_distance.png");
            {
                let root = BitMapBackend::new(&png_path, (size, size)).into_drawing_area();
                draw_comparison_scatter(&root, comparisons)?;
            }
            outputs.push(png_path);
        }

        info!("Rendered comparison scatter plot: {:?}", outputs);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phylo::newick::parse_newick;
    use ndarray::array;
    use tempfile::tempdir;

    fn lineage_table() -> FrequencyTable {
        FrequencyTable::from_parts(
            array![[1.0, 0.5, 0.0], [1.0, 0.0, 0.02]],
            vec!["lsrB".to_string(), "frlA".to_string()],
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
            vec![2, 2, 1],
        )
    }

    fn annotation() -> TreeAnnotation<'static> {
        TreeAnnotation {
            reference: "lsrB",
            partner: "frlA",
            thresholds: PresenceThresholds::default(),
        }
    }

    fn comparison(set: ComparisonSet, similarity: Option<f64>, distance: f64) -> PairComparison {
        PairComparison {
            set,
            lineage_a: "1".to_string(),
            lineage_b: "2".to_string(),
            similarity,
            distance,
        }
    }

    #[test]
    fn test_visualizer_creates_output_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("figures").join("trees");
        Visualizer::new(&nested, false).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_render_annotated_tree_svg_only() {
        let dir = tempdir().unwrap();
        let tree = parse_newick("((1:1,2:1)0.8:1,3:1);").unwrap();
        let visualizer = Visualizer::new(dir.path(), false).unwrap();

        let outputs = visualizer
            .render_annotated_tree(&tree, &lineage_table(), &annotation(), TreeStyle::default())
            .unwrap();

        let svg_path = dir.path().join("lsrb_frla.svg");
        assert_eq!(outputs, vec![svg_path.clone()]);
        let svg = fs::read_to_string(&svg_path).unwrap();
        assert!(svg.contains("lsrB/frlA"));
        assert!(!dir.path().join("lsrb_frla.png").exists());
    }

    #[test]
    fn test_render_annotated_tree_with_png() {
        let dir = tempdir().unwrap();
        // leaf 4 has no frequencies and is drawn as missing
        let tree = parse_newick("((1:1,2:1):1,(3:1,4:1):1);").unwrap();
        let visualizer = Visualizer::new(dir.path(), true).unwrap();

        let outputs = visualizer
            .render_annotated_tree(&tree, &lineage_table(), &annotation(), TreeStyle::default())
            .unwrap();

        assert_eq!(
            outputs,
            vec![dir.path().join("lsrb_frla.svg"), dir.path().join("lsrb_frla.png")]
        );
        assert!(outputs.iter().all(|p| p.is_file()));
    }

    #[test]
    fn test_scatter_points_skip_undefined_similarity() {
        let comparisons = vec![
            comparison(ComparisonSet::Carrier, Some(0.8), 1.0),
            comparison(ComparisonSet::NonCarrier, None, 2.0),
            comparison(ComparisonSet::All, Some(0.4), 3.0),
        ];
        assert_eq!(
            scatter_points(&comparisons),
            vec![
                (ComparisonSet::Carrier, 0.8, 1.0),
                (ComparisonSet::All, 0.4, 3.0)
            ]
        );
    }

    #[test]
    fn test_render_scatter_ignores_undefined_similarity() {
        let defined = vec![comparison(ComparisonSet::Carrier, Some(0.8), 1.0)];
        let mut with_undefined = defined.clone();
        with_undefined.push(comparison(ComparisonSet::Carrier, None, 5.0));

        let render = |comparisons: &[PairComparison], png: bool| {
            let dir = tempdir().unwrap();
            let visualizer = Visualizer::new(dir.path(), png).unwrap();
            let outputs = visualizer.render_comparison_scatter(comparisons, 400).unwrap();
            let svg = fs::read_to_string(&outputs[0]).unwrap();
            (outputs.len(), svg)
        };

        let (count, expected) = render(&defined, false);
        assert_eq!(count, 1);
        let (count, actual) = render(&with_undefined, true);
        assert_eq!(count, 2);
        assert!(expected.contains("<circle"));
        assert_eq!(
            actual.matches("<circle").count(),
            expected.matches("<circle").count()
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_set_colors_are_distinct() {
        let colors: Vec<(u8, u8, u8)> = ComparisonSet::all_sets()
            .iter()
            .map(|&s| {
                let c = set_color(s);
                (c.0, c.1, c.2)
            })
            .collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
