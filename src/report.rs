use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::batch::BatchSummary;
use crate::models::{Outcome, PredictionResult};
use crate::tree::{NodeDescriptor, NodeRole, PathStep, Side, TreeDescription};

pub fn render_outcome(result: &PredictionResult) -> String {
    format!(
        "{} ({}, {}, confidence {:.2})",
        result.outcome.headline(),
        result.label,
        result.color,
        result.confidence
    )
}

pub fn render_path(description: &TreeDescription<'_>, path: &[PathStep]) -> String {
    let model = description.model();
    let mut output = String::new();

    for step in path {
        let op = match step.side {
            Side::Left => "<=",
            Side::Right => ">",
        };
        let _ = writeln!(
            output,
            "- node {}: {} = {} {} {}",
            step.node,
            model.feature_name(step.feature),
            format_number(step.value),
            op,
            format_number(step.threshold)
        );
    }

    output
}

/// Indented text diagram of the tree, one node per line.
pub fn render_tree_text(description: &TreeDescription<'_>) -> String {
    let mut output = String::new();

    for node in description {
        let indent = "|   ".repeat(node.depth);
        let branch = match node.side {
            Some(Side::Left) => "T: ",
            Some(Side::Right) => "F: ",
            None => "",
        };
        let rule = match node.role {
            NodeRole::Split {
                feature_name,
                threshold,
                ..
            } => format!("{feature_name} <= {}", format_number(threshold)),
            NodeRole::Leaf { class_name, .. } => format!("leaf: {class_name}"),
        };
        let _ = writeln!(
            output,
            "{indent}{branch}{rule} | samples = {} | value = {} | class = {}",
            format_number(node.samples),
            format_counts(node.distribution),
            description.model().class_name(node.majority)
        );
    }

    output
}

/// Graphviz rendering; leaves are filled with their outcome color.
pub fn render_tree_dot(description: &TreeDescription<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "digraph Tree {{");
    let _ = writeln!(
        output,
        "node [shape=box, style=\"filled, rounded\", fontname=\"helvetica\"] ;"
    );
    let _ = writeln!(output, "edge [fontname=\"helvetica\"] ;");

    for node in description {
        let _ = writeln!(
            output,
            "{} [label=\"{}\", fillcolor=\"{}\"] ;",
            node.id,
            dot_label(description, &node),
            fill_color(&node)
        );
        if let Some(parent) = node.parent {
            let edge_label = match node.side {
                Some(Side::Left) => " [headlabel=\"True\"]",
                Some(Side::Right) => " [headlabel=\"False\"]",
                None => "",
            };
            let _ = writeln!(output, "{parent} -> {}{edge_label} ;", node.id);
        }
    }

    let _ = writeln!(output, "}}");
    output
}

fn dot_label(description: &TreeDescription<'_>, node: &NodeDescriptor<'_>) -> String {
    let mut lines = Vec::new();
    if let NodeRole::Split {
        feature_name,
        threshold,
        ..
    } = node.role
    {
        lines.push(format!(
            "{} <= {}",
            escape_dot(feature_name),
            format_number(threshold)
        ));
    }
    lines.push(format!("samples = {}", format_number(node.samples)));
    lines.push(format!("value = {}", format_counts(node.distribution)));
    lines.push(format!(
        "class = {}",
        escape_dot(description.model().class_name(node.majority))
    ));
    lines.join("\\n")
}

fn fill_color(node: &NodeDescriptor<'_>) -> &'static str {
    match node.role {
        NodeRole::Leaf { outcome, .. } => outcome.color(),
        NodeRole::Split { .. } => "lightgrey",
    }
}

fn escape_dot(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_counts(counts: &[f64]) -> String {
    let values: Vec<String> = counts.iter().map(|count| format_number(*count)).collect();
    format!("[{}]", values.join(", "))
}

pub fn build_batch_report(
    source: &str,
    generated_at: DateTime<Utc>,
    summary: &BatchSummary,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Heart Failure Risk Batch Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Outcomes");

    if summary.scored.is_empty() {
        let _ = writeln!(output, "No records could be scored.");
    } else {
        for outcome in Outcome::ALL {
            let _ = writeln!(
                output,
                "- {}: {} records",
                outcome.label(),
                summary.count(outcome)
            );
        }
    }

    if let Some(confusion) = summary.confusion() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Agreement With Recorded Outcomes");
        let _ = writeln!(
            output,
            "Accuracy {:.1}% over {} labelled records",
            confusion.accuracy() * 100.0,
            confusion.total()
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "| | predicted alive | predicted death |");
        let _ = writeln!(output, "|---|---|---|");
        let _ = writeln!(
            output,
            "| actual alive | {} | {} |",
            confusion.true_alive, confusion.false_death
        );
        let _ = writeln!(
            output,
            "| actual death | {} | {} |",
            confusion.false_alive, confusion.true_death
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rejected Records");

    if summary.rejected.is_empty() {
        let _ = writeln!(output, "All records passed validation.");
    } else {
        for rejected in &summary.rejected {
            let _ = writeln!(output, "- row {}: {}", rejected.row, rejected.error);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{RejectedRow, ScoredRow};
    use crate::error::ValidationError;
    use crate::models::{Field, FEATURE_COUNT};
    use crate::test_support::sample_model;
    use chrono::TimeZone;

    #[test]
    fn outcome_line_carries_label_and_color() {
        let result = PredictionResult::new(Outcome::Alive, 5, &[152.0, 18.0]);
        assert_eq!(
            render_outcome(&result),
            "Patient predicted to survive (alive, green, confidence 0.89)"
        );
    }

    #[test]
    fn text_tree_lists_every_node() {
        let model = sample_model();
        let text = render_tree_text(&model.describe());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[0],
            "Time <= 73.5 | samples = 299 | value = [203, 96] | class = alive"
        );
        assert_eq!(
            lines[1],
            "|   T: Ejection Fraction <= 22.5 | samples = 88 | value = [27, 61] | class = death"
        );
        assert_eq!(
            lines[6],
            "|   |   F: leaf: alive | samples = 41 | value = [24, 17] | class = alive"
        );
    }

    #[test]
    fn dot_output_links_children_to_parents() {
        let model = sample_model();
        let dot = render_tree_dot(&model.describe());

        assert!(dot.starts_with("digraph Tree {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("0 [label=\"Time <= 73.5\\nsamples = 299"));
        assert!(dot.contains("0 -> 1 [headlabel=\"True\"] ;"));
        assert!(dot.contains("4 -> 6 [headlabel=\"False\"] ;"));
        assert!(dot.contains("2 [label=\"samples = 25\\nvalue = [1, 24]\\nclass = death\", fillcolor=\"red\"]"));
        assert_eq!(dot.matches(" -> ").count(), 6);
    }

    #[test]
    fn path_explains_each_decision() {
        let model = sample_model();
        let mut features = [0.0; FEATURE_COUNT];
        features[Field::Time.index()] = 30.0;
        features[Field::EjectionFraction.index()] = 50.0;

        let path = model.decision_path(&features).expect("path");
        let text = render_path(&model.describe(), &path);
        assert_eq!(
            text,
            "- node 0: Time = 30 <= 73.5\n- node 1: Ejection Fraction = 50 > 22.5\n"
        );
    }

    #[test]
    fn batch_report_summarizes_outcomes_and_rejections() {
        let summary = BatchSummary {
            scored: vec![
                ScoredRow {
                    row: 1,
                    result: PredictionResult::new(Outcome::Death, 2, &[1.0, 24.0]),
                    actual: Some(Outcome::Death),
                },
                ScoredRow {
                    row: 2,
                    result: PredictionResult::new(Outcome::Alive, 5, &[152.0, 18.0]),
                    actual: Some(Outcome::Death),
                },
            ],
            rejected: vec![RejectedRow {
                row: 3,
                error: ValidationError::missing(Field::Time),
            }],
        };
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 8, 9, 30, 0).unwrap();

        let report = build_batch_report("records.csv", generated_at, &summary);
        assert!(report.contains("Generated for records.csv at 2026-02-08 09:30 UTC"));
        assert!(report.contains("- alive: 1 records"));
        assert!(report.contains("- death: 1 records"));
        assert!(report.contains("Accuracy 50.0% over 2 labelled records"));
        assert!(report.contains("| actual death | 1 | 1 |"));
        assert!(report.contains("- row 3: time: value is missing"));
    }

    #[test]
    fn empty_batch_report() {
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 8, 9, 30, 0).unwrap();
        let report = build_batch_report("empty.csv", generated_at, &BatchSummary::default());
        assert!(report.contains("No records could be scored."));
        assert!(report.contains("All records passed validation."));
        assert!(!report.contains("Accuracy"));
    }
}
