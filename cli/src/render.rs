use std::collections::BTreeMap;
use std::fmt::Write;

use taxtree::builder::FlatNode;
use taxtree::store::Expander;
use taxtree::TaxonRecord;

fn marker(expander: Expander) -> char {
    match expander {
        Expander::None => ' ',
        Expander::Collapsed => '+',
        Expander::Expanded => '-',
        Expander::Loading => '~',
        Expander::Failed => '!',
    }
}

fn describe(record: &TaxonRecord) -> String {
    let mut out = record.display_name().to_string();
    if let Some(rank) = record.rank.as_deref().filter(|r| !r.is_empty()) {
        write!(out, " ({})", rank).ok();
    }
    write!(
        out,
        " [taxid {}, {} annotations]",
        record.taxid, record.annotations_count
    )
    .ok();
    out
}

/// Renders a flattened tree, one node per line, indented by level.
pub fn tree(nodes: &[FlatNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        writeln!(
            out,
            "{}{} {}{}",
            "  ".repeat(node.level),
            marker(node.expander),
            describe(&node.data),
            if node.highlighted { " *" } else { "" },
        )
        .ok();
    }
    out
}

/// Renders a list of records, one per line.
pub fn records(records: &[TaxonRecord]) -> String {
    records.iter().fold(String::new(), |mut out, record| {
        writeln!(out, "{}", describe(record)).ok();
        out
    })
}

/// Renders a lineage, indenting each taxon below its parent.
pub fn lineage(lineage: &[TaxonRecord]) -> String {
    let mut out = String::new();
    for (level, record) in lineage.iter().enumerate() {
        writeln!(out, "{}{}", "  ".repeat(level), describe(record)).ok();
    }
    out
}

/// Renders rank frequencies, most frequent first.
pub fn frequencies(frequencies: &BTreeMap<String, u64>) -> String {
    let mut sorted: Vec<(&String, &u64)> = frequencies.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1));

    let width = sorted.iter().map(|(rank, _)| rank.len()).max().unwrap_or(0);
    sorted.into_iter().fold(String::new(), |mut out, (rank, count)| {
        writeln!(out, "{:width$}  {}", rank, count, width = width).ok();
        out
    })
}
