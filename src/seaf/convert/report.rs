//! Per-conversion summary: entity counts on both sides and every issue.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::seaf::convert::error::Result;
use crate::seaf::convert::io::write_atomic;
use crate::seaf::convert::model::{EntityKind, Issue, Severity};
use crate::seaf::convert::validate::dedup_issues;

/// A kind whose entity counts differ between source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub kind: EntityKind,
    pub source: usize,
    pub destination: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub source_counts: BTreeMap<EntityKind, usize>,
    pub dest_counts: BTreeMap<EntityKind, usize>,
    pub mismatches: Vec<Mismatch>,
    pub issues: Vec<Issue>,
    pub outputs: Vec<PathBuf>,
}

impl ConversionReport {
    /// Compares the counts kind by kind; a kind missing on one side counts as zero.
    pub fn build(
        source_counts: BTreeMap<EntityKind, usize>,
        dest_counts: BTreeMap<EntityKind, usize>,
        issues: Vec<Issue>,
        outputs: Vec<PathBuf>,
    ) -> Self {
        let kinds: BTreeSet<EntityKind> = source_counts
            .keys()
            .chain(dest_counts.keys())
            .copied()
            .collect();
        let mismatches = kinds
            .into_iter()
            .filter_map(|kind| {
                let source = source_counts.get(&kind).copied().unwrap_or(0);
                let destination = dest_counts.get(&kind).copied().unwrap_or(0);
                (source != destination).then_some(Mismatch {
                    kind,
                    source,
                    destination,
                })
            })
            .collect();

        Self {
            source_counts,
            dest_counts,
            mismatches,
            issues: dedup_issues(issues),
            outputs,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_json()?.as_bytes())
    }

    /// Human-readable lines for the console.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in EntityKind::ALL {
            let source = self.source_counts.get(&kind).copied().unwrap_or(0);
            let destination = self.dest_counts.get(&kind).copied().unwrap_or(0);
            if source == 0 && destination == 0 {
                continue;
            }
            let marker = if source == destination { "ok" } else { "MISMATCH" };
            lines.push(format!(
                "{:<20} {source:>6} -> {destination:<6} {marker}",
                kind.canonical_name()
            ));
        }
        for issue in &self.issues {
            let label = match issue.severity() {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            lines.push(format!("{label}: {issue}"));
        }
        lines.push(format!(
            "{} error(s), {} warning(s), {} file(s) written",
            self.count(Severity::Error),
            self.count(Severity::Warning),
            self.outputs.len()
        ));
        lines
    }
}
