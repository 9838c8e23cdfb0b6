//! Markdown run report
//!
//! `RUN_REPORT.md` lists what each pipeline step produced, the headline
//! metrics of both runs and the SPY/SPX contract terms.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analytics::Metrics;
use crate::core::{ContractSpec, LabResult};

pub const REPORT_FILE: &str = "RUN_REPORT.md";

/// Outputs of one pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub files: Vec<PathBuf>,
}

impl ReportSection {
    pub fn new(title: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            title: title.into(),
            files,
        }
    }
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0)).unwrap_or_else(|| "n/a".to_string())
}

fn num(v: Option<f64>) -> String {
    v.map(|x| format!("{:.3}", x)).unwrap_or_else(|| "n/a".to_string())
}

/// Markdown table of the summary metrics
pub fn metrics_table(summary: &[Metrics]) -> String {
    let mut out = String::new();
    out.push_str("| strategy | start | end | total_return | cagr | ann_vol | sharpe | sortino | max_drawdown | calmar | hit_ratio |\n");
    out.push_str("|---|---|---|---:|---:|---:|---:|---:|---:|---:|---:|\n");
    for m in summary {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            m.strategy,
            m.start,
            m.end,
            pct(Some(m.total_return)),
            pct(m.cagr),
            pct(m.ann_vol),
            num(m.sharpe),
            num(m.sortino),
            pct(m.max_drawdown),
            num(m.calmar),
            pct(m.hit_ratio),
        );
    }
    out
}

/// Side-by-side contract terms, with the traded one first
pub fn contract_table(traded: &ContractSpec, spot: Option<f64>) -> String {
    let other = if traded.symbol == "SPX" {
        ContractSpec::spy()
    } else {
        ContractSpec::spx()
    };

    let mut out = String::new();
    out.push_str("| | exercise | settlement | multiplier | strike step | early assignment |\n");
    out.push_str("|---|---|---|---:|---:|---|\n");
    for spec in [traded, &other] {
        let _ = writeln!(
            out,
            "| {} | {:?} | {:?} | {} | {} | {} |",
            spec.symbol,
            spec.exercise,
            spec.settlement,
            spec.multiplier,
            spec.strike_step,
            if spec.has_early_exercise_risk() { "yes" } else { "no" },
        );
    }
    if let Some(s) = spot {
        let _ = writeln!(
            out,
            "\nOne {} contract at {:.2} controls {:.0} of notional.",
            traded.symbol,
            s,
            traded.notional(s)
        );
    }
    out
}

/// Write `RUN_REPORT.md` into `out_dir` and return its path
pub fn write_run_report(
    out_dir: &Path,
    contract: &ContractSpec,
    last_spot: Option<f64>,
    summary: &[Metrics],
    sections: &[ReportSection],
) -> LabResult<PathBuf> {
    fs::create_dir_all(out_dir)?;

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut txt = String::new();
    let _ = writeln!(txt, "# Run report\n\nGenerated: `{}`\n", now);

    txt.push_str("## Outputs\n\n");
    for (i, section) in sections.iter().enumerate() {
        let _ = writeln!(txt, "### {}) {}", i + 1, section.title);
        for file in &section.files {
            let shown = file.strip_prefix(out_dir).unwrap_or(file);
            let _ = writeln!(txt, "- `{}`", shown.display());
        }
        txt.push('\n');
    }

    txt.push_str("## Key metrics\n\n");
    txt.push_str(&metrics_table(summary));
    txt.push('\n');

    txt.push_str("## Contract terms\n\n");
    txt.push_str(&contract_table(contract, last_spot));

    let path = out_dir.join(REPORT_FILE);
    fs::write(&path, txt)?;
    tracing::info!("Report: {}", path.display());
    Ok(path)
}
