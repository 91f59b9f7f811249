//! Human-readable text report.
//!
//! Tables are fixed-width and padded so reports from different studies line
//! up when diffed side by side: configuration keys left-justified to 27
//! columns with values right-justified to 15, numeric table cells printed as
//! `{:>14.4}`.

use anyhow::{Context, Result};
use hts_algo::{Scenario, StudyResult};
use hts_core::Method;
use std::fs;
use std::path::Path;

const CELL: usize = 14;

/// Render the complete report for one finished study.
pub fn render_report(result: &StudyResult) -> String {
    let mut out = String::new();
    out.push_str("HYDROTHERMAL SCHEDULING STUDY REPORT\n\n");

    render_config(result, &mut out);

    match result.config.method {
        Method::SingleLp => {
            if let Some(objective) = result.objective {
                out.push_str(&format!("OBJECTIVE VALUE:      {:>15.4}\n\n", objective));
            }
        }
        Method::Ddp | Method::Sddp => {
            render_convergence(result, &mut out);
        }
    }

    if let Some(mean) = result.mean_scenario() {
        out.push_str("MEAN SCENARIO\n");
        render_scenario(result, &mean, &mut out);
    }

    out.push_str("DETAILED SCENARIO REPORT\n\n");
    for (index, scenario) in result.scenarios.iter().enumerate() {
        out.push_str(&format!("SCENARIO {:>4}\n", index + 1));
        render_scenario(result, scenario, &mut out);
    }

    if !result.cuts.is_empty() {
        render_cuts(result, &mut out);
    }

    out
}

/// Render the report and write it as `report.txt` under `dir`.
pub fn write_report(result: &StudyResult, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory: {}", dir.display()))?;
    let path = dir.join("report.txt");
    fs::write(&path, render_report(result))
        .with_context(|| format!("writing report: {}", path.display()))?;
    Ok(())
}

fn config_line(out: &mut String, key: &str, value: String) {
    out.push_str(&format!(" {:<27} {:>15}\n", key, value));
}

fn render_config(result: &StudyResult, out: &mut String) {
    let cfg = &result.config;
    out.push_str("STUDY CONFIGURATION\n");
    let border = format!("X{}X{}X\n", "-".repeat(29), "-".repeat(16));
    out.push_str(&border);
    config_line(out, "STUDY NAME", cfg.study_name.clone());
    config_line(out, "METHOD", cfg.method.to_string());
    config_line(out, "STAGE COUNT", cfg.stage_count.to_string());
    config_line(out, "OPENINGS PER STAGE", cfg.branch_count.to_string());
    config_line(out, "TRAJECTORY COUNT", cfg.trajectory_count.to_string());
    config_line(out, "TAIL FRACTION (ALPHA)", format!("{}", cfg.tail_fraction));
    config_line(out, "TAIL WEIGHT (LAMBDA)", format!("{}", cfg.tail_weight));
    config_line(out, "CONFIDENCE WIDTH (SIGMAS)", format!("{}", cfg.confidence_z));
    config_line(out, "SEED", cfg.seed.to_string());
    config_line(out, "POST-STUDY REPEATS", cfg.post_study_repeats.to_string());
    config_line(out, "DEFICIT COST ($/MWavg)", format!("{}", cfg.deficit_cost));
    config_line(out, "HYDRO PLANTS", result.fleet.hydros.len().to_string());
    config_line(out, "THERMAL PLANTS", result.fleet.thermals.len().to_string());
    out.push_str(&border);
    out.push('\n');
}

fn render_convergence(result: &StudyResult, out: &mut String) {
    out.push_str("CONVERGENCE REPORT\n");
    if !result.converged {
        out.push_str("WARNING: iteration limit reached before convergence\n");
    }
    let sddp = result.config.method == Method::Sddp;
    out.push_str(&format!("{:>6} {:>CELL$} {:>CELL$}", "ITER", "Z_SUP", "Z_INF"));
    if sddp {
        out.push_str(&format!(" {:>CELL$} {:>CELL$}", "CONF_LOW", "CONF_HIGH"));
    }
    out.push('\n');
    for i in 0..result.z_sup.len() {
        // The last entry comes from the final simulation, not an iteration.
        let label = if i + 1 > result.iterations {
            "FINAL".to_string()
        } else {
            (i + 1).to_string()
        };
        out.push_str(&format!(
            "{:>6} {:>CELL$.4} {:>CELL$.4}",
            label, result.z_sup[i], result.z_inf[i]
        ));
        if sddp {
            if let Some((low, high)) = result.confidence_intervals.get(i) {
                out.push_str(&format!(" {:>CELL$.4} {:>CELL$.4}", low, high));
            }
        }
        out.push('\n');
    }
    out.push('\n');
}

fn render_scenario(result: &StudyResult, scenario: &Scenario, out: &mut String) {
    // Header: one block of columns per hydro, then thermals, then the
    // stage-level series.
    out.push_str(&format!("{:>6}", "STAGE"));
    for hydro in &result.fleet.hydros {
        let id = hydro.id.value();
        for prefix in ["AFL", "VF", "VT", "VV", "CMA"] {
            out.push_str(&format!(" {:>CELL$}", format!("{}_{}", prefix, id)));
        }
    }
    for thermal in &result.fleet.thermals {
        out.push_str(&format!(" {:>CELL$}", format!("GT_{}", thermal.id.value())));
    }
    for name in ["DEFICIT", "CMO", "FCF", "TOTAL"] {
        out.push_str(&format!(" {:>CELL$}", name));
    }
    out.push('\n');

    for stage in 0..scenario.stage_len() {
        out.push_str(&format!("{:>6}", stage + 1));
        for h in 0..result.fleet.hydros.len() {
            out.push_str(&format!(
                " {:>CELL$.4} {:>CELL$.4} {:>CELL$.4} {:>CELL$.4} {:>CELL$.4}",
                scenario.inflows[h][stage],
                scenario.final_storage[h][stage],
                scenario.turbined[h][stage],
                scenario.spilled[h][stage],
                scenario.water_values[h][stage],
            ));
        }
        for t in 0..result.fleet.thermals.len() {
            out.push_str(&format!(" {:>CELL$.4}", scenario.thermal_dispatch[t][stage]));
        }
        out.push_str(&format!(
            " {:>CELL$.4} {:>CELL$.4} {:>CELL$.4} {:>CELL$.4}\n",
            scenario.deficit[stage],
            scenario.cmo[stage],
            scenario.future_cost[stage],
            scenario.total_cost[stage],
        ));
    }
    out.push('\n');
}

fn render_cuts(result: &StudyResult, out: &mut String) {
    out.push_str("FUTURE-COST FUNCTION CUTS\n\n");
    for (stage, nodes) in result.cuts.iter().enumerate() {
        for (node, pool) in nodes.iter().enumerate() {
            if pool.is_empty() {
                continue;
            }
            out.push_str(&format!("STAGE {:>3}  NODE {:>4}\n", stage + 1, node + 1));
            out.push_str(&format!("{:>19}", "INTERCEPT"));
            for hydro in &result.fleet.hydros {
                out.push_str(&format!(" {:>19}", format!("SLOPE_{}", hydro.id.value())));
            }
            out.push('\n');
            for cut in pool.iter() {
                out.push_str(&format!("{:>19.8}", cut.intercept));
                for slope in &cut.slope {
                    out.push_str(&format!(" {:>19.8}", slope));
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }
}
