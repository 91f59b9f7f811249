//! CSV export of result series.
//!
//! One file per (variable, plant) group: rows are stages, columns are the
//! evaluated scenarios plus the mean scenario. The layout is the plotting
//! interface — each file is a ready-to-plot family of curves. A study's
//! convergence history goes to `convergence.csv`, and the multi-study
//! comparison writes the mean-scenario series of several results side by
//! side.

use anyhow::{Context, Result};
use csv::Writer;
use hts_algo::{Scenario, StudyResult};
use std::fs;
use std::path::Path;

/// Per-hydro series selectors: (directory name, accessor).
type HydroSeries = (&'static str, fn(&Scenario) -> &Vec<Vec<f64>>);
const HYDRO_SERIES: &[HydroSeries] = &[
    ("inflow", |s| &s.inflows),
    ("final_storage", |s| &s.final_storage),
    ("turbined", |s| &s.turbined),
    ("spilled", |s| &s.spilled),
    ("water_value", |s| &s.water_values),
];

/// Stage-level series selectors.
type StageSeries = (&'static str, fn(&Scenario) -> &Vec<f64>);
const STAGE_SERIES: &[StageSeries] = &[
    ("deficit", |s| &s.deficit),
    ("cmo", |s| &s.cmo),
    ("immediate_cost", |s| &s.immediate_cost),
    ("future_cost", |s| &s.future_cost),
    ("total_cost", |s| &s.total_cost),
];

/// Export every series of one study under `dir`.
pub fn export_csvs(result: &StudyResult, dir: &Path) -> Result<()> {
    let Some(mean) = result.mean_scenario() else {
        return Ok(());
    };

    for (variable, select) in HYDRO_SERIES {
        let var_dir = dir.join(variable);
        fs::create_dir_all(&var_dir)
            .with_context(|| format!("creating export directory: {}", var_dir.display()))?;
        for (h, hydro) in result.fleet.hydros.iter().enumerate() {
            let path = var_dir.join(format!("{}.csv", sanitize(&hydro.name)));
            write_series_csv(
                &path,
                result.scenarios.iter().map(|s| &select(s)[h]),
                &select(&mean)[h],
            )?;
        }
    }

    {
        let var_dir = dir.join("thermal_dispatch");
        fs::create_dir_all(&var_dir)
            .with_context(|| format!("creating export directory: {}", var_dir.display()))?;
        for (t, thermal) in result.fleet.thermals.iter().enumerate() {
            let path = var_dir.join(format!("{}.csv", sanitize(&thermal.name)));
            write_series_csv(
                &path,
                result.scenarios.iter().map(|s| &s.thermal_dispatch[t]),
                &mean.thermal_dispatch[t],
            )?;
        }
    }

    for (variable, select) in STAGE_SERIES {
        let var_dir = dir.join(variable);
        fs::create_dir_all(&var_dir)
            .with_context(|| format!("creating export directory: {}", var_dir.display()))?;
        let path = var_dir.join("system.csv");
        write_series_csv(
            &path,
            result.scenarios.iter().map(select),
            select(&mean),
        )?;
    }

    export_convergence(result, dir)?;
    Ok(())
}

/// Write `convergence.csv`: iteration, bounds and (when present) the
/// confidence interval.
pub fn export_convergence(result: &StudyResult, dir: &Path) -> Result<()> {
    if result.z_sup.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory: {}", dir.display()))?;
    let path = dir.join("convergence.csv");
    let mut writer = Writer::from_path(&path)
        .with_context(|| format!("creating csv: {}", path.display()))?;
    writer.write_record(["iteration", "z_sup", "z_inf", "conf_low", "conf_high"])?;
    for i in 0..result.z_sup.len() {
        let (low, high) = result
            .confidence_intervals
            .get(i)
            .map_or((String::new(), String::new()), |(l, h)| {
                (l.to_string(), h.to_string())
            });
        writer.write_record([
            (i + 1).to_string(),
            result.z_sup[i].to_string(),
            result.z_inf[i].to_string(),
            low,
            high,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Multi-study comparison: per variable and plant, the mean-scenario series
/// of every study side by side.
pub fn export_comparison(results: &[StudyResult], dir: &Path) -> Result<()> {
    let means: Vec<(String, Scenario)> = results
        .iter()
        .filter_map(|r| {
            r.mean_scenario()
                .map(|m| (format!("{}_{}", r.config.study_name, r.config.method), m))
        })
        .collect();
    if means.is_empty() {
        return Ok(());
    }
    let reference = &results[0].fleet;

    for (variable, select) in HYDRO_SERIES {
        let var_dir = dir.join(variable);
        fs::create_dir_all(&var_dir)
            .with_context(|| format!("creating export directory: {}", var_dir.display()))?;
        for (h, hydro) in reference.hydros.iter().enumerate() {
            let path = var_dir.join(format!("{}.csv", sanitize(&hydro.name)));
            write_comparison_csv(&path, &means, |m| &select(m)[h])?;
        }
    }
    for (variable, select) in STAGE_SERIES {
        let var_dir = dir.join(variable);
        fs::create_dir_all(&var_dir)
            .with_context(|| format!("creating export directory: {}", var_dir.display()))?;
        let path = var_dir.join("system.csv");
        write_comparison_csv(&path, &means, |m| select(m))?;
    }
    Ok(())
}

/// One file: header `stage, scenario_1..N, mean`, one row per stage.
fn write_series_csv<'a>(
    path: &Path,
    series: impl Iterator<Item = &'a Vec<f64>> + Clone,
    mean: &[f64],
) -> Result<()> {
    let mut writer =
        Writer::from_path(path).with_context(|| format!("creating csv: {}", path.display()))?;
    let mut header = vec!["stage".to_string()];
    header.extend((1..=series.clone().count()).map(|i| format!("scenario_{}", i)));
    header.push("mean".to_string());
    writer.write_record(&header)?;
    for stage in 0..mean.len() {
        let mut row = vec![(stage + 1).to_string()];
        row.extend(series.clone().map(|s| s[stage].to_string()));
        row.push(mean[stage].to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_comparison_csv(
    path: &Path,
    means: &[(String, Scenario)],
    select: impl Fn(&Scenario) -> &Vec<f64>,
) -> Result<()> {
    let mut writer =
        Writer::from_path(path).with_context(|| format!("creating csv: {}", path.display()))?;
    let mut header = vec!["stage".to_string()];
    header.extend(means.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;
    let stages = means
        .iter()
        .map(|(_, m)| select(m).len())
        .min()
        .unwrap_or(0);
    for stage in 0..stages {
        let mut row = vec![(stage + 1).to_string()];
        row.extend(means.iter().map(|(_, m)| select(m)[stage].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// File-system friendly plant names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
