//! Fixed-width text study reader.
//!
//! The sectioned table format predates the JSON document and is kept for
//! hand-edited studies. Sections are located by their header line and read
//! until the `X---` border that closes them:
//!
//! ```text
//! GENERAL STUDY CONFIGURATION
//! X----------------------------X---------------X
//!  STUDY NAME                   toy
//!  METHOD                       DDP
//!  STAGE COUNT                  2
//!  OPENINGS PER STAGE           2
//!  DEFICIT COST                 500.0
//! X----------------------------X---------------X
//!
//! EXPECTED DEMAND PER STAGE
//! X------------X---------------X
//!        STAGE          DEMAND
//!            1           60.00
//!            2           60.00
//! X------------X---------------X
//!
//! HYDRO PLANT PARAMETERS
//! X------X-----------------X ...
//!     ID  NAME              INITIAL   MIN     MAX     PROD    TURBINE
//!      1  Reservoir A       20.0      0.0     100.0   1.0     50.0
//! X------X-----------------X ...
//!
//! THERMAL PLANT PARAMETERS
//!     ID  NAME              CAPACITY  COST
//!      1  GT 1              100.0     10.0
//!
//! INFLOW SCENARIOS PER HYDRO
//!     ID  STAGE  INFLOWS...
//!      1      1  10.0
//!      1      2  5.0  15.0
//! ```
//!
//! Configuration keys occupy the first 28 columns of their line; plant names
//! may contain spaces and are delimited by the numeric columns around them.

use anyhow::{anyhow, bail, Context, Result};
use hts_core::{
    Config, Fleet, Hydro, HydroId, InflowTable, Method, Study, Thermal, ThermalId,
};

const CONFIG_HEADER: &str = "GENERAL STUDY CONFIGURATION";
const DEMAND_HEADER: &str = "EXPECTED DEMAND PER STAGE";
const HYDRO_HEADER: &str = "HYDRO PLANT PARAMETERS";
const THERMAL_HEADER: &str = "THERMAL PLANT PARAMETERS";
const INFLOW_HEADER: &str = "INFLOW SCENARIOS PER HYDRO";
const TABLE_BORDER: &str = "X---";
const KEY_WIDTH: usize = 28;

/// Parse a study from the sectioned fixed-width text format.
pub fn parse_study_text(content: &str) -> Result<Study> {
    let config = parse_config(content)?;
    let demand = parse_demand(content, config.stage_count)?;
    let fleet = Fleet {
        hydros: parse_hydros(content)?,
        thermals: parse_thermals(content)?,
    };
    let inflows = parse_inflows(content, &fleet)?;
    let study = Study {
        config,
        fleet,
        demand,
        inflows,
    };
    study.validate().context("validating study document")?;
    Ok(study)
}

/// Lines of one section: everything after the header, skipping borders and
/// blanks, until the next header-looking line.
fn section_lines<'a>(content: &'a str, header: &str) -> Result<Vec<&'a str>> {
    let mut lines = content.lines();
    lines
        .by_ref()
        .find(|line| line.contains(header))
        .ok_or_else(|| anyhow!("section not found: {}", header))?;
    let mut rows = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || line.starts_with(TABLE_BORDER) {
            continue;
        }
        // A new section header ends this one.
        if [
            CONFIG_HEADER,
            DEMAND_HEADER,
            HYDRO_HEADER,
            THERMAL_HEADER,
            INFLOW_HEADER,
        ]
        .iter()
        .any(|h| line.contains(h))
        {
            break;
        }
        rows.push(line);
    }
    Ok(rows)
}

fn parse_config(content: &str) -> Result<Config> {
    let mut name = String::new();
    let mut method: Option<Method> = None;
    let mut stage_count = 0usize;
    let mut branch_count = 0usize;
    let mut trajectory_count = 1usize;
    let mut tail_fraction = 0.0;
    let mut tail_weight = 0.0;
    let mut confidence_z = 1.96;
    let mut seed = 0u64;
    let mut post_study_repeats = 0usize;
    let mut min_iter = 1usize;
    let mut max_iter = 50usize;
    let mut deficit_cost = 0.0;
    let mut resample = false;
    let mut single_lp_convergence_pair = false;

    for line in section_lines(content, CONFIG_HEADER)? {
        let (key, value) = split_key_value(line);
        match key.as_str() {
            "STUDY NAME" => name = value.to_string(),
            "METHOD" => {
                method = Some(match value {
                    "SINGLE_LP" => Method::SingleLp,
                    "DDP" => Method::Ddp,
                    "SDDP" => Method::Sddp,
                    other => bail!("unknown method: {}", other),
                })
            }
            "STAGE COUNT" => stage_count = parse_field(value, key.as_str())?,
            "OPENINGS PER STAGE" => branch_count = parse_field(value, key.as_str())?,
            "TRAJECTORY COUNT" => trajectory_count = parse_field(value, key.as_str())?,
            "TAIL FRACTION (ALPHA)" => tail_fraction = parse_field(value, key.as_str())?,
            "TAIL WEIGHT (LAMBDA)" => tail_weight = parse_field(value, key.as_str())?,
            "CONFIDENCE WIDTH (SIGMAS)" => confidence_z = parse_field(value, key.as_str())?,
            "SEED" => seed = parse_field(value, key.as_str())?,
            "POST-STUDY REPEATS" => post_study_repeats = parse_field(value, key.as_str())?,
            "MIN ITERATIONS" => min_iter = parse_field(value, key.as_str())?,
            "MAX ITERATIONS" => max_iter = parse_field(value, key.as_str())?,
            "DEFICIT COST" => deficit_cost = parse_field(value, key.as_str())?,
            "RESAMPLE" => resample = value == "YES",
            "SINGLE LP CONVERGENCE PAIR" => single_lp_convergence_pair = value == "YES",
            other => bail!("unknown configuration key: {}", other),
        }
    }

    Ok(Config {
        study_name: name,
        method: method.ok_or_else(|| anyhow!("configuration is missing METHOD"))?,
        stage_count,
        branch_count,
        trajectory_count,
        tail_fraction,
        tail_weight,
        confidence_z,
        seed,
        post_study_repeats,
        min_iter,
        max_iter,
        deficit_cost,
        resample,
        single_lp_convergence_pair,
    })
}

fn split_key_value(line: &str) -> (String, &str) {
    let cut = line.len().min(KEY_WIDTH);
    let key = line[..cut].trim().to_string();
    let value = line[cut..].trim();
    (key, value)
}

fn parse_field<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value for {}: {:?}", key, value))
}

fn parse_demand(content: &str, stage_count: usize) -> Result<Vec<f64>> {
    let mut demand = Vec::with_capacity(stage_count);
    for line in section_lines(content, DEMAND_HEADER)? {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&"STAGE") {
            continue;
        }
        let [stage, value] = fields.as_slice() else {
            bail!("malformed demand row: {:?}", line.trim());
        };
        let stage: usize = parse_field(stage, "demand stage")?;
        if stage != demand.len() + 1 {
            bail!("demand rows out of order at stage {}", stage);
        }
        demand.push(parse_field(value, "demand")?);
    }
    Ok(demand)
}

/// Plant rows interleave an id, a name that may contain spaces, and a fixed
/// count of trailing numeric fields; the name is whatever sits between them.
fn split_plant_row(line: &str, numeric_fields: usize) -> Result<(usize, String, Vec<f64>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < numeric_fields + 2 {
        bail!("malformed plant row: {:?}", line.trim());
    }
    let id: usize = parse_field(fields[0], "plant id")?;
    let name = fields[1..fields.len() - numeric_fields].join(" ");
    let values = fields[fields.len() - numeric_fields..]
        .iter()
        .map(|f| parse_field(f, "plant parameter"))
        .collect::<Result<Vec<f64>>>()?;
    Ok((id, name, values))
}

fn parse_hydros(content: &str) -> Result<Vec<Hydro>> {
    let mut hydros = Vec::new();
    for line in section_lines(content, HYDRO_HEADER)? {
        if line.split_whitespace().next() == Some("ID") {
            continue;
        }
        let (id, name, values) = split_plant_row(line, 5)?;
        hydros.push(
            Hydro::new(HydroId::new(id), name)
                .with_storage(values[0], values[1], values[2])
                .with_turbine(values[3], values[4]),
        );
    }
    Ok(hydros)
}

fn parse_thermals(content: &str) -> Result<Vec<Thermal>> {
    let mut thermals = Vec::new();
    for line in section_lines(content, THERMAL_HEADER)? {
        if line.split_whitespace().next() == Some("ID") {
            continue;
        }
        let (id, name, values) = split_plant_row(line, 2)?;
        thermals
            .push(Thermal::new(ThermalId::new(id), name).with_dispatch(values[0], values[1]));
    }
    Ok(thermals)
}

fn parse_inflows(content: &str, fleet: &Fleet) -> Result<InflowTable> {
    let mut table: Vec<Vec<Vec<f64>>> = vec![Vec::new(); fleet.hydros.len()];
    for line in section_lines(content, INFLOW_HEADER)? {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&"ID") {
            continue;
        }
        if fields.len() < 3 {
            bail!("malformed inflow row: {:?}", line.trim());
        }
        let id: usize = parse_field(fields[0], "inflow hydro id")?;
        let stage: usize = parse_field(fields[1], "inflow stage")?;
        let hydro = fleet
            .hydros
            .iter()
            .position(|h| h.id.value() == id)
            .ok_or_else(|| anyhow!("inflow row for unknown hydro id {}", id))?;
        if stage != table[hydro].len() + 1 {
            bail!("inflow rows for hydro {} out of order at stage {}", id, stage);
        }
        let candidates = fields[2..]
            .iter()
            .map(|f| parse_field(f, "inflow"))
            .collect::<Result<Vec<f64>>>()?;
        table[hydro].push(candidates);
    }
    Ok(InflowTable::new(table))
}
