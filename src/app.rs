//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the stderr log subscriber
//! - dispatches to fit / compare / temperature / synth / plot / tui
//! - prints reports/plots and writes optional exports

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Command, FitArgs, LogLevel, PhysicsArgs, PlotArgs, SynthArgs, SynthKind, TemperatureArgs};
use crate::data::{PartitionSynth, generate_partition_set, generate_ratio_table};
use crate::domain::{Conditions, FitConfig, ModelSpec, PhysicalConstants, QConstant, QPreset, TemperatureConfig};
use crate::error::AppError;
use crate::fit::{DEFAULT_MAX_EVALS, DEFAULT_TEMPERATURE_MAX_EVALS};
use crate::io::KELVIN_OFFSET;
use crate::plot::SvgOptions;

pub mod pipeline;

/// Entry point for the `lsm` binary.
pub fn run() -> Result<(), AppError> {
    // Physics settings may come from LSM_* variables in a local `.env`.
    let _ = dotenvy::dotenv();

    // `lsm` alone opens the TUI.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_logging(cli.log_level);

    match cli.command {
        Command::Fit(args) => handle_fit(args, OutputMode::Full),
        Command::Compare(args) => handle_fit(args, OutputMode::CompareOnly),
        Command::Temperature(args) => handle_temperature(args),
        Command::Synth(args) => handle_synth(args),
        Command::Plot(args) => handle_plot(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn init_logging(level: LogLevel) {
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level.as_tracing())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    CompareOnly,
}

fn handle_fit(args: FitArgs, mode: OutputMode) -> Result<(), AppError> {
    let mut config = fit_config_from_args(&args, resolve_csv(&args)?)?;
    if mode == OutputMode::CompareOnly {
        config.model_spec = ModelSpec::Both;
    }
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.data, &run.selection, &config)
    );
    if mode == OutputMode::CompareOnly {
        return Ok(());
    }

    println!("{}", crate::report::format_residuals(&run.residuals));

    let samples = &run.data.set.samples;
    let best = &run.selection.best;
    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            samples,
            best,
            &config.constants,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional outputs.
    if let Some(path) = &config.svg_path {
        let opts = SvgOptions {
            phase_label: config.phase_label.clone(),
            ..SvgOptions::default()
        };
        let svg = crate::plot::render_fit_svg(samples, best, &config.constants, &opts)?;
        crate::plot::write_svg(path, &svg)?;
    }
    if let Some(path) = &config.export_fit {
        let file = crate::io::build_fit_file(
            best,
            samples,
            &config.constants,
            Some(config.csv_path.display().to_string()),
            &config.phase_label,
        );
        crate::io::write_fit_json(path, &file)?;
    }

    Ok(())
}

fn handle_temperature(args: TemperatureArgs) -> Result<(), AppError> {
    let config = temperature_config_from_args(&args)?;
    let table = pipeline::run_temperature(&config)?;

    println!(
        "{}",
        crate::report::format_temperature_table(&table, &config.calibration_label)
    );
    if let Some(path) = &config.export {
        crate::io::write_temperature_csv(path, &table)?;
    }

    if !table.rows.is_empty() && table.failures().count() == table.rows.len() {
        return Err(AppError::new(3, "No sample produced a temperature estimate."));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let constants = PhysicalConstants::default();
    let q = resolve_q(args.q, args.q_value)?;

    match args.kind {
        SynthKind::Partition => {
            let spec = PartitionSynth {
                model: args.model,
                d0: args.d0,
                r0: args.r0,
                e_fit: args.e_fit,
                q,
                conditions: Conditions {
                    temperature_k: args.temperature_c + KELVIN_OFFSET,
                    pressure_gpa: args.pressure_gpa,
                },
                noise_rel: args.noise,
                sigma_rel: args.sigma_rel,
                seed: args.seed,
            };
            let set = generate_partition_set(&spec, &constants)?;
            crate::io::write_partition_csv(&args.out, &set)?;
            println!("Wrote {} rows to {}", set.len(), args.out.display());
        }
        SynthKind::Ratios => {
            let temperatures = parse_sample_temperatures(&args.samples)?;
            let series = generate_ratio_table(
                &temperatures,
                &constants,
                q,
                args.calibration.calibration(),
                args.noise,
                args.seed,
            )?;
            crate::io::write_ratio_csv(&args.out, &series)?;
            println!("Wrote {} sample column(s) to {}", series.len(), args.out.display());
        }
    }
    Ok(())
}

fn handle_tui(args: FitArgs) -> Result<(), AppError> {
    // Pick the file before the terminal switches to raw mode.
    let config = fit_config_from_args(&args, resolve_csv(&args)?)?;
    crate::tui::run(config)
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_fit_json(&args.fit)?;

    if let Some(path) = &args.svg {
        let opts = SvgOptions {
            phase_label: file.phase_label.clone(),
            ..SvgOptions::default()
        };
        let svg = crate::plot::render_fit_file_svg(&file, &opts)?;
        return crate::plot::write_svg(path, &svg);
    }

    let plot = crate::plot::render_ascii_plot_from_fit_file(&file, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn resolve_csv(args: &FitArgs) -> Result<PathBuf, AppError> {
    match &args.csv {
        Some(path) => crate::cli::picker::validate_csv_path(path),
        None => crate::cli::picker::prompt_for_csv_path(),
    }
}

fn resolve_q(preset: QPreset, q_value: Option<f64>) -> Result<QConstant, AppError> {
    if let Some(v) = q_value.filter(|v| !(v.is_finite() && *v > 0.0)) {
        return Err(AppError::new(2, format!("--q-value must be > 0 (got {v}).")));
    }
    Ok(preset.resolve(q_value))
}

fn resolve_max_evals(physics: &PhysicsArgs, default: usize) -> Result<usize, AppError> {
    match physics.max_evals {
        Some(0) => Err(AppError::new(2, "--max-evals must be at least 1.")),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

pub fn fit_config_from_args(args: &FitArgs, csv_path: PathBuf) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        csv_path,
        model_spec: args.model,
        q: resolve_q(args.physics.q, args.physics.q_value)?,
        sigma_mode: args.sigma_mode,
        max_evals: resolve_max_evals(&args.physics, DEFAULT_MAX_EVALS)?,
        constants: PhysicalConstants::default(),
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        svg_path: args.svg.clone(),
        phase_label: args.phase_label.clone(),
        export_fit: args.export_fit.clone(),
    })
}

pub fn temperature_config_from_args(args: &TemperatureArgs) -> Result<TemperatureConfig, AppError> {
    Ok(TemperatureConfig {
        csv_path: args.csv.clone(),
        q: resolve_q(args.physics.q, args.physics.q_value)?,
        calibration: args.calibration.calibration(),
        calibration_label: args.calibration.display_name().to_string(),
        max_evals: resolve_max_evals(&args.physics, DEFAULT_TEMPERATURE_MAX_EVALS)?,
        constants: PhysicalConstants::default(),
        strict: args.strict,
        export: args.export.clone(),
    })
}

/// Parse `NAME=T_C` pairs into `(name, kelvin)`; defaults to two demo samples.
fn parse_sample_temperatures(raw: &[String]) -> Result<Vec<(String, f64)>, AppError> {
    if raw.is_empty() {
        return Ok(vec![
            ("zrn-1".to_string(), 750.0 + KELVIN_OFFSET),
            ("zrn-2".to_string(), 850.0 + KELVIN_OFFSET),
        ]);
    }
    raw.iter()
        .map(|item| {
            let (name, t) = item
                .split_once('=')
                .ok_or_else(|| AppError::new(2, format!("Expected NAME=T_C, got '{item}'.")))?;
            let t_c: f64 = t
                .trim()
                .parse()
                .map_err(|_| AppError::new(2, format!("Invalid temperature in '{item}'.")))?;
            Ok((name.trim().to_string(), t_c + KELVIN_OFFSET))
        })
        .collect()
}

/// Rewrite argv so `lsm` defaults to `lsm tui`.
///
/// Rules:
/// - `lsm`                       -> `lsm tui`
/// - `lsm -f data.csv ...`       -> `lsm tui -f data.csv ...`
/// - `lsm --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "fit" | "compare" | "temperature" | "synth" | "plot" | "tui"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    argv
}
