#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs headless BeatShot spawning sessions.

mod config;
mod simulation;

use std::path::PathBuf;

use anyhow::{Context, Result};
use beatshot_core::{AccuracyData, MemorySlot, QTableSnapshot, SaveSlot};
use beatshot_storage::JsonFileSlot;
use clap::{Parser, Subcommand};

use crate::{
    config::SessionFile,
    simulation::{SessionOptions, SessionReport},
};

#[derive(Parser, Debug)]
#[command(name = "beatshot", version, about = "Headless target spawning sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a session against a simulated player and print what the agent learned.
    Simulate {
        /// TOML session description. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of beats to play.
        #[arg(long, default_value_t = 200)]
        beats: usize,

        /// Seed shared by the spawner, the agent and the simulated player.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Chance that the simulated player destroys a target.
        #[arg(long, default_value_t = 0.5)]
        hit_probability: f64,

        /// JSON save file to resume from and write back to.
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print column averages of the table instead of column maxima.
        #[arg(long)]
        averages: bool,
    },
}

/// Entry point for the BeatShot command-line interface.
fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Commands::Simulate {
            config,
            beats,
            seed,
            hit_probability,
            save,
            averages,
        } => {
            let file = match config {
                Some(path) => SessionFile::load(&path)?,
                None => SessionFile::default(),
            };
            let options = SessionOptions {
                beats,
                seed,
                hit_probability,
            };
            match save {
                Some(path) => {
                    let mut slot = JsonFileSlot::new(path);
                    simulate(&file, options, &mut slot, averages)
                }
                None => simulate(&file, options, &mut MemorySlot::new(), averages),
            }
        }
    }
}

fn simulate(
    file: &SessionFile,
    options: SessionOptions,
    slot: &mut dyn SaveSlot,
    averages: bool,
) -> Result<()> {
    let outcome = simulation::run(file, options, slot)?;
    print_report(&outcome.report, averages);

    if let Some(agent) = &outcome.agent {
        agent
            .save_q_table(slot)
            .context("failed to save the learned table")?;
    }
    let mut data = slot.load().context("failed to reload the save slot")?;
    data.merge_accuracy(&file.identity(), &outcome.report.accuracy);
    slot.store(&data).context("failed to save accuracy")?;
    Ok(())
}

fn print_report(report: &SessionReport, averages: bool) {
    println!(
        "targets: {} spawned, {} hit, {} missed ({} accuracy reports)",
        report.spawned, report.hits, report.misses, report.accuracy_updates
    );

    match &report.snapshot {
        Some(snapshot) => print_snapshot(snapshot, averages),
        None => println!("agent table: no updates"),
    }
    print_accuracy(&report.accuracy);
}

fn print_snapshot(snapshot: &QTableSnapshot, averages: bool) {
    let (label, values) = if averages {
        ("averages", &snapshot.averages)
    } else {
        ("maxima", &snapshot.maxes)
    };
    println!("agent table {label}:");
    for row in values.chunks(snapshot.columns.max(1)) {
        let line: Vec<String> = row.iter().map(|value| format!("{value:>8.3}")).collect();
        println!("{}", line.join(" "));
    }
}

fn print_accuracy(accuracy: &AccuracyData) {
    println!("accuracy:");
    for row in accuracy.rows.iter().rev() {
        let line: Vec<String> = row
            .accuracy
            .iter()
            .map(|value| {
                if *value < 0.0 {
                    format!("{:>8}", "-")
                } else {
                    format!("{value:>8.2}")
                }
            })
            .collect();
        println!("{}", line.join(" "));
    }
}
