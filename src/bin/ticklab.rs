//! Ticklab CLI: list, run, and check the built-in scheduling scenarios.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::process::ExitCode;
use ticklab::{RunError, RunnerConfig, ScenarioRunner, ScenarioSet};

#[derive(Parser, Debug)]
#[command(name = "ticklab", version, about = "Deterministic scheduling scenario runner")]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered scenarios
    List,
    /// Run scenarios and print their transcripts
    Run(RunArgs),
    /// Run scenarios and verify transcripts against their pins
    Check(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario name; omit to run all of them
    scenario: Option<String>,

    /// Tick ceiling per run
    #[arg(long = "max-ticks", default_value_t = 10_000)]
    max_ticks: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("ticklab: {message}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command) -> Result<(), String> {
    let set = ScenarioSet::builtin();
    match command {
        Command::List => {
            for scenario in set.iter() {
                if scenario.description().is_empty() {
                    println!("{}", scenario.name());
                } else {
                    println!("{:<24} {}", scenario.name(), scenario.description());
                }
            }
            Ok(())
        }
        Command::Run(args) => {
            let runner = runner(set, &args);
            for name in selected(&runner, args.scenario.as_deref())? {
                let tokens = runner.run(&name).map_err(render_run_error)?;
                println!("{name}: {}", tokens.join(" "));
            }
            Ok(())
        }
        Command::Check(args) => {
            let runner = runner(set, &args);
            let mut mismatches = 0usize;
            for name in selected(&runner, args.scenario.as_deref())? {
                let tokens = runner.run(&name).map_err(render_run_error)?;
                let scenario = runner
                    .set()
                    .get(&name)
                    .ok_or_else(|| format!("unknown scenario '{name}'"))?;
                match scenario.expected() {
                    Some(expected) if expected == tokens => {
                        println!("{name}: ok");
                    }
                    Some(expected) => {
                        mismatches += 1;
                        println!("{name}: MISMATCH");
                        println!("  expected: {}", expected.join(" "));
                        println!("  actual:   {}", tokens.join(" "));
                    }
                    None => {
                        println!("{name}: no pinned transcript, got: {}", tokens.join(" "));
                    }
                }
            }
            if mismatches > 0 {
                Err(format!("{mismatches} scenario(s) diverged from their pins"))
            } else {
                Ok(())
            }
        }
    }
}

fn runner(set: ScenarioSet, args: &RunArgs) -> ScenarioRunner {
    ScenarioRunner::with_config(
        set,
        RunnerConfig {
            max_ticks: args.max_ticks,
        },
    )
}

fn selected(runner: &ScenarioRunner, scenario: Option<&str>) -> Result<Vec<String>, String> {
    match scenario {
        Some(name) => {
            if runner.set().get(name).is_none() {
                return Err(format!("unknown scenario '{name}'"));
            }
            Ok(vec![name.to_string()])
        }
        None => Ok(runner
            .set()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()),
    }
}

fn render_run_error(error: RunError) -> String {
    error.to_string()
}
