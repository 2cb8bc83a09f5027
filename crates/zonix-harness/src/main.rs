#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
use std::path::Path;
use zonix_harness::{load_scenario, run_scenario, sample_scenario};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str);

    match cmd {
        Some("run") => {
            let path = args.get(1).context("run requires a scenario file")?;
            let scenario = load_scenario(Path::new(path))?;
            let outcome = run_scenario(&scenario)?;
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            if outcome.report.failed > 0 {
                bail!(
                    "scenario {}: {} of {} step(s) failed",
                    outcome.report.scenario,
                    outcome.report.failed,
                    outcome.report.steps.len()
                );
            }
            if outcome.report.leaked_holds > 0 {
                bail!(
                    "scenario {}: {} node hold(s) leaked",
                    outcome.report.scenario,
                    outcome.report.leaked_holds
                );
            }
            Ok(())
        }
        Some("sample") => {
            println!("{}", serde_json::to_string_pretty(&sample_scenario())?);
            Ok(())
        }
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!("zonix-harness — scenario runner for the Zonix engine");
    println!();
    println!("USAGE:");
    println!("  zonix-harness run <scenario.json>");
    println!("  zonix-harness sample");
    println!();
    println!("RUN:");
    println!("  Builds the scenario's tree on the in-memory store, executes its");
    println!("  operations in order, and prints a JSON report. Exits nonzero if");
    println!("  any step's outcome differs from its expectation or if a node");
    println!("  hold survives the run.");
    println!();
    println!("SAMPLE:");
    println!("  Prints a small scenario exercising every operation kind; pipe it");
    println!("  to a file to use as a starting point.");
    println!();
    println!("EXAMPLES:");
    println!("  zonix-harness sample > my_scenario.json");
    println!("  zonix-harness run my_scenario.json");
    println!("  zonix-harness run conformance/scenarios/unlink_policies.json");
}
