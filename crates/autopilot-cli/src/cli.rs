//! Command line parsing.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub tasks: usize,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub retry: bool,
    pub instant: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            tasks: 10,
            seed: None,
            config: None,
            retry: false,
            instant: false,
        }
    }
}

pub fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some((verb, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    match verb.as_str() {
        "run" => parse_run(rest).map(Command::Run),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(format!("unknown command `{other}`")),
    }
}

fn parse_run(args: &[String]) -> Result<RunArgs, String> {
    let mut run = RunArgs::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--tasks" => {
                run.tasks = parse_value(flag, iter.next())?;
                if run.tasks == 0 {
                    return Err("--tasks must be at least 1".to_string());
                }
            }
            "--seed" => run.seed = Some(parse_value(flag, iter.next())?),
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                run.config = Some(PathBuf::from(path));
            }
            "--retry" => run.retry = true,
            "--instant" => run.instant = true,
            other => return Err(format!("unknown option `{other}`")),
        }
    }
    Ok(run)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {flag}: `{value}`"))
}

pub fn help_text() -> String {
    [
        "Usage: autopilot-cli <command> [options]",
        "",
        "Commands:",
        "  run                 Ingest a synthetic batch and run the pipeline",
        "  help                Show this message",
        "",
        "Options for `run`:",
        "  --tasks <N>         Number of synthetic tasks (default 10)",
        "  --seed <S>          Seed the outcome generator for a reproducible run",
        "  --config <FILE>     JSON pipeline configuration",
        "  --retry             Retry failed tasks once the run has finished",
        "  --instant           Skip simulated waiting",
        "",
        "Set RUST_LOG to change the log level (default: info).",
    ]
    .join("\n")
}
