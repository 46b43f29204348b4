use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use codejudge::analyzer::{check_style, validate_syntax};
use codejudge::challenge::{builtin_challenges, find_builtin, load_challenge};
use codejudge::config::{config_path, EngineConfig};
use codejudge::{Challenge, EngineError, ExecutionOutcome, TestCase, Validator};

#[derive(Parser)]
#[command(
    name = "codejudge",
    version,
    about = "Screen, run and grade untrusted Python submissions in isolated interpreter processes."
)]
struct Cli {
    #[arg(long, global = true, help = "Per-process timeout in seconds (1-300)")]
    timeout: Option<u64>,

    #[arg(long, global = true, help = "Max sandboxed processes alive at once (1-64)")]
    max_concurrent: Option<usize>,

    #[arg(long, global = true, help = "Python interpreter to run submissions with")]
    python: Option<String>,

    #[arg(long, global = true, help = "Config file (default: <config_dir>/codejudge/config.toml)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Syntax check and safety screen, no execution
    Check(CheckArgs),
    /// Screen, then run one call in the sandbox
    Exec(ExecArgs),
    /// Grade a submission against a challenge
    Run(RunArgs),
    /// List built-in challenges
    List,
}

#[derive(Args)]
struct CheckArgs {
    file: PathBuf,
}

#[derive(Args)]
struct ExecArgs {
    file: PathBuf,

    #[arg(long, help = "Call target, e.g. solution or Solution().process")]
    target: Option<String>,

    #[arg(long, default_value = "[]", help = "Positional arguments as a JSON array")]
    args: String,

    #[arg(long, default_value = "{}", help = "Keyword arguments as a JSON object")]
    kwargs: String,
}

#[derive(Args)]
struct RunArgs {
    file: PathBuf,

    #[arg(
        long,
        conflicts_with = "builtin",
        required_unless_present = "builtin",
        help = "Challenge definition (.json or .toml)"
    )]
    challenge: Option<PathBuf>,

    #[arg(long, help = "Built-in challenge id (see `codejudge list`)")]
    builtin: Option<String>,

    #[arg(long, default_value_t = false, help = "Print the report as JSON")]
    json: bool,

    #[arg(long, help = "Also write the report as JSON to this path")]
    out: Option<PathBuf>,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        CliCommand::Check(args) => check(&config, args),
        CliCommand::Exec(args) => exec(config, args),
        CliCommand::Run(args) => run(config, args),
        CliCommand::List => {
            list();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let path = cli.config.clone().unwrap_or_else(config_path);
    let mut cfg = EngineConfig::load_from(&path).map_err(EngineError::Config)?;

    if let Some(secs) = cli.timeout {
        cfg = cfg.with_timeout_secs(secs);
    }
    if let Some(n) = cli.max_concurrent {
        cfg = cfg.with_max_concurrent(n);
    }
    if let Some(python) = &cli.python {
        cfg.python = python.clone();
    }
    Ok(cfg)
}

fn read_source(path: &Path) -> Result<String, Box<dyn Error>> {
    fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e).into())
}

/* ============================================================
   Subcommands
   ============================================================ */

fn check(config: &EngineConfig, args: CheckArgs) -> Result<ExitCode, Box<dyn Error>> {
    let source = read_source(&args.file)?;
    let mut ok = true;

    match validate_syntax(&source) {
        Ok(()) => println!("✅ Syntax OK"),
        Err(errors) => {
            ok = false;
            for e in errors {
                println!("❌ {}", e);
            }
        }
    }

    let verdict = codejudge::screen::screen_with(&source, &config.screen_policy());
    match &verdict.reason {
        None => println!("✅ Safety screen passed"),
        Some(reason) => {
            ok = false;
            println!("❌ Unsafe code rejected: {}", reason);
        }
    }

    Ok(exit_code(ok))
}

fn exec(config: EngineConfig, args: ExecArgs) -> Result<ExitCode, Box<dyn Error>> {
    let source = read_source(&args.file)?;

    let call_args: Vec<Value> =
        serde_json::from_str(&args.args).map_err(|e| format!("--args must be a JSON array: {}", e))?;
    let kwargs: Map<String, Value> =
        serde_json::from_str(&args.kwargs).map_err(|e| format!("--kwargs must be a JSON object: {}", e))?;

    let validator = Validator::new(config);
    if let Some(reason) = validator.screen(&source).reason {
        println!("❌ Unsafe code rejected: {}", reason);
        return Ok(ExitCode::FAILURE);
    }

    let case = TestCase {
        target: args.target,
        args: call_args,
        kwargs,
    };

    let outcome = validator.execute(&source, &case)?;
    match &outcome {
        ExecutionOutcome::Success { result } => println!("{}", result),
        other => println!("❌ {}", other),
    }
    Ok(exit_code(outcome.is_success()))
}

fn run(config: EngineConfig, args: RunArgs) -> Result<ExitCode, Box<dyn Error>> {
    let source = read_source(&args.file)?;
    let challenge = resolve_challenge(&args)?;

    if let Err(errors) = validate_syntax(&source) {
        for e in errors {
            println!("❌ {}", e);
        }
        return Ok(ExitCode::FAILURE);
    }

    let validator = Validator::new(config);
    let report = validator.validate(&source, &challenge.test_cases, &challenge.expected_outputs)?;

    if let Some(out) = &args.out {
        fs::write(out, serde_json::to_string_pretty(&report)?)
            .map_err(|e| format!("{}: {}", out.display(), e))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} ({})", challenge.title, challenge.id);
        for line in &report.feedback {
            println!("{}", line);
        }
        let style = check_style(&source);
        println!("style {:.2}: {}", style.score, style.notes.join("; "));
        if !report.all_passed {
            if let Some(hint) = challenge.hints.first() {
                println!("hint: {}", hint);
            }
        }
    }

    Ok(exit_code(report.all_passed))
}

fn resolve_challenge(args: &RunArgs) -> Result<Challenge, EngineError> {
    match (&args.challenge, &args.builtin) {
        (Some(path), _) => load_challenge(path).map_err(EngineError::Challenge),
        (None, Some(id)) => {
            find_builtin(id).ok_or_else(|| EngineError::Challenge(format!("no built-in challenge `{}`", id)))
        }
        (None, None) => Err(EngineError::Challenge("pass --challenge or --builtin".into())),
    }
}

fn list() {
    for c in builtin_challenges() {
        println!(
            "{:<11} {:<30} difficulty {}  {} test cases",
            c.id,
            c.title,
            c.difficulty,
            c.test_cases.len()
        );
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
