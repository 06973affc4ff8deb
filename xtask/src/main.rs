use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Machine booted by `cargo x ci` after the test suite
const SMOKE_CONFIG: &str = "machines/loopback.toml";

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for pcsys")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test, boot smoke test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Quick checks (fmt, clippy)
    Check {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the project
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run doc tests only
        #[arg(long)]
        doc: bool,
        /// Restrict to library tests of these modules (repeatable)
        #[arg(short, long, value_enum)]
        module: Vec<Module>,
    },
    /// Run benchmarks
    Bench,
    /// Boot a machine configuration with the pcsys binary
    Boot {
        /// Path to the machine configuration (TOML)
        #[arg(default_value = SMOKE_CONFIG)]
        config: String,
        /// Number of asynchronous event passes
        #[arg(short = 'p', long, default_value = "10")]
        passes: u64,
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
}

/// Library modules with their own test suites
#[derive(Clone, Copy, ValueEnum)]
enum Module {
    System,
    Timer,
    Plugin,
    Io,
    Config,
}

impl Module {
    fn filter(self) -> &'static str {
        match self {
            Self::System => "core::system",
            Self::Timer => "core::timer",
            Self::Plugin => "core::plugin",
            Self::Io => "core::io",
            Self::Config => "core::config",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Check { verbose } => run_check(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test { doc, module } => run_test(doc, &module),
        Commands::Bench => run_bench(),
        Commands::Boot {
            config,
            passes,
            release,
        } => run_boot(&config, passes, release),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());
    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task("Test", || run_test(false, &[]), verbose)?;
    run_task("Boot Smoke Test", || run_boot(SMOKE_CONFIG, 3, false), verbose)?;

    print_elapsed("✓ CI passed in", start);
    Ok(())
}

fn run_check(verbose: bool) -> Result<()> {
    println!("{}", "=== Running Quick Checks ===".bold().blue());
    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;

    print_elapsed("✓ Checks passed in", start);
    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = cargo("fmt");
    cmd.arg("--all");
    if check {
        cmd.args(["--", "--check"]);
    }
    execute_command(&mut cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = cargo("clippy");
    cmd.args(["--workspace", "--all-targets"]);
    if fix {
        cmd.arg("--fix");
    } else {
        cmd.args(["--", "-D", "warnings"]);
    }
    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = cargo("build");
    if release {
        cmd.arg("--release");
    }
    execute_command(&mut cmd)
}

fn run_test(doc: bool, modules: &[Module]) -> Result<()> {
    if doc {
        let mut cmd = cargo("test");
        cmd.arg("--doc");
        return execute_command(&mut cmd);
    }

    if modules.is_empty() {
        return execute_command(&mut cargo("test"));
    }

    // libtest takes a single name filter, so each module runs on its own
    let mut failed = Vec::new();
    for module in modules {
        println!("{} Running {} tests...", "→".blue(), module.filter().bold());

        let mut cmd = cargo("test");
        cmd.args(["--lib", module.filter()]);
        if execute_command(&mut cmd).is_err() {
            println!("{} {} tests failed\n", "✗".red(), module.filter());
            failed.push(module.filter());
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Tests failed in: {}", failed.join(", "));
    }
    Ok(())
}

fn run_bench() -> Result<()> {
    execute_command(&mut cargo("bench"))
}

fn run_boot(config_path: &str, passes: u64, release: bool) -> Result<()> {
    if !Path::new(config_path).exists() {
        println!(
            "{} Machine config not found: {}",
            "✗".red().bold(),
            config_path.yellow()
        );
        anyhow::bail!("Machine config not found");
    }

    println!(
        "{} Booting {} for {} passes ({})",
        "→".blue(),
        config_path.cyan(),
        passes.to_string().bold(),
        if release { "release" } else { "debug" }
    );

    let mut cmd = cargo("run");
    cmd.args(["--quiet", "--bin", "pcsys"]);
    if release {
        cmd.arg("--release");
    }
    cmd.args(["--", config_path, "-p"]).arg(passes.to_string());

    execute_command(&mut cmd)
}

fn cargo(subcommand: &str) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg(subcommand);
    cmd
}

fn print_elapsed(label: &str, start: Instant) {
    println!(
        "\n{} {}",
        label.green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);
    let start = Instant::now();

    match task() {
        Ok(()) => {
            if verbose {
                println!(
                    "{} ({:.2}s)",
                    "✓".green().bold(),
                    start.elapsed().as_secs_f64()
                );
            } else {
                println!("{}", "✓".green().bold());
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }
    Ok(())
}
