use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use live_patcher::config::{self, BackendKind, PatcherConfig};
use live_patcher::{Module, ModuleResolver, Patcher, Value};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "LIVE_PATCHER_LOG";

#[derive(Parser)]
#[command(name = "live-patcher")]
#[command(about = "Patch script functions from unified diffs and run the result", long_about = None)]
#[command(version)]
struct Cli {
    /// Resolve MODULE as a dotted module name under this directory instead
    /// of a file path
    #[arg(short, long, global = true)]
    modules: Option<PathBuf>,

    /// Config file (otherwise LIVE_PATCHER_CONFIG, ./live-patcher.toml,
    /// ~/.live-patcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a unified diff to a function and optionally run it
    Apply {
        /// Module file (or dotted module name with --modules)
        module: String,

        /// Function to patch, e.g. `answer` or `Artist.paint`
        qualname: String,

        /// File holding the unified diff
        patch: PathBuf,

        /// Unapply the patch instead
        #[arg(short, long)]
        reverse: bool,

        /// Call the function without arguments afterwards and print the result
        #[arg(long)]
        call: bool,

        /// Show a unified diff of the function's source
        #[arg(short, long)]
        diff: bool,

        /// Override the configured backend
        #[arg(short, long, value_enum)]
        backend: Option<BackendArg>,
    },

    /// Print the current source of a function
    Source {
        /// Module file (or dotted module name with --modules)
        module: String,

        /// Function to print
        qualname: String,
    },

    /// List the functions and methods of a module
    Inspect {
        /// Module file (or dotted module name with --modules)
        module: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Command,
    Embedded,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Command => BackendKind::Command,
            BackendArg::Embedded => BackendKind::Embedded,
        }
    }
}

#[derive(Serialize)]
struct FunctionInfo {
    qualname: String,
    kind: live_patcher::runtime::MethodKind,
    params: Vec<String>,
    freevars: Vec<String>,
    flags: live_patcher::CompileFlags,
    line: Option<usize>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let modules = cli.modules.as_deref();

    match cli.command {
        Commands::Apply {
            module,
            qualname,
            patch,
            reverse,
            call,
            diff,
            backend,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(backend) = backend {
                config.backend.kind = backend.into();
            }
            cmd_apply(&config, modules, &module, &qualname, &patch, reverse, call, diff)
        }

        Commands::Source { module, qualname } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_source(&config, modules, &module, &qualname)
        }

        Commands::Inspect { module, json } => cmd_inspect(modules, &module, json),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<PatcherConfig> {
    let config = match explicit {
        Some(path) => config::load_from_path(path)?,
        None => config::discover()?,
    };
    Ok(config)
}

/// Load the modules a command works on and return the dotted name of
/// `module` inside the resolver.
fn load_modules(modules: Option<&Path>, module: &str) -> Result<(ModuleResolver, String)> {
    match modules {
        Some(dir) => {
            let resolver = ModuleResolver::load_dir(dir)
                .with_context(|| format!("failed to load modules from {}", dir.display()))?;
            if resolver.module(module).is_none() {
                anyhow::bail!("no module '{}' under {}", module, dir.display());
            }
            Ok((resolver, module.to_string()))
        }
        None => {
            let loaded = Module::load(module)?;
            let name = loaded.name().to_string();
            let mut resolver = ModuleResolver::new();
            resolver.add(loaded);
            Ok((resolver, name))
        }
    }
}

/// Show a unified diff between two versions of a function.
fn display_diff(name: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {name} (original)").dimmed());
    println!("{}", format!("+++ {name} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_apply(
    config: &PatcherConfig,
    modules: Option<&Path>,
    module: &str,
    qualname: &str,
    patch: &Path,
    reverse: bool,
    call: bool,
    show_diff: bool,
) -> Result<()> {
    let patch_text = fs::read_to_string(patch)
        .with_context(|| format!("failed to read patch {}", patch.display()))?;
    let (resolver, module_name) = load_modules(modules, module)?;
    let path = format!("{module_name}.{qualname}");

    let mut patcher = Patcher::new(config).with_resolver(resolver);
    let callable = patcher.resolve(path.as_str())?;
    let before = patcher.source_of(&callable)?;

    let outcome = if reverse {
        patcher.unpatch(&callable, &patch_text)
    } else {
        patcher.patch(&callable, &patch_text)
    };
    if let Err(err) = outcome {
        eprintln!("{} {}", "✗".red(), qualname);
        eprintln!("{err}");
        std::process::exit(1);
    }

    let verb = if reverse { "Unpatched" } else { "Patched" };
    println!(
        "{} {} {} (backend: {})",
        "✓".green(),
        verb,
        path,
        patcher.applier().backend_name()
    );

    if show_diff {
        let after = patcher.source_of(&callable)?;
        display_diff(qualname, &before, &after);
    }

    if call {
        let result = callable.call(Vec::new())?;
        if result != Value::Unit {
            println!("{}", result.repr());
        }
    }

    Ok(())
}

fn cmd_source(config: &PatcherConfig, modules: Option<&Path>, module: &str, qualname: &str) -> Result<()> {
    let (resolver, module_name) = load_modules(modules, module)?;
    let patcher = Patcher::new(config).with_resolver(resolver);
    let source = patcher.source_of(format!("{module_name}.{qualname}"))?;
    print!("{source}");
    Ok(())
}

fn cmd_inspect(modules: Option<&Path>, module: &str, json: bool) -> Result<()> {
    let (resolver, module_name) = load_modules(modules, module)?;
    let Some(module) = resolver.module(&module_name) else {
        anyhow::bail!("module '{}' was not loaded", module_name);
    };

    let functions: Vec<FunctionInfo> = module
        .functions()
        .iter()
        .map(|function| {
            let code = function.code();
            FunctionInfo {
                qualname: function.qualname().to_string(),
                kind: function.kind(),
                params: code.params.clone(),
                freevars: code.freevars.clone(),
                flags: code.flags,
                line: code.origin.as_ref().map(|origin| origin.line),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&functions)?);
        return Ok(());
    }

    println!("{} {}", "Module:".bold(), module.name());
    let features = module.flags().feature_names();
    if !features.is_empty() {
        println!("{} {}", "Features:".bold(), features.join(", "));
    }
    println!();
    for info in &functions {
        let line = info
            .line
            .map(|line| format!("line {line}"))
            .unwrap_or_default();
        println!(
            "  {:<28} {:<9} {}",
            info.qualname,
            format!("{:?}", info.kind).to_lowercase().cyan(),
            line.dimmed()
        );
        if !info.freevars.is_empty() {
            println!("    {} {}", "captures:".dimmed(), info.freevars.join(", "));
        }
    }
    Ok(())
}
