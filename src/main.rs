// Tue Jan 13 2026 - Alex

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use memhook::{
    config::EngineConfig,
    memory::{Address, StringEncoding, TypedMemory},
    pattern::{Pattern, PatternKind, ScanResult, SearchAlgorithm},
    utils::{format_bytes, hex_string_spaced, parse_address, LoggingUtils, ScopedTimer},
    TargetProcess,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Inspect and scan the memory of a running process", long_about = None)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Target process id; defaults to this process
    #[arg(long)]
    pid: Option<u32>,

    /// Target process name
    #[arg(long, conflicts_with = "pid")]
    name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded modules
    Modules {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Find signatures inside a module
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(short, long)]
        module: String,

        /// Signature such as "E8 ?? ?? ?? ?? 90"; may be repeated
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Treat matches as data references, reading the pointer at this offset
        #[arg(long, allow_hyphen_values = true)]
        deref: Option<i64>,

        #[arg(long)]
        algorithm: Option<String>,

        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Read typed values
    Read {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(short, long)]
        address: String,

        #[arg(long = "as", value_enum, default_value_t = ValueKind::Bytes)]
        kind: ValueKind,

        #[arg(short, long, default_value_t = 16)]
        len: usize,

        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },
    /// Resolve the MSVC RTTI chain of an object
    Rtti {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(short, long)]
        address: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ValueKind {
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Str,
    Bytes,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "[!]".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    LoggingUtils::init(&config.log_level, cli.verbose as usize);
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.scan_threads)
        .build_global()
        .ok();

    match cli.command {
        Command::Modules { target } => cmd_modules(&open(&target, config)?, cli.json),
        Command::Scan {
            target,
            module,
            patterns,
            deref,
            algorithm,
            start,
        } => {
            let process = open(&target, config)?;
            let algorithm = match algorithm {
                Some(name) => SearchAlgorithm::from_name(&name).ok_or_else(|| anyhow!("unknown algorithm '{}'", name))?,
                None => process.config().default_algorithm,
            };
            let patterns = patterns
                .iter()
                .map(|text| {
                    let kind = match deref {
                        Some(offset) => PatternKind::Data { deref_offset: offset },
                        None => PatternKind::Function,
                    };
                    Ok(Pattern::parse(text)?
                        .with_kind(kind)
                        .with_algorithm(algorithm)
                        .with_search_start(start)
                        .with_name(text))
                })
                .collect::<Result<Vec<_>>>()?;
            cmd_scan(&process, &module, &patterns, cli.json)
        }
        Command::Read {
            target,
            address,
            kind,
            len,
            encoding,
        } => {
            let process = open(&target, config)?;
            let address = parse_address(&address).ok_or_else(|| anyhow!("bad address '{}'", address))?;
            let encoding =
                StringEncoding::from_label(&encoding).ok_or_else(|| anyhow!("unknown encoding '{}'", encoding))?;
            cmd_read(process.memory(), address, kind, len, encoding, cli.json)
        }
        Command::Rtti { target, address } => {
            let process = open(&target, config)?;
            let address = parse_address(&address).ok_or_else(|| anyhow!("bad address '{}'", address))?;
            cmd_rtti(&process, address, cli.json)
        }
    }
}

#[cfg(target_os = "linux")]
fn open(target: &TargetArgs, config: EngineConfig) -> Result<TargetProcess> {
    let process = match (&target.pid, &target.name) {
        (Some(pid), _) => {
            TargetProcess::attach(*pid, config).with_context(|| format!("attaching to pid {}", pid))?
        }
        (None, Some(name)) => {
            TargetProcess::attach_by_name(name, config).with_context(|| format!("attaching to '{}'", name))?
        }
        (None, None) => TargetProcess::local(config)?,
    };
    Ok(process)
}

#[cfg(not(target_os = "linux"))]
fn open(_target: &TargetArgs, _config: EngineConfig) -> Result<TargetProcess> {
    bail!("process access is only implemented for Linux")
}

fn cmd_modules(process: &TargetProcess, json: bool) -> Result<()> {
    let modules = process.modules()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    println!("{} {} modules", "[+]".green(), modules.len());
    for module in &modules {
        println!(
            "  {} {:>12}  {}",
            module.base.to_string().cyan(),
            format_bytes(module.size as u64),
            module.name.bold()
        );
    }
    Ok(())
}

fn cmd_scan(process: &TargetProcess, module: &str, patterns: &[Pattern], json: bool) -> Result<()> {
    let _timer = ScopedTimer::new("scan");
    let module = process.module(module)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Reading {} ({})", module.name, format_bytes(module.size as u64)));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let scanner = process.scanner(&module)?;
    spinner.set_message(format!("Scanning {} patterns", patterns.len()));
    let results = scanner.find_many(patterns);
    spinner.finish_and_clear();

    if json {
        let entries: Vec<_> = patterns
            .iter()
            .zip(&results)
            .map(|(p, r)| serde_json::json!({ "pattern": p.text(), "result": r }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (pattern, result) in patterns.iter().zip(&results) {
        print_scan_result(pattern, result);
    }
    Ok(())
}

fn print_scan_result(pattern: &Pattern, result: &ScanResult) {
    if !result.found {
        println!("{} {} not found", "[-]".yellow(), pattern.text());
        return;
    }
    print!(
        "{} {} at +0x{:X} ({})",
        "[+]".green(),
        pattern.text(),
        result.match_offset,
        result.base_address.to_string().cyan()
    );
    if !result.read_address.is_null() {
        print!(" -> {}", result.read_address.to_string().cyan());
    }
    println!();
}

fn cmd_read(
    memory: &TypedMemory,
    address: Address,
    kind: ValueKind,
    len: usize,
    encoding: StringEncoding,
    json: bool,
) -> Result<()> {
    let value = match kind {
        ValueKind::U8 => serde_json::json!(memory.try_read::<u8>(address)?),
        ValueKind::U16 => serde_json::json!(memory.try_read::<u16>(address)?),
        ValueKind::U32 => serde_json::json!(memory.try_read::<u32>(address)?),
        ValueKind::U64 => serde_json::json!(memory.try_read::<u64>(address)?),
        ValueKind::I32 => serde_json::json!(memory.try_read::<i32>(address)?),
        ValueKind::I64 => serde_json::json!(memory.try_read::<i64>(address)?),
        ValueKind::F32 => serde_json::json!(memory.try_read::<f32>(address)?),
        ValueKind::F64 => serde_json::json!(memory.try_read::<f64>(address)?),
        ValueKind::Ptr => serde_json::json!(memory.try_read_address(address)?.to_string()),
        ValueKind::Str => serde_json::json!(memory.read_string_with_len(address, encoding, len)?),
        ValueKind::Bytes => serde_json::json!(hex_string_spaced(&memory.try_read_bytes(address, len)?)),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "address": address, "value": value }))?
        );
    } else {
        match value {
            serde_json::Value::String(s) => println!("{} {}", address.to_string().cyan(), s),
            other => println!("{} {}", address.to_string().cyan(), other),
        }
    }
    Ok(())
}

fn cmd_rtti(process: &TargetProcess, address: Address, json: bool) -> Result<()> {
    let chain = process.rtti(address);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "address": address, "type": chain }))?
        );
        return Ok(());
    }

    match chain {
        Some(chain) => println!("{} {}", address.to_string().cyan(), chain.bold()),
        None => bail!("no RTTI found at {}", address),
    }
    Ok(())
}
