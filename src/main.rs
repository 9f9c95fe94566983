use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use sd_infotext::scanner::{is_png_path, read_image_info, scan_png_files};
use sd_infotext::{
    compose_recipe_payload, format_metadata_to_auto1111, parse_image_info, parse_source_with,
    parse_text_with, InfotextError, ParameterSet, ParseOptions, RawSource,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "sd-infotext", version, about = "Read and rewrite Stable Diffusion generation parameters")]
struct Cli {
    /// JSON file with parser options (threshold, defaults, Steps anchor)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report only what the source contains; skip WebUI defaults
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse PNG files, directories of PNGs, JSON/text files, or stdin
    Parse(ParseArgs),
    /// Render a Civitai image `meta` JSON object as infotext
    Civitai {
        /// JSON file, or `-` for stdin
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Files or directories; reads infotext from stdin when empty
    inputs: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Emit "{id}:{filename}" send-to-recipe payloads in text output
    #[arg(long)]
    recipe_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Serialize)]
struct ParsedRecord {
    source: String,
    canonical_text: String,
    params: ParameterSet,
}

fn main() -> ExitCode {
    env_logger::init();
    configure_thread_pool();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::from(2)
        }
    }
}

fn configure_thread_pool() {
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(8);
    let threads = cpu_count.saturating_sub(1).max(2);
    if rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .is_ok()
    {
        log::debug!(
            "Configured rayon global thread pool with {} workers ({} CPUs detected)",
            threads,
            cpu_count
        );
    }
}

/// Returns `Ok(false)` when some inputs failed but others were printed.
fn run(cli: Cli) -> Result<bool, InfotextError> {
    let mut options = match &cli.config {
        Some(path) => ParseOptions::load(path)?,
        None => ParseOptions::default(),
    };
    if cli.raw {
        options.inject_defaults = false;
    }

    match cli.command {
        Command::Parse(args) => run_parse(&args, &options),
        Command::Civitai { file } => {
            let content = read_input(&file)?;
            let meta: serde_json::Value = serde_json::from_str(&content)?;
            println!("{}", format_metadata_to_auto1111(&meta));
            Ok(true)
        }
    }
}

fn run_parse(args: &ParseArgs, options: &ParseOptions) -> Result<bool, InfotextError> {
    if args.inputs.is_empty() {
        let text = read_input(Path::new("-"))?;
        let record = to_record("<stdin>".to_string(), parse_text_with(&text, options));
        print_records(&[record], args)?;
        return Ok(true);
    }

    let paths = expand_inputs(&args.inputs);
    log::info!("Parsing {} file(s)", paths.len());

    let results: Vec<(PathBuf, Result<ParameterSet, InfotextError>)> = paths
        .par_iter()
        .map(|path| (path.clone(), parse_path(path, options)))
        .collect();

    let mut records = Vec::with_capacity(results.len());
    let mut all_ok = true;
    for (path, result) in results {
        match result {
            Ok(params) => records.push(to_record(path.display().to_string(), params)),
            Err(error) => {
                all_ok = false;
                log::warn!("Failed to read {}: {}", path.display(), error);
                eprintln!("{}: {}", path.display(), error);
            }
        }
    }

    print_records(&records, args)?;
    Ok(all_ok)
}

fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(scan_png_files(input));
        } else {
            paths.push(input.clone());
        }
    }
    paths
}

fn parse_path(path: &Path, options: &ParseOptions) -> Result<ParameterSet, InfotextError> {
    if is_png_path(path) {
        let info = read_image_info(path)?;
        return Ok(parse_image_info(&info, options));
    }

    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        let value: serde_json::Value = serde_json::from_str(&content)?;
        return Ok(parse_source_with(&RawSource::from_json(value), options));
    }

    Ok(parse_text_with(&content, options))
}

fn read_input(path: &Path) -> Result<String, InfotextError> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(path)?)
}

fn to_record(source: String, params: ParameterSet) -> ParsedRecord {
    ParsedRecord {
        source,
        canonical_text: sd_infotext::to_canonical_text(&params),
        params,
    }
}

fn print_records(records: &[ParsedRecord], args: &ParseArgs) -> Result<(), InfotextError> {
    match args.format {
        OutputFormat::Text => {
            for (index, record) in records.iter().enumerate() {
                if index > 0 {
                    println!();
                }
                match &args.recipe_id {
                    Some(recipe_id) => {
                        let filename = Path::new(&record.source)
                            .file_name()
                            .map(|name| name.to_string_lossy().to_string())
                            .unwrap_or_else(|| record.source.clone());
                        println!(
                            "{}",
                            compose_recipe_payload(recipe_id, &filename, &record.canonical_text)
                        );
                    }
                    None => println!("{}", record.canonical_text),
                }
            }
        }
        OutputFormat::Json => {
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(records)?);
        }
    }
    Ok(())
}
