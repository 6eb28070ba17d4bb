use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Result;

use stacklint::pipeline::{run_batch, PipelineOptions};
use stacklint::template::DocumentFormat;
use stacklint::RunReport;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [options] <template>...", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --format yaml|json   Override the extension-based format hint");
    eprintln!("  --max-nodes N        Node budget per document (default 100000)");
    eprintln!("  --json               Emit machine-readable reports");
    process::exit(2);
}

struct CliArgs {
    paths: Vec<PathBuf>,
    options: PipelineOptions,
    json: bool,
}

fn parse_args(program: &str, args: &[String]) -> CliArgs {
    let mut paths = Vec::new();
    let mut options = PipelineOptions::default();
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--format" => match iter.next().map(String::as_str) {
                Some("yaml") => options.format = Some(DocumentFormat::Yaml),
                Some("json") => options.format = Some(DocumentFormat::Json),
                _ => {
                    eprintln!("--format takes 'yaml' or 'json'");
                    usage(program);
                }
            },
            "--max-nodes" => match iter.next().and_then(|n| n.parse().ok()) {
                Some(n) => options.max_nodes = n,
                None => {
                    eprintln!("--max-nodes takes a number");
                    usage(program);
                }
            },
            "--help" | "-h" => usage(program),
            other if other.starts_with('-') => {
                eprintln!("Unknown option '{}'", other);
                usage(program);
            }
            path => paths.push(PathBuf::from(path)),
        }
    }

    if paths.is_empty() {
        usage(program);
    }
    CliArgs {
        paths,
        options,
        json,
    }
}

fn print_report(path: &PathBuf, report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {} resource(s), {} parameter(s)",
        path.display(),
        report.summary.resource_count,
        report.summary.parameter_count
    );
    for (type_tag, count) in &report.summary.resource_types {
        println!("  {} x{}", type_tag, count);
    }
    for conflict in &report.conflicts {
        println!("  {}", conflict);
    }
    for diagnostic in &report.diagnostics {
        println!("  {}", diagnostic);
    }
    if report.is_clean() {
        println!("  ok");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .map(String::as_str)
        .unwrap_or("stacklint")
        .to_string();
    let cli = parse_args(&program, &args[1..]);

    let mut failed = false;
    for (path, result) in run_batch(&cli.paths, &cli.options) {
        match result {
            Ok(report) => {
                print_report(&path, &report, cli.json)?;
                if !report.is_clean() {
                    failed = true;
                }
            }
            Err(err) => {
                eprintln!("{}: {}", path.display(), err);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
    Ok(())
}
