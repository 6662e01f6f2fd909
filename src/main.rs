use anyhow::{Context, Result, bail};
use schemapatch::deparser::{postgresql_operations_deparser, postgresql_schema_deparser};
use schemapatch::extensions::{detect_extensions_from_ddl, filter_extension_ddl, required_extensions};
use schemapatch::operation::Operation;
use schemapatch::parser::{Format, ParseOptions, ProcessError, ProcessResult};
use schemapatch::report::SummaryStyle;
use schemapatch::schema::Schema;
use std::env;
use std::fs;
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: schemapatch <command> [args] [options]

Commands:
  parse <source>                 Parse a schema into canonical JSON
  ddl <source>                   Parse a schema and render PostgreSQL DDL
  summary <source>               Print a plain-text summary of a schema
  apply <schema.json> <patch.json>   Apply a JSON patch to a canonical schema
  deparse <patch.json>           Render a JSON patch as PostgreSQL DDL
  extensions <file.sql>          List supported extensions created by a DDL file

Options:
  -o, --output <file>      Output file (default: stdout)
  -f, --format <name>      Source format: auto, postgres, schemarb, prisma, tbls (default: auto)
  -c, --chunk-size <n>     Lines per SQL parse chunk (default: $SCHEMAPATCH_CHUNK_SIZE or 500)
  -p, --patch <file>       Patch to mark changes with (summary only)
      --filter             Print the DDL with unsupported extensions commented out (extensions only)";

struct Args {
    command: String,
    inputs: Vec<String>,
    output: Option<String>,
    format: Format,
    chunk_size: Option<usize>,
    patch: Option<String>,
    filter: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let Some(command) = args.get(1) else {
        bail!("missing command");
    };
    let mut parsed = Args {
        command: command.clone(),
        inputs: Vec::new(),
        output: None,
        format: Format::Auto,
        chunk_size: None,
        patch: None,
        filter: false,
    };

    let mut i = 2;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .with_context(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "-o" | "--output" => {
                parsed.output = Some(value(i)?);
                i += 1;
            }
            "-f" | "--format" => {
                let name = value(i)?;
                parsed.format =
                    Format::from_name(&name).with_context(|| format!("Invalid format: {name}"))?;
                i += 1;
            }
            "-c" | "--chunk-size" => {
                let n = value(i)?;
                parsed.chunk_size = Some(n.parse().with_context(|| format!("Invalid chunk size: {n}"))?);
                i += 1;
            }
            "-p" | "--patch" => {
                parsed.patch = Some(value(i)?);
                i += 1;
            }
            "--filter" => parsed.filter = true,
            arg if arg.starts_with('-') => bail!("Unknown option: {arg}"),
            arg => parsed.inputs.push(arg.to_string()),
        }
        i += 1;
    }
    Ok(parsed)
}

fn read(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

fn input(args: &Args, n: usize) -> Result<&str> {
    args.inputs
        .get(n)
        .map(String::as_str)
        .with_context(|| format!("{} expects {} input file(s)", args.command, n + 1))
}

fn chunk_size(args: &Args) -> Result<Option<usize>> {
    if let Some(n) = args.chunk_size {
        return Ok(Some(n));
    }
    match env::var("SCHEMAPATCH_CHUNK_SIZE") {
        Ok(n) => Ok(Some(
            n.parse()
                .with_context(|| format!("Invalid SCHEMAPATCH_CHUNK_SIZE: {n}"))?,
        )),
        Err(_) => Ok(None),
    }
}

fn parse_source(args: &Args) -> Result<ProcessResult> {
    let path = input(args, 0)?;
    let source = read(path)?;
    let mut options = ParseOptions::default();
    if let Some(n) = chunk_size(args)? {
        options = options.with_chunk_size(n);
    }
    let format = args.format.resolve(&source);
    info!(path, format = format.as_str(), chunk_size = options.chunk_size, "parsing");

    let result = format.parse(&source, &options);
    for error in &result.errors {
        warn!(name = error.name(), location = ?error.location(), "{error}");
    }
    if let Some(fatal) = result.errors.iter().find(|e| e.is_fatal()) {
        warn!("parse stopped early: {fatal}");
    }
    Ok(result)
}

fn read_patch(path: &str) -> Result<Vec<Operation>> {
    serde_json::from_str(&read(path)?).with_context(|| format!("Invalid patch in {path}"))
}

fn run(args: &Args) -> Result<String> {
    match args.command.as_str() {
        "parse" => {
            let result = parse_source(args)?;
            let errors: Vec<_> = result.errors.iter().map(ProcessError::report).collect();
            let output = serde_json::json!({ "value": result.value, "errors": errors });
            Ok(serde_json::to_string_pretty(&output)?)
        }
        "ddl" => {
            let result = parse_source(args)?;
            Ok(postgresql_schema_deparser(&result.value).value)
        }
        "summary" => {
            let result = parse_source(args)?;
            let patch = args.patch.as_deref().map(read_patch).transpose()?;
            let extensions = required_extensions(&result.value);
            let mut text = SummaryStyle::default().render(&result.value, patch.as_deref());
            if !extensions.is_empty() {
                text.push_str(&format!("\nrequires: {}\n", extensions.join(", ")));
            }
            if !result.errors.is_empty() {
                text.push_str(&format!("\n{} issues found\n", result.errors.len()));
            }
            Ok(text)
        }
        "apply" => {
            let schema_path = input(args, 0)?;
            let schema: Schema = serde_json::from_str(&read(schema_path)?)
                .with_context(|| format!("Invalid schema in {schema_path}"))?;
            let operations = read_patch(input(args, 1)?)?;
            let patched = schema
                .apply(&operations)
                .context("Patch does not apply to this schema")?;
            Ok(serde_json::to_string_pretty(&patched)?)
        }
        "deparse" => {
            let operations = read_patch(input(args, 0)?)?;
            let result = postgresql_operations_deparser(&operations);
            for error in &result.errors {
                warn!("{error}");
            }
            Ok(result.value)
        }
        "extensions" => {
            let sql = read(input(args, 0)?)?;
            if args.filter {
                let (filtered, _) = filter_extension_ddl(&sql);
                Ok(filtered)
            } else {
                Ok(detect_extensions_from_ddl(&sql).join("\n"))
            }
        }
        other => bail!("Unknown command: {other}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schemapatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let output = match run(&args) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &output) {
                eprintln!("Failed to write {path}: {e}");
                process::exit(1);
            }
        }
        None => println!("{output}"),
    }
}
