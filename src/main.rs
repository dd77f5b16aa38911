use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use openapi2proto::error::{Error, Result};
use openapi2proto::loader::load_document;
use openapi2proto::resolver::{ResolveOptions, Resolver};
use openapi2proto::value::Value;

/// Resolve OpenAPI documents ahead of Protocol Buffers generation.
///
/// Loads an OpenAPI document (JSON or YAML), fetches every external `$ref`
/// from disk or over HTTP(S), and writes the dereferenced document.
#[derive(Parser)]
#[command(name = "openapi2proto", version, about)]
struct Cli {
    /// Log progress (loaded files, fetched URLs) to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve external references and print the resulting document.
    Resolve {
        /// OpenAPI document to resolve (.json, .yaml or .yml).
        input: PathBuf,

        /// Base directory for relative references.
        /// Defaults to the directory containing the input.
        #[arg(long, env = "OPENAPI2PROTO_REF_DIR")]
        dir: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");

        // Print cause chain.
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }

        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve {
            input,
            dir,
            format,
            output,
        } => {
            let dir = dir.or_else(|| input.parent().map(PathBuf::from));
            let mut options = ResolveOptions::new();
            if let Some(dir) = dir {
                options = options.with_dir(dir);
            }

            tracing::info!("loading {}", input.display());
            let document = load_document(&input)?;
            let resolved = Resolver::new().resolve(document, &options)?;

            let rendered = render(&resolved, format)?;
            match output {
                Some(path) => std::fs::write(&path, rendered).map_err(|e| Error::Write {
                    path: path.clone(),
                    source: e,
                })?,
                None => std::io::stdout()
                    .write_all(rendered.as_bytes())
                    .map_err(|e| Error::Write {
                        path: PathBuf::from("<stdout>"),
                        source: e,
                    })?,
            }
        }
    }

    Ok(())
}

fn render(value: &Value, format: Format) -> Result<String> {
    match format {
        Format::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| Error::Output(e.to_string())),
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| Error::Output(e.to_string())),
    }
}
