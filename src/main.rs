use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use seaf_convert::config::{ConversionConfig, Overrides};
use seaf_convert::report::ConversionReport;
use seaf_convert::schema::{Dialect, SchemaRegistry};
use seaf_convert::sync;
use seaf_convert::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status when the conversion finished but reported error-level issues.
const EXIT_ISSUES: i32 = 2;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }

    match run(cli) {
        Ok(report) => {
            for line in report.summary_lines() {
                println!("{line}");
            }
            if report.has_errors() {
                std::process::exit(EXIT_ISSUES);
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ToolError::Logging(err.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<ConversionReport> {
    match cli.command {
        Command::Convert(args) => execute_convert(args),
    }
}

fn execute_convert(args: ConvertArgs) -> Result<ConversionReport> {
    let config = match &args.config {
        Some(path) => ConversionConfig::load(path)?,
        None => ConversionConfig::default(),
    };
    let config = config.apply(Overrides {
        dialect: args.dialect.map(Dialect::from),
        target_dialect: args.target_dialect.map(Dialect::from),
        inputs: args.input.clone(),
        output: args.output.clone(),
        report: args.report.clone(),
    });
    let registry = SchemaRegistry::standard();
    let output = config.output()?;

    let report = match (args.from, args.to) {
        (DataFormat::Xlsx, DataFormat::Yaml) => {
            let Some(first) = config.inputs.first() else {
                return Err(ToolError::Config("no input workbook given".into()));
            };
            if !config.inputs.iter().any(|input| input.exists()) {
                return Err(ToolError::MissingInput(first.clone()));
            }
            let options = config.ingest_options()?;
            sync::excel_to_yaml(&config.inputs, output, config.dialect(), &registry, &options)?
        }
        (DataFormat::Yaml, DataFormat::Xlsx) => {
            sync::yaml_to_excel(config.single_input()?, output, &registry, &config.normalizer)?
        }
        (DataFormat::Yaml, DataFormat::Yaml) => sync::translate_yaml(
            config.single_input()?,
            output,
            config.target_dialect(),
            &registry,
        )?,
        (DataFormat::Xlsx, DataFormat::Xlsx) => {
            return Err(ToolError::UnsupportedConversion {
                from: args.from.to_string(),
                to: args.to.to_string(),
            });
        }
    };

    if let Some(path) = &config.report {
        report.write_json(path)?;
        info!(path = %path.display(), "wrote conversion report");
    }
    Ok(report)
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Convert SEAF infrastructure inventories between YAML and Excel."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert an inventory from one representation to another.
    Convert(ConvertArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Source representation.
    #[arg(long, value_enum)]
    from: DataFormat,

    /// Target representation.
    #[arg(long, value_enum)]
    to: DataFormat,

    /// Dialect of the YAML side.
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,

    /// Dialect written by a YAML to YAML conversion.
    #[arg(long, value_enum)]
    target_dialect: Option<DialectArg>,

    /// Input file or directory; repeat for several workbooks.
    #[arg(long)]
    input: Vec<PathBuf>,

    /// Output directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optional YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the JSON conversion report.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DataFormat {
    Xlsx,
    Yaml,
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Xlsx => write!(f, "xlsx"),
            DataFormat::Yaml => write!(f, "yaml"),
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DialectArg {
    Seaf1,
    Seaf2,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Seaf1 => Dialect::Seaf1,
            DialectArg::Seaf2 => Dialect::Seaf2,
        }
    }
}
