use std::path::Path;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gide_search::app::{self, App, TransformSummary};
use gide_search::config::{ConfigLoader, ResolvedConfig};
use gide_search::domain::RecordId;
use gide_search::error::GideError;
use gide_search::index::ElasticHttpClient;
use gide_search::ontology::OlsHttpClient;
use gide_search::output::{JsonOutput, LogSink};
use gide_search::transform::{
    BiaHttpClient, BiaTransformer, IdrTransformer, LinkedDataTransformer, SsbdTransformer,
    Transformer,
};

#[derive(Parser)]
#[command(name = "gide-search")]
#[command(about = "Unify imaging-study metadata from IDR, SSBD, RO-Crates and the BioImage Archive")]
#[command(version, author)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "JSON config file (default: ./gide-search.json when present)"
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Transform an IDR metadata checkout or study file")]
    TransformIdr(PathArgs),
    #[command(about = "Transform an SSBD ontology Turtle file")]
    TransformSsbd(SsbdArgs),
    #[command(about = "Transform RO-Crate metadata files")]
    TransformRocrate(PathArgs),
    #[command(about = "Fetch and transform studies from the BioImage Archive search API")]
    TransformBia(BiaArgs),
    #[command(about = "Transform every source that is given")]
    TransformAll(AllArgs),
    #[command(about = "Summarize transformed records")]
    Stats(InputArgs),
    #[command(about = "Upsert transformed records into the search index")]
    Index(IndexArgs),
    #[command(about = "Export one transformed record as an RO-Crate")]
    ExportCrate(ExportArgs),
}

#[derive(Args)]
struct PathArgs {
    input: String,

    #[arg(long, short)]
    output: Option<String>,
}

#[derive(Args)]
struct SsbdArgs {
    input: String,

    #[arg(long, short)]
    output: Option<String>,

    #[arg(long, help = "Look up missing imaging-method labels in the ontology service")]
    ols: bool,
}

#[derive(Args)]
struct BiaArgs {
    #[arg(long, default_value = "")]
    query: String,

    #[arg(long, short = 'n')]
    page_size: Option<usize>,

    #[arg(long, short)]
    output: Option<String>,
}

#[derive(Args)]
struct AllArgs {
    #[arg(long)]
    idr: Option<String>,

    #[arg(long)]
    ssbd: Option<String>,

    #[arg(long)]
    rocrate: Option<String>,

    #[arg(long)]
    bia: bool,

    #[arg(long)]
    bia_page_size: Option<usize>,

    #[arg(long)]
    ols: bool,

    #[arg(long, short)]
    output_dir: Option<String>,
}

#[derive(Args)]
struct InputArgs {
    input: String,
}

#[derive(Args)]
struct IndexArgs {
    input: String,

    #[arg(long)]
    es_url: Option<String>,

    #[arg(long)]
    index_name: Option<String>,

    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    input: String,

    #[arg(help = "Record id, e.g. idr:idr0001")]
    id: String,

    #[arg(long, short)]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GideError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GideError) -> u8 {
    match error {
        GideError::InvalidRecordId(_)
        | GideError::InvalidSource(_)
        | GideError::MissingRootDataset(_)
        | GideError::InvalidTurtle(_)
        | GideError::InvalidJson(_)
        | GideError::InvalidFlatFile(_)
        | GideError::InputNotFound(_)
        | GideError::ConfigRead(_)
        | GideError::ConfigParse(_) => 2,
        GideError::OntologyHttp(_)
        | GideError::OntologyStatus { .. }
        | GideError::IndexHttp(_)
        | GideError::IndexStatus { .. }
        | GideError::IndexUnavailable(_)
        | GideError::BiaHttp(_)
        | GideError::BiaStatus { .. } => 3,
        GideError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(config);

    match cli.command {
        Commands::TransformIdr(args) => {
            let mut transformer = IdrTransformer::new(&args.input)
                .with_fallback_date(app.config().dates.idr);
            let summary = run_transform(&app, &mut transformer, args.output)?;
            JsonOutput::print_transform(&summary).into_diagnostic()
        }
        Commands::TransformSsbd(args) => {
            let summary = run_ssbd(&app, &args.input, args.ols, args.output)?;
            JsonOutput::print_transform(&summary).into_diagnostic()
        }
        Commands::TransformRocrate(args) => {
            let mut transformer = LinkedDataTransformer::new(&args.input)
                .with_fallback_date(app.config().dates.linked_data);
            let summary = run_transform(&app, &mut transformer, args.output)?;
            JsonOutput::print_transform(&summary).into_diagnostic()
        }
        Commands::TransformBia(args) => {
            let summary = run_bia(&app, &args.query, args.page_size, args.output)?;
            JsonOutput::print_transform(&summary).into_diagnostic()
        }
        Commands::TransformAll(args) => {
            let app = match args.output_dir {
                Some(dir) => App::new(ResolvedConfig {
                    output_dir: Utf8PathBuf::from(dir),
                    ..app.config().clone()
                }),
                None => app,
            };
            let mut summaries = Vec::new();
            if let Some(input) = args.ssbd {
                summaries.push(run_ssbd(&app, &input, args.ols, None)?);
            }
            if let Some(input) = args.idr {
                let mut transformer =
                    IdrTransformer::new(&input).with_fallback_date(app.config().dates.idr);
                summaries.push(run_transform(&app, &mut transformer, None)?);
            }
            if let Some(input) = args.rocrate {
                let mut transformer = LinkedDataTransformer::new(&input)
                    .with_fallback_date(app.config().dates.linked_data);
                summaries.push(run_transform(&app, &mut transformer, None)?);
            }
            if args.bia {
                summaries.push(run_bia(&app, "", args.bia_page_size, None)?);
            }
            if summaries.is_empty() {
                return Err(miette::Report::msg(
                    "no source given (use --idr, --ssbd, --rocrate or --bia)",
                ));
            }
            JsonOutput::print_transforms(&summaries).into_diagnostic()
        }
        Commands::Stats(args) => {
            let records = app::load_records(&Utf8PathBuf::from(args.input))?;
            JsonOutput::print_stats(&app::stats(&records)).into_diagnostic()
        }
        Commands::Index(args) => {
            let records = app::load_records(&Utf8PathBuf::from(args.input))?;
            let config = app.config();
            let url = args.es_url.as_deref().unwrap_or(&config.elasticsearch_url);
            let index_name = args.index_name.as_deref().unwrap_or(&config.index_name);
            let api_key = args.api_key.as_deref().or(config.api_key.as_deref());
            let client = ElasticHttpClient::new(url, index_name, api_key)?;
            let report = app.index(&records, &client, &LogSink)?;
            JsonOutput::print_index(&report).into_diagnostic()
        }
        Commands::ExportCrate(args) => {
            let records = app::load_records(&Utf8PathBuf::from(args.input))?;
            let id: RecordId = args.id.parse()?;
            let output = match args.output {
                Some(path) => Utf8PathBuf::from(path),
                None => app
                    .config()
                    .output_dir
                    .join("crates")
                    .join(id.as_str().replace(':', "_"))
                    .join("ro-crate-metadata.json"),
            };
            let result = app.export_crate(&records, &id, &output)?;
            JsonOutput::print_export(&result).into_diagnostic()
        }
    }
}

fn run_transform(
    app: &App,
    transformer: &mut dyn Transformer,
    output: Option<String>,
) -> miette::Result<TransformSummary> {
    let output = match output {
        Some(path) => Utf8PathBuf::from(path),
        None => app.default_output(transformer.source_label()),
    };
    Ok(app.transform(transformer, &output, &LogSink)?)
}

fn run_ssbd(
    app: &App,
    input: &str,
    ols: bool,
    output: Option<String>,
) -> miette::Result<TransformSummary> {
    let fallback = app.config().dates.ssbd;
    let transformer = SsbdTransformer::from_path(Path::new(input))?.with_fallback_date(fallback);
    if ols {
        let lookup = OlsHttpClient::connect(&app.config().ols_url, "fbbi")?;
        let mut transformer = transformer.with_lookup(lookup);
        run_transform(app, &mut transformer, output)
    } else {
        let mut transformer = transformer;
        run_transform(app, &mut transformer, output)
    }
}

fn run_bia(
    app: &App,
    query: &str,
    page_size: Option<usize>,
    output: Option<String>,
) -> miette::Result<TransformSummary> {
    let config = app.config();
    let client = BiaHttpClient::new(&config.bia_url)?;
    let mut transformer = BiaTransformer::new(client)
        .with_query(query)
        .with_page_size(page_size.unwrap_or(config.bia_page_size))
        .with_fallback_date(config.dates.bia);
    run_transform(app, &mut transformer, output)
}
