use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use efp_tissue::config::{ConfigLoader, ResolvedConfig};
use efp_tissue::domain::{DiagramName, Locus};
use efp_tissue::error::EfpError;
use efp_tissue::output::JsonOutput;
use efp_tissue::render::{HttpCoordinator, TracingSink};
use efp_tissue::surface::StyleSheet;

#[derive(Parser)]
#[command(name = "efp-tissue")]
#[command(about = "Color eFP tissue diagrams by expression level of a locus")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Aggregate expression values and color a diagram's regions")]
    Render(RenderArgs),
    #[command(about = "Show the sample catalog entry for a diagram")]
    Catalog(CatalogArgs),
    #[command(about = "Show reference expression values for a locus")]
    Reference(ReferenceArgs),
}

#[derive(Args)]
struct RenderArgs {
    diagram: String,
    locus: String,

    /// Region ids present in the diagram; defaults to the catalog's regions.
    #[arg(long, value_delimiter = ',')]
    regions: Option<Vec<String>>,
}

#[derive(Args)]
struct CatalogArgs {
    diagram: String,
}

#[derive(Args)]
struct ReferenceArgs {
    locus: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(efp) = report.downcast_ref::<EfpError>() {
            return ExitCode::from(map_exit_code(efp));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EfpError) -> u8 {
    match error {
        EfpError::InvalidLocus(_) | EfpError::InvalidDiagram(_) => 2,
        EfpError::Stall { .. } => 4,
        other if other.is_remote() => 3,
        _ => 1,
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

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    match cli.command {
        Commands::Render(args) => runtime.block_on(run_render(args, config)),
        Commands::Catalog(args) => runtime.block_on(run_catalog(args, config)),
        Commands::Reference(args) => runtime.block_on(run_reference(args, config)),
    }
}

async fn run_render(args: RenderArgs, config: ResolvedConfig) -> miette::Result<()> {
    let diagram: DiagramName = args.diagram.parse()?;
    let locus: Locus = args.locus.parse()?;
    let mut coordinator = HttpCoordinator::connect(config)?;

    let region_ids = match args.regions {
        Some(regions) => regions,
        None => {
            let entry = coordinator.catalog().resolve(&diagram).await?;
            let mut ids: Vec<String> = entry.regions.keys().cloned().collect();
            for group in &coordinator.config().alias_groups {
                if group.regions.iter().any(|member| ids.contains(member)) {
                    ids.extend(
                        group
                            .regions
                            .iter()
                            .filter(|member| !entry.regions.contains_key(*member))
                            .cloned(),
                    );
                }
            }
            ids
        }
    };

    let mut sheet = StyleSheet::loaded(diagram.clone(), region_ids);
    let report = coordinator
        .render(&diagram, &locus, &mut sheet, &TracingSink)
        .await?;
    JsonOutput::print_render(&report, &sheet).into_diagnostic()?;
    Ok(())
}

async fn run_catalog(args: CatalogArgs, config: ResolvedConfig) -> miette::Result<()> {
    let diagram: DiagramName = args.diagram.parse()?;
    let coordinator = HttpCoordinator::connect(config)?;
    let entry = coordinator.catalog().resolve(&diagram).await?;
    JsonOutput::print_catalog(&entry).into_diagnostic()?;
    Ok(())
}

async fn run_reference(args: ReferenceArgs, config: ResolvedConfig) -> miette::Result<()> {
    let locus: Locus = args.locus.parse()?;
    let coordinator = HttpCoordinator::connect(config)?;
    let lookup = coordinator.reference().lookup(&locus).await?;
    JsonOutput::print_reference(&lookup).into_diagnostic()?;
    Ok(())
}
