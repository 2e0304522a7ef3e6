use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use egrid::debug::{
    format_f64_vec, format_island, format_polar_vec, format_rect_vec, format_step_factors,
};
use egrid::{
    load_store, make_model, make_scaling_islands, resolve_steps, Level, Model, ModelOptions,
    ModelOptionsBuilder, Part,
};
use std::path::PathBuf;

/// Indexed grid models for power flow calculation and state estimation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Magnitude of y_lo above which a branch is a bridge.
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Id of default factors.
    #[arg(long, global = true)]
    default_factor_id: Option<String>,

    /// Minimum |P10| or |Q10| of a significant injection part.
    #[arg(long, global = true)]
    pq_limit: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the model and print a summary
    Model(ModelArgs),

    /// Resolve factors of consecutive optimization steps
    Factors(FactorsArgs),

    /// Print scaling islands of active and reactive power
    Subgraphs(SubgraphsArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// JSON file of tables
    #[arg(required = true)]
    input: PathBuf,
}

#[derive(Args)]
struct FactorsArgs {
    /// JSON file of tables
    #[arg(required = true)]
    input: PathBuf,

    /// Number of steps.
    #[arg(long, default_value_t = 1)]
    steps: usize,
}

#[derive(Args)]
struct SubgraphsArgs {
    /// JSON file of tables
    #[arg(required = true)]
    input: PathBuf,

    /// Cut subgraphs at terminals with measured current too.
    #[arg(long, default_value_t = false)]
    with_i: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn options(cli: &Cli) -> Result<ModelOptions> {
    let mut builder = ModelOptionsBuilder::default();
    if let Some(threshold) = cli.threshold {
        builder.bridge_threshold(threshold);
    }
    if let Some(id) = &cli.default_factor_id {
        builder.default_factor_id(id.as_str());
    }
    if let Some(limit) = cli.pq_limit {
        builder.pq_limit(limit);
    }
    Ok(builder.build()?)
}

fn execute(cli: &Cli) -> Result<()> {
    let options = options(cli)?;

    let input = match &cli.command {
        Commands::Model(args) => &args.input,
        Commands::Factors(args) => &args.input,
        Commands::Subgraphs(args) => &args.input,
    };
    let store = load_store(input)?;
    let model = make_model(&store, &options)?;

    for message in &model.messages {
        match message.level {
            Level::Info => log::info!("{}", message.message),
            Level::Warning => log::warn!("{}", message.message),
            Level::Error => log::error!("{}", message.message),
        }
    }

    match &cli.command {
        Commands::Model(_) => print_model(&model)?,
        Commands::Factors(args) => {
            for sf in resolve_steps(&model.factordefs, args.steps)? {
                println!(
                    "step {}: {} vars, {} consts",
                    sf.step,
                    sf.meta.count_of_vars(),
                    sf.meta.count_of_consts()
                );
                print!("{}", format_step_factors(&sf));
                println!("values of vars: {}", format_f64_vec(&sf.meta.values_of_vars));
            }
        }
        Commands::Subgraphs(args) => {
            let steps = resolve_steps(&model.factordefs, 1)?;
            if let Some(sf) = steps.first() {
                for part in [Part::P, Part::Q] {
                    let islands =
                        make_scaling_islands(&model, sf, part, args.with_i, options.pq_limit, None);
                    for island in &islands {
                        println!("{}", format_island(island));
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_model(model: &Model) -> Result<()> {
    println!(
        "nodes: {} ({} slacks), branches: {}, bridges: {}, injections: {}",
        model.count_of_nodes(),
        model.count_of_slacks,
        model.branchterminals().len() / 2,
        model.bridgeterminals().len() / 2,
        model.injections.len()
    );
    for node in &model.nodes {
        println!(
            "{:>4} {}{}",
            node.index,
            node.ids.join(" "),
            if node.is_slack { " (slack)" } else { "" }
        );
    }
    let voltages: Vec<_> = model.slacks.iter().map(|slack| slack.V).collect();
    println!(
        "slack voltages: {} {}",
        format_rect_vec(&voltages),
        format_polar_vec(&voltages)
    );
    println!(
        "injections per node: {}",
        format_f64_vec(&model.mnodeinj.injection_count()?)
    );
    println!(
        "outputs: {} at branches, {} at injections",
        model.branchoutputs.len(),
        model.injectionoutputs.len()
    );
    Ok(())
}
