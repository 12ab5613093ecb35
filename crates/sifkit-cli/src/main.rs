mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sifkit_core::classify::{ConstraintType, ObjectiveType};
use sifkit_core::{Coordinates, Counters, ModelMeta, ProblemFilter, select_problems};
use sifkit_evaluator::ModelConfig;
use sifkit_native::{NativeModel, open_model};
use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Decode, inspect and evaluate SIF optimization test problems"
)]
struct Cli {
    /// Log filter overriding SIFKIT_TRACE (for example, debug)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print problem sizes, bounds and constraint partition
    Inspect(ProblemArgs),
    /// Print a cached sparsity pattern
    Structure(StructureArgs),
    /// Evaluate objective, gradient and constraints at a point
    Evaluate(EvaluateArgs),
    /// List repository problems whose classification matches
    Select(SelectArgs),
}

#[derive(Args, Debug)]
struct ProblemArgs {
    /// Problem name, with or without the .SIF extension
    name: String,

    /// Reuse previously built artifacts instead of decoding
    #[arg(long)]
    no_decode: bool,

    /// Forward decoder output
    #[arg(long)]
    verbose: bool,

    /// Keep the declared constraint order instead of equalities first
    #[arg(long)]
    no_equalities_first: bool,

    /// Keep the declared constraint order instead of linear first
    #[arg(long)]
    no_linear_first: bool,

    /// Keep the declared variable order instead of nonlinear first
    #[arg(long)]
    no_nonlinear_first: bool,

    /// Argument forwarded to the decoder (repeatable, e.g. -param N=10)
    #[arg(long = "decoder-arg", allow_hyphen_values = true)]
    decoder_args: Vec<String>,

    /// Directory searched before the repository
    #[arg(long, default_value = ".")]
    search_dir: PathBuf,

    /// Problem repository root (defaults to MASTSIF)
    #[arg(long)]
    repository: Option<PathBuf>,

    /// Output format for stdout
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct StructureArgs {
    #[command(flatten)]
    problem: ProblemArgs,

    /// Which pattern to print
    #[arg(long, value_enum, default_value = "hessian")]
    kind: StructureKind,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[command(flatten)]
    problem: ProblemArgs,

    /// Comma-separated point; defaults to the starting point
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    x: Option<Vec<f64>>,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// Problem repository root (defaults to MASTSIF)
    #[arg(long)]
    repository: Option<PathBuf>,

    /// Objective type codes (N, C, L, Q, S, O)
    #[arg(long, value_delimiter = ',', value_parser = parse_objective)]
    objective: Vec<ObjectiveType>,

    /// Constraint type codes (U, X, B, N, L, Q, O)
    #[arg(long, value_delimiter = ',', value_parser = parse_constraints)]
    constraints: Vec<ConstraintType>,

    #[arg(long)]
    min_var: Option<usize>,

    #[arg(long)]
    max_var: Option<usize>,

    #[arg(long)]
    min_con: Option<usize>,

    #[arg(long)]
    max_con: Option<usize>,

    /// Only regular (R) or only irregular (I) problems
    #[arg(long)]
    regular: Option<bool>,

    /// Minimum number of analytic derivatives
    #[arg(long)]
    derivative_degree: Option<u8>,

    /// Skip problems whose sizes are chosen at decode time
    #[arg(long)]
    fixed_size_only: bool,

    /// Output format for stdout
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
enum StructureKind {
    Hessian,
    Jacobian,
    Linear,
}

#[derive(Debug, Clone, Serialize)]
struct InspectReport<'a> {
    meta: &'a ModelMeta,
    variables: Vec<String>,
    constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct EvaluateReport {
    problem: String,
    x: Vec<f64>,
    objective: f64,
    gradient: Vec<f64>,
    constraints: Vec<f64>,
    counters: Counters,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref())?;
    match cli.command {
        Command::Inspect(args) => inspect_command(args),
        Command::Structure(args) => structure_command(args),
        Command::Evaluate(args) => evaluate_command(args),
        Command::Select(args) => select_command(args),
    }
}

fn model_config(args: &ProblemArgs) -> ModelConfig {
    let mut config = ModelConfig::from_env()
        .with_decode(!args.no_decode)
        .with_verbose(args.verbose)
        .with_equalities_first(!args.no_equalities_first)
        .with_linear_first(!args.no_linear_first)
        .with_nonlinear_variables_first(!args.no_nonlinear_first)
        .with_decoder_args(args.decoder_args.iter().cloned())
        .with_search_dir(&args.search_dir);
    if let Some(repository) = &args.repository {
        config = config.with_repository(repository);
    }
    config
}

fn open(args: &ProblemArgs) -> Result<NativeModel, BoxError> {
    Ok(open_model(&args.name, &model_config(args))?)
}

fn inspect_command(args: ProblemArgs) -> Result<(), BoxError> {
    let mut model = open(&args)?;
    let names = model.names()?;
    let report = InspectReport {
        meta: model.meta(),
        variables: names.variables,
        constraints: names.constraints,
    };
    match args.format {
        OutputFormat::Table => print!("{}", format_meta_table(report.meta)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    model.finalize()?;
    Ok(())
}

fn structure_command(args: StructureArgs) -> Result<(), BoxError> {
    let mut model = open(&args.problem)?;
    match (args.kind, args.problem.format) {
        (StructureKind::Hessian, OutputFormat::Table) => {
            print!("{}", format_coordinates(model.hess_structure()?))
        }
        (StructureKind::Hessian, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(model.hess_structure()?)?)
        }
        (StructureKind::Jacobian, OutputFormat::Table) => {
            print!("{}", format_coordinates(model.jac_structure()?))
        }
        (StructureKind::Jacobian, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(model.jac_structure()?)?)
        }
        (StructureKind::Linear, OutputFormat::Table) => {
            let linear = model.linear_structure()?;
            println!("{:>8} {:>8} {:>16}", "row", "col", "value");
            for ((row, col), val) in linear.rows.iter().zip(&linear.cols).zip(&linear.vals) {
                println!("{row:>8} {col:>8} {val:>16.8e}");
            }
            println!("rhs: {:?}", linear.rhs);
        }
        (StructureKind::Linear, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(model.linear_structure()?)?)
        }
    }
    model.finalize()?;
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<(), BoxError> {
    let mut model = open(&args.problem)?;
    let (nvar, ncon) = (model.meta().nvar, model.meta().ncon);
    let x = args.x.unwrap_or_else(|| model.meta().x0.clone());

    let mut gradient = vec![0.0; nvar];
    let objective = model.objgrad(&x, &mut gradient)?;
    let mut constraints = vec![0.0; ncon];
    model.cons(&x, &mut constraints)?;

    let report = EvaluateReport {
        problem: model.name().to_string(),
        x,
        objective,
        gradient,
        constraints,
        counters: model.counters(),
    };
    match args.problem.format {
        OutputFormat::Table => print!("{}", format_evaluation(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    model.finalize()?;
    Ok(())
}

fn select_command(args: SelectArgs) -> Result<(), BoxError> {
    let repository = args
        .repository
        .clone()
        .or_else(|| ModelConfig::from_env().repository)
        .ok_or_else(|| boxed_input_error("no repository given and MASTSIF is unset"))?;
    let names = select_problems(&repository, &problem_filter(&args))?;
    match args.format {
        OutputFormat::Table => {
            for name in &names {
                println!("{name}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
    }
    Ok(())
}

fn problem_filter(args: &SelectArgs) -> ProblemFilter {
    let mut filter = ProblemFilter::new()
        .with_objective(args.objective.iter().copied())
        .with_constraints(args.constraints.iter().copied())
        .with_var_range(args.min_var, args.max_var)
        .with_con_range(args.min_con, args.max_con)
        .with_fixed_size_only(args.fixed_size_only);
    if let Some(regular) = args.regular {
        filter = filter.with_regular(regular);
    }
    if let Some(degree) = args.derivative_degree {
        filter = filter.with_derivative_degree(degree);
    }
    filter
}

fn single_code(value: &str) -> Result<char, String> {
    let mut chars = value.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(code), None) => Ok(code.to_ascii_uppercase()),
        _ => Err(format!("expected a single letter code, got '{value}'")),
    }
}

fn parse_objective(value: &str) -> Result<ObjectiveType, String> {
    let code = single_code(value)?;
    ObjectiveType::from_code(code).ok_or_else(|| format!("unknown objective type '{code}'"))
}

fn parse_constraints(value: &str) -> Result<ConstraintType, String> {
    let code = single_code(value)?;
    ConstraintType::from_code(code).ok_or_else(|| format!("unknown constraint type '{code}'"))
}

fn format_meta_table(meta: &ModelMeta) -> String {
    let mut out = String::new();
    let mut line = |key: &str, value: String| out.push_str(&format!("{key:<10} {value}\n"));
    line("problem", meta.name.clone());
    line("kind", meta.kind().as_str().to_string());
    line("nvar", meta.nvar.to_string());
    line("ncon", meta.ncon.to_string());
    line("nnzh", meta.nnzh.to_string());
    line("nnzj", meta.nnzj.to_string());
    line("bounded", meta.has_bounds().to_string());
    line("lin", format_indices(&meta.lin));
    line("nln", format_indices(&meta.nln));
    line("eq", format_indices(&meta.eq));
    out
}

fn format_indices(indices: &[usize]) -> String {
    let items: Vec<String> = indices.iter().map(usize::to_string).collect();
    format!("[{}]", items.join(", "))
}

fn format_coordinates(coords: &Coordinates) -> String {
    let mut out = format!("{:>8} {:>8}\n", "row", "col");
    for (row, col) in coords.rows.iter().zip(&coords.cols) {
        out.push_str(&format!("{row:>8} {col:>8}\n"));
    }
    out
}

fn format_evaluation(report: &EvaluateReport) -> String {
    let mut out = format!("{:<12} {:.12e}\n", "objective", report.objective);
    out.push_str(&format!("{:<12} {}\n", "grad_norm", norm(&report.gradient)));
    if !report.constraints.is_empty() {
        out.push_str(&format!("{:<12} {}\n", "cons_norm", norm(&report.constraints)));
    }
    out.push_str(&format!("{:<12} {}\n", "evaluations", report.counters.sum()));
    out
}

fn norm(values: &[f64]) -> String {
    format!("{:.6e}", values.iter().map(|v| v * v).sum::<f64>().sqrt())
}

fn boxed_input_error(message: &str) -> BoxError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        message.to_string(),
    ))
}
