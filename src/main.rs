//! `zmanim`: compile, check and evaluate zmanim formulas from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use zmanim::catalog::Catalog;
use zmanim::config::ZmanimConfig;
use zmanim::dsl::eval::{self, NoReferences};
use zmanim::dsl::names::{Base, ConditionVar, Direction, Function, Primitive};
use zmanim::dsl::{compile, EvaluationContext};
use zmanim::time::RoundingMode;

#[derive(Parser)]
#[command(name = "zmanim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate zmanim formulas for a date and location")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a formula and report every error
    Check {
        formula: String,
    },

    /// Evaluate a single formula
    Eval {
        formula: String,

        #[command(flatten)]
        place: PlaceArgs,

        /// Print each intermediate value
        #[arg(long)]
        breakdown: bool,
    },

    /// Link and evaluate a catalog of formulas (the built-in one if no file is given)
    Catalog {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        #[command(flatten)]
        place: PlaceArgs,

        /// Print results as JSON
        #[cfg(feature = "json")]
        #[arg(long)]
        json: bool,
    },

    /// List primitives, functions, bases, directions and condition variables
    Reference,
}

#[derive(Args)]
struct PlaceArgs {
    /// Date as YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Named location from the config file
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    location: Option<String>,

    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Metres above sea level
    #[arg(long, default_value_t = 0.0)]
    elevation: f64,

    /// IANA timezone name
    #[arg(long, default_value = "UTC")]
    tz: String,

    /// floor, ceil or math
    #[arg(long)]
    rounding: Option<RoundingMode>,

    /// Config file (default: ~/.zmanim/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl PlaceArgs {
    fn resolve(&self) -> Result<(EvaluationContext, RoundingMode), String> {
        let config = match &self.config {
            Some(path) => ZmanimConfig::load_from(path)
                .map_err(|e| format!("{}: {e}", path.display()))?,
            None => ZmanimConfig::load().unwrap_or_default(),
        };
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let rounding = self.rounding.unwrap_or(config.rounding);

        let ctx = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                EvaluationContext::with_timezone_name(date, lat, lon, self.elevation, &self.tz)
            }
            _ => {
                let location = config.location(self.location.as_deref()).ok_or_else(|| {
                    match &self.location {
                        Some(name) => format!("no location named '{name}' in config"),
                        None => "no location: pass --lat/--lon/--tz or set default_location in ~/.zmanim/config.yaml".to_string(),
                    }
                })?;
                location.to_context(date)
            }
        }
        .map_err(|e| e.to_string())?;

        Ok((ctx, rounding))
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zmanim=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { formula } => check(&formula),
        Commands::Eval {
            formula,
            place,
            breakdown,
        } => eval_formula(&formula, &place, breakdown),
        #[cfg(feature = "json")]
        Commands::Catalog { file, place, json } => run_catalog(file, &place, json),
        #[cfg(not(feature = "json"))]
        Commands::Catalog { file, place } => run_catalog(file, &place, false),
        Commands::Reference => {
            print_reference();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn joined<E: ToString>(errors: Vec<E>) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn check(formula: &str) -> Result<(), String> {
    match compile(formula) {
        Ok(compiled) => {
            println!("ok");
            let refs = compiled.references();
            if !refs.is_empty() {
                println!("references: {}", refs.join(", "));
            }
            Ok(())
        }
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            Err(format!("{} error(s)", errors.len()))
        }
    }
}

fn eval_formula(formula: &str, place: &PlaceArgs, breakdown: bool) -> Result<(), String> {
    let compiled = compile(formula).map_err(joined)?;
    let (ctx, rounding) = place.resolve()?;

    if breakdown {
        let (result, steps) = eval::evaluate_with_breakdown(&compiled.ast, &ctx, &NoReferences);
        for step in &steps {
            println!("  {:<40} {}", step.step, step.value);
        }
        let time = result.map_err(|e| e.to_string())?;
        println!("{} ({})", time.format_rounded(rounding), time.format_exact());
    } else {
        let time = zmanim::evaluate(&compiled, &ctx, &NoReferences).map_err(|e| e.to_string())?;
        println!("{}", time.format_rounded(rounding));
    }
    Ok(())
}

fn run_catalog(file: Option<PathBuf>, place: &PlaceArgs, json: bool) -> Result<(), String> {
    let catalog = match &file {
        Some(path) => Catalog::load(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => Catalog::standard(),
    };
    let set = catalog.to_formula_set().map_err(joined)?;
    let order = set.link().map_err(joined)?;
    let (ctx, rounding) = place.resolve()?;
    let batch = set.evaluate_all(&ctx).map_err(joined)?;

    if json {
        return print_json(&catalog, &batch, rounding);
    }

    println!(
        "{}: {} ({:.4}, {:.4}) {}",
        if catalog.name.is_empty() { "catalog" } else { catalog.name.as_str() },
        ctx.date(),
        ctx.latitude(),
        ctx.longitude(),
        ctx.timezone()
    );
    for entry in &catalog.zmanim {
        let key = entry.key.as_str();
        match (batch.times.get(key), batch.errors.get(key)) {
            (Some(t), _) => println!("  {key:<24} {}", t.format_rounded(rounding)),
            (None, Some(e)) => println!("  {key:<24} -- {e}"),
            (None, None) => {}
        }
    }
    tracing::debug!(order = ?order, "calculation order");
    Ok(())
}

#[cfg(feature = "json")]
fn print_json(
    catalog: &Catalog,
    batch: &zmanim::dsl::BatchResult,
    rounding: RoundingMode,
) -> Result<(), String> {
    let mut out = serde_json::Map::new();
    for entry in &catalog.zmanim {
        let key = entry.key.as_str();
        let value = match (batch.times.get(key), batch.errors.get(key)) {
            (Some(t), _) => serde_json::json!({
                "time": t.format_rounded(rounding),
                "exact": t.format_exact(),
            }),
            (None, Some(e)) => serde_json::json!({ "error": e.to_string() }),
            (None, None) => continue,
        };
        out.insert(key.to_string(), value);
    }
    let text = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

#[cfg(not(feature = "json"))]
fn print_json(
    _catalog: &Catalog,
    _batch: &zmanim::dsl::BatchResult,
    _rounding: RoundingMode,
) -> Result<(), String> {
    Err("built without the `json` feature".to_string())
}

fn print_reference() {
    println!("Primitives:");
    for p in Primitive::ALL {
        println!("  {:<24} {}", p.name(), p.describe());
    }
    println!("\nFunctions:");
    for f in Function::ALL {
        println!("  {:<52} {}", f.signature(), f.describe());
    }
    println!("\nBases:");
    for b in Base::ALL {
        println!("  {:<24} {}", b.name(), b.describe());
    }
    println!("\nDirections:");
    for d in Direction::ALL {
        println!("  {}", d.name());
    }
    println!("\nCondition variables:");
    for v in ConditionVar::ALL {
        println!("  {}", v.name());
    }
}
