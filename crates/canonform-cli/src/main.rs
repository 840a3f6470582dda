use std::fmt::Display;
use std::path::{Path, PathBuf};

use canonform_core::{CanonicalSolution, Model, TableauBuilder, Tableau, TransformOptions};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "canonform")]
#[command(about = "Convert linear programs to standard form for tableau methods", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a model to canonical form and print it with its variable mapping
    Transform {
        /// JSON file containing the model
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
        #[command(flatten)]
        naming: Naming,
    },
    /// Print the initial tableau and basis of a model
    Tableau {
        /// JSON file containing the model
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
        #[command(flatten)]
        naming: Naming,
    },
    /// Map a canonical solution back to the model's original variables
    BackMap {
        /// JSON file containing the model
        file: PathBuf,
        /// JSON object of canonical variable values, optionally with "ObjectiveValue"
        solution: PathBuf,
    },
    /// Check a model file for structural errors
    Check {
        /// JSON file containing the model
        file: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(clap::Args, Debug, Default)]
struct Naming {
    /// Prefix for slack variable names
    #[arg(long)]
    slack_prefix: Option<String>,
    /// Prefix for surplus variable names
    #[arg(long)]
    surplus_prefix: Option<String>,
}

impl Naming {
    fn options(&self) -> TransformOptions {
        let mut options = TransformOptions::default();
        if let Some(prefix) = &self.slack_prefix {
            options = options.with_slack_prefix(prefix);
        }
        if let Some(prefix) = &self.surplus_prefix {
            options = options.with_surplus_prefix(prefix);
        }
        options
    }
}

#[derive(Serialize)]
struct TableauReport<'a> {
    tableau: &'a Tableau,
    basic: Vec<String>,
    non_basic: Vec<String>,
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}

fn read_json<T: DeserializeOwned>(path: &Path) -> T {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => fail("Error reading file", e),
    };
    match serde_json::from_str(&source) {
        Ok(value) => value,
        Err(e) => fail(&format!("Invalid JSON in {}", path.display()), e),
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Error writing JSON", e),
    }
}

fn transform(file: &Path, naming: &Naming) -> (Model, TableauBuilder) {
    let model: Model = read_json(file);
    let mut builder = TableauBuilder::with_options(naming.options());
    if let Err(e) = builder.transform(&model) {
        fail("Transformation error", e);
    }
    info!("transformed {}", file.display());
    (model, builder)
}

fn print_tableau(tableau: &Tableau, basic: &[String], non_basic: &[String]) {
    print!("{:>12}", "");
    for name in &tableau.variable_names {
        print!(" {:>10}", name);
    }
    println!(" {:>10}", "rhs");

    let objective = tableau.nr_rows() - 1;
    for (i, row) in tableau.data.iter().enumerate() {
        let label = if i == objective { "z" } else { tableau.constraint_names[i].as_str() };
        print!("{:>12}", label);
        for value in row {
            print!(" {:>10.4}", value);
        }
        println!();
    }
    println!();
    println!("Basic:     {}", basic.join(", "));
    println!("Non-basic: {}", non_basic.join(", "));
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform { file, format, naming } => {
            let (_, builder) = transform(&file, &naming);
            let Some(form) = builder.standard_form() else {
                fail("Transformation error", "no canonical model produced");
            };

            match format {
                Format::Json => print_json(form),
                Format::Pretty => {
                    print!("{}", form.model);
                    println!();
                    println!("Variable mapping:");
                    for mapping in &form.metadata.variable_map {
                        println!("  {}", mapping);
                    }
                    println!("Slack:   {}", form.metadata.slack_variables.join(", "));
                    println!("Surplus: {}", form.metadata.surplus_variables.join(", "));
                    if form.metadata.was_minimized {
                        println!("Objective negated (original sense: minimize)");
                    }
                }
            }
        }
        Commands::Tableau { file, format, naming } => {
            let (_, builder) = transform(&file, &naming);
            let report = builder.build().and_then(|tableau| {
                Ok((tableau, builder.basic_variables()?, builder.non_basic_variables()?))
            });
            let (tableau, basic, non_basic) = match report {
                Ok(r) => r,
                Err(e) => fail("Tableau error", e),
            };

            match format {
                Format::Json => print_json(&TableauReport {
                    tableau: &tableau,
                    basic,
                    non_basic,
                }),
                Format::Pretty => print_tableau(&tableau, &basic, &non_basic),
            }
        }
        Commands::BackMap { file, solution } => {
            let (model, builder) = transform(&file, &Naming::default());
            let canonical: CanonicalSolution = read_json(&solution);
            let Some(form) = builder.standard_form() else {
                fail("Transformation error", "no canonical model produced");
            };
            print_json(&form.back_map(&model, &canonical));
        }
        Commands::Check { file } => {
            let model: Model = read_json(&file);
            match model.validate() {
                Ok(()) => {
                    println!("✓ {} is valid", file.display());
                    println!("  {} variables", model.num_variables());
                    println!("  {} constraints", model.num_constraints());
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
