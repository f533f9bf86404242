use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use heart_risk::{batch, report, to_vector, validate, Field, RawRecord, TreePredictor};

#[derive(Parser)]
#[command(name = "heart-risk")]
#[command(about = "Heart failure risk prediction from a trained CART decision tree", long_about = None)]
struct Cli {
    /// Decision tree artifact exported from the trained classifier
    #[arg(
        long,
        global = true,
        env = "HEART_RISK_MODEL",
        default_value = "cart_model_heartz.json"
    )]
    model: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the outcome for one patient
    Predict {
        #[command(flatten)]
        form: PatientForm,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the decision tree
    Describe {
        #[arg(long, value_enum, default_value_t = TreeFormat::Text)]
        format: TreeFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score every record in a CSV export and write a markdown report
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TreeFormat {
    Text,
    Dot,
    Json,
}

/// Raw patient form. Values are validated by the library, not by clap.
#[derive(clap::Args)]
struct PatientForm {
    /// Age in years, 0-120
    #[arg(long)]
    age: Option<String>,
    /// No or Yes
    #[arg(long)]
    anaemia: Option<String>,
    /// Creatinine phosphokinase level (mcg/L)
    #[arg(long)]
    creatinine_phosphokinase: Option<String>,
    /// No or Yes
    #[arg(long)]
    diabetes: Option<String>,
    /// Ejection fraction percentage, 0-100
    #[arg(long)]
    ejection_fraction: Option<String>,
    /// No or Yes
    #[arg(long)]
    high_blood_pressure: Option<String>,
    /// Platelet count (kiloplatelets/mL)
    #[arg(long)]
    platelets: Option<String>,
    /// Serum creatinine (mg/dL)
    #[arg(long)]
    serum_creatinine: Option<String>,
    /// Serum sodium (mEq/L)
    #[arg(long)]
    serum_sodium: Option<String>,
    /// Female or Male
    #[arg(long)]
    sex: Option<String>,
    /// No or Yes
    #[arg(long)]
    smoking: Option<String>,
    /// Follow-up period in days
    #[arg(long)]
    time: Option<String>,
}

impl PatientForm {
    fn into_raw(self) -> RawRecord {
        let values = [
            (Field::Age, self.age),
            (Field::Anaemia, self.anaemia),
            (Field::CreatininePhosphokinase, self.creatinine_phosphokinase),
            (Field::Diabetes, self.diabetes),
            (Field::EjectionFraction, self.ejection_fraction),
            (Field::HighBloodPressure, self.high_blood_pressure),
            (Field::Platelets, self.platelets),
            (Field::SerumCreatinine, self.serum_creatinine),
            (Field::SerumSodium, self.serum_sodium),
            (Field::Sex, self.sex),
            (Field::Smoking, self.smoking),
            (Field::Time, self.time),
        ];

        values
            .into_iter()
            .filter_map(|(field, value)| value.map(|value| (field.key().to_string(), value)))
            .collect()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    run(cli).inspect_err(|err| log::error!("{err:#}"))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let predictor = TreePredictor::new();
    predictor
        .load(&cli.model)
        .with_context(|| format!("failed to load model from {}", cli.model.display()))?;

    match cli.command {
        Commands::Predict { form, json } => {
            let record = match validate(&form.into_raw()) {
                Ok(record) => record,
                Err(err) => {
                    eprintln!("Invalid input: {err}");
                    std::process::exit(2);
                }
            };
            let vector = to_vector(&record);
            let result = predictor.predict(vector.as_slice())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("{}", report::render_outcome(&result));
            let path = predictor.decision_path(vector.as_slice())?;
            println!("Decision path:");
            print!("{}", report::render_path(&predictor.describe()?, &path));
        }
        Commands::Describe { format, out } => {
            let description = predictor.describe()?;
            let rendered = match format {
                TreeFormat::Text => report::render_tree_text(&description),
                TreeFormat::Dot => report::render_tree_dot(&description),
                TreeFormat::Json => {
                    let nodes: Vec<_> = description.iter().collect();
                    serde_json::to_string_pretty(&nodes)?
                }
            };

            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Tree written to {}.", out.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Batch { csv, out } => {
            let summary = batch::score_csv(&predictor, &csv)
                .with_context(|| format!("failed to score {}", csv.display()))?;
            let report = report::build_batch_report(
                &csv.display().to_string(),
                chrono::Utc::now(),
                &summary,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Scored {} records ({} rejected). Report written to {}.",
                summary.scored.len(),
                summary.rejected.len(),
                out.display()
            );
        }
    }

    Ok(())
}
