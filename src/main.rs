use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use irrigation_knn::reading::N_FEATURES;
use irrigation_knn::train::{self, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};
use irrigation_knn::{IrrigationModel, KnnParams, ServerConfig, TrainConfig, Weighting};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "irrigation-knn")]
#[command(about = "Train and serve a k-NN irrigation classifier")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from a labelled sensor CSV and save it
    Train {
        /// Input dataset
        #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,

        /// Output model file
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        output: PathBuf,

        /// Fraction of rows held out for accuracy
        #[arg(long, default_value_t = irrigation_knn::split::DEFAULT_TEST_RATIO)]
        test_ratio: f64,

        /// Random seed for the train/test split
        #[arg(long, default_value_t = irrigation_knn::split::DEFAULT_SEED)]
        seed: u64,

        /// Number of neighbours that vote
        #[arg(short = 'k', long, default_value_t = 5)]
        neighbors: usize,

        /// Give every neighbour an equal vote instead of weighting by distance
        #[arg(long)]
        uniform: bool,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Trained model file
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },

    /// Predict a single reading
    Predict {
        /// Trained model file
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// soil_moisture temperature soil_humidity ph rainfall air_humidity
        #[arg(num_args = N_FEATURES, required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Classify readings typed at the prompt
    Interactive {
        /// Trained model file
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            data,
            output,
            test_ratio,
            seed,
            neighbors,
            uniform,
        } => {
            let config = TrainConfig {
                data_path: data,
                model_path: output,
                test_ratio,
                seed,
                params: KnnParams {
                    n_neighbors: neighbors,
                    weighting: if uniform {
                        Weighting::Uniform
                    } else {
                        Weighting::Distance
                    },
                },
            };
            train::run(&config).context("Training failed")?;
        }
        Commands::Serve { model, host, port } => {
            let config = ServerConfig {
                host,
                port,
                model_path: model,
            };
            let runtime = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            runtime
                .block_on(irrigation_knn::serve(&config))
                .context("Server failed")?;
        }
        Commands::Predict { model, values } => {
            let model = load(&model)?;
            let features = to_features(&values)?;
            println!("{}", model.predict(&features)?);
        }
        Commands::Interactive { model } => interactive(&load(&model)?)?,
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<IrrigationModel> {
    println!("📦 Loading model from {:?}", path);
    IrrigationModel::load_from_file(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))
}

fn to_features(values: &[f64]) -> anyhow::Result<[f64; N_FEATURES]> {
    let features: [f64; N_FEATURES] = values
        .try_into()
        .with_context(|| format!("Expected {N_FEATURES} values, got {}", values.len()))?;
    if features.iter().any(|v| !v.is_finite()) {
        bail!("Readings must be finite numbers");
    }
    Ok(features)
}

fn interactive(model: &IrrigationModel) -> anyhow::Result<()> {
    model.show_summary();

    loop {
        print!("Enter {N_FEATURES} comma-separated readings (or 'exit'): ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let parsed: Result<Vec<f64>, _> = line.split(',').map(|v| v.trim().parse()).collect();
        let features = match parsed.map_err(anyhow::Error::from).and_then(|v| to_features(&v)) {
            Ok(features) => features,
            Err(e) => {
                eprintln!("⚠️ {e}");
                continue;
            }
        };

        println!("{} is classified as {}", line, model.predict(&features)?);
    }
    Ok(())
}
