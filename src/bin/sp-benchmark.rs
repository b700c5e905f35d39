use std::process::ExitCode;
use std::time::Instant;

use clap::Parser as Clap_parser;
use imdefense::benchmark::SaltAndPepperBenchmark;
use imdefense::classifier::{load_labels, Classifier, PooledLinearClassifier};
use imdefense::config::load_config;
use imdefense::denoising::{Denoising, LabelCriterion};
use imdefense::error::Result;
use imdefense::pipeline::run_denoisers;
use imdefense::tensor::ChwImage;

#[derive(Clap_parser, Debug, Clone)]
#[command(author, version, about = "Salt and pepper robustness benchmark", long_about = None)]
struct Args {
    #[arg(name = "input path", value_name = "input_path")]
    input_path: String,

    /// pooled linear model in toml
    #[arg(short, name = "model path", value_name = "model_path")]
    model_path: String,

    /// class names, one per line
    #[arg(short, name = "labels path", value_name = "labels_path")]
    labels_path: Option<String>,

    #[arg(long, default_value_t = 100)]
    epsilons: usize,

    #[arg(long, default_value_t = 10)]
    repetitions: usize,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(
        short,
        name = "output path",
        default_value = "adversarial.png",
        value_name = "output_path"
    )]
    output_path: String,

    /// denoiser chain used to restore the clean label
    #[arg(short, name = "config path", value_name = "config_path")]
    config_path: Option<String>,
}

fn label_name(labels: &[String], label: usize) -> String {
    match labels.get(label) {
        Some(name) => format!("{} ({})", name, label),
        None => label.to_string(),
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let image = ChwImage::open(&args.input_path)?;
    let model = PooledLinearClassifier::from_toml_file(&args.model_path)?;
    let labels = match &args.labels_path {
        Some(path) => load_labels(path)?,
        None => vec![],
    };

    let true_label = model.predict_label(&image)?;
    let benchmark = SaltAndPepperBenchmark {
        epsilons: args.epsilons,
        repetitions: args.repetitions,
        seed: args.seed,
    };

    let now = Instant::now();
    let outcome = benchmark.run(&model, &image, true_label)?;
    println!("benchmark time: {:.2?}", now.elapsed());

    let (adversarial, fake_label) = match (&outcome.adversarial, outcome.label) {
        (Some(adversarial), Some(label)) => (adversarial, label),
        _ => {
            eprintln!("Warning: Cannot find an adversary!");
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("Summary:");
    println!(
        "Configuration: --model {} --criterion misclassification --metric salt_and_pepper --epsilons {} --repetitions {}",
        args.model_path, args.epsilons, args.repetitions
    );
    println!("The predicted label of original image is {}", label_name(&labels, true_label));
    println!("The predicted label of adversary image is {}", label_name(&labels, fake_label));
    println!("Minimum perturbation required: {:?}", outcome.distance.unwrap_or_default());
    println!("Salt and pepper proportion: {:?}", outcome.epsilon.unwrap_or_default());
    println!("Model queries: {}", outcome.queries);

    adversarial.save(&args.output_path)?;
    println!("adversarial image written to {}", args.output_path);

    if let Some(config_path) = &args.config_path {
        let chain = load_config(config_path)?;
        let mut denoising = Denoising::new(adversarial.clone(), LabelCriterion::Target { label: true_label });
        match run_denoisers(&model, &mut denoising, &chain.denoisers)? {
            Some(name) => println!(
                "{} restored {} after {} queries",
                name,
                label_name(&labels, true_label),
                denoising.queries()
            ),
            None => println!("no denoiser restored the original label after {} queries", denoising.queries()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
