use std::process::ExitCode;
use std::time::Instant;

use clap::Parser as Clap_parser;
use imdefense::classifier::{Classifier, PooledLinearClassifier};
use imdefense::config::load_config;
use imdefense::denoising::{Denoising, LabelCriterion};
use imdefense::error::Result;
use imdefense::pipeline::run_denoisers;
use imdefense::tensor::ChwImage;

#[derive(Clap_parser, Debug, Clone)]
#[command(author, version, about = "Runs a denoiser chain against a classifier", long_about = None)]
struct Args {
    #[arg(name = "input path", value_name = "input_path")]
    input_path: String,

    /// pooled linear model in toml
    #[arg(short, name = "model path", value_name = "model_path")]
    model_path: String,

    #[arg(
        short,
        name = "config path",
        default_value = "denoise.toml",
        value_name = "config_path"
    )]
    config_path: String,

    /// accept the first candidate predicted as this label; without it the
    /// first candidate whose label differs from the input's is accepted
    #[arg(long)]
    label: Option<usize>,

    #[arg(
        short,
        name = "output path",
        default_value = "denoised.png",
        value_name = "output_path"
    )]
    output_path: String,
}

fn run(args: &Args) -> Result<ExitCode> {
    let image = ChwImage::open(&args.input_path)?;
    let model = PooledLinearClassifier::from_toml_file(&args.model_path)?;
    let chain = load_config(&args.config_path)?;

    let input_label = model.predict_label(&image)?;
    let criterion = LabelCriterion::for_input(input_label, args.label);
    println!("input label: {}, criterion: {:?}", input_label, criterion);

    let now = Instant::now();
    let mut denoising = Denoising::new(image, criterion);
    let winner = run_denoisers(&model, &mut denoising, &chain.denoisers)?;
    println!("total denoise time: {:.2?}, {} queries", now.elapsed(), denoising.queries());

    match (winner, denoising.denoised(), denoising.denoised_label()) {
        (Some(name), Some(denoised), Some(label)) => {
            denoised.save(&args.output_path)?;
            println!("{} produced label {}, written to {}", name, label, args.output_path);
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            eprintln!("no denoiser satisfied {:?}", denoising.criterion());
            Ok(ExitCode::FAILURE)
        }
    }
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
