use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    api::{self, ModelCliArgs, ServeCliArgs, ServeConfig},
    offline,
};

#[derive(Debug, Parser)]
#[command(
    name = "body-language-api",
    version,
    about = "Classify body language from pose and face landmarks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP inference service.
    Serve(ServeCliArgs),
    /// Classify a single image file and print the JSON result.
    Predict(PredictCliArgs),
    /// Print the class labels the classifier was trained on.
    Classes(ModelCliArgs),
}

#[derive(Debug, Args)]
pub struct PredictCliArgs {
    #[command(flatten)]
    pub models: ModelCliArgs,
    /// Image to classify.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,
}

/// Parse `args` and run the selected subcommand. No subcommand means `serve`.
pub fn handle_commands(args: &[String]) -> Result<()> {
    let mut args = args.to_vec();
    if args.len() <= 1 {
        args.push("serve".into());
    }

    match Cli::parse_from(args).command {
        Command::Serve(args) => api::run(ServeConfig::try_from(args)?),
        Command::Predict(args) => offline::run_prediction(args),
        Command::Classes(args) => offline::print_classes(args),
    }
}
