//! `melvad`: train and run the mel filter-bank voice activity detector.
//!
//! ```text
//! melvad init-config melvad.json
//! melvad train --speech data/speech --non-speech data/noise --config melvad.json
//! melvad classify recording.wav --config melvad.json [--json]
//! melvad extract recording.wav
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use melvad_core::{
    load_config, save_config, FeatureExtractor, FrameDecision, LabeledSource, Vad, VadConfig,
    WavStream,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "melvad")]
#[command(about = "Frame-level voice activity detection with mel features and an SVM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a model from directories of labeled WAV files.
    Train {
        /// Directory of speech recordings.
        #[arg(long)]
        speech: PathBuf,
        /// Directory of non-speech recordings.
        #[arg(long)]
        non_speech: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Label every frame of a WAV file as speech or non-speech.
    Classify {
        wav: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
        /// Print decisions as a JSON array.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the feature vectors of a WAV file as JSON.
    Extract {
        wav: PathBuf,
        /// Configuration file (defaults apply when absent).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration to PATH.
    InitConfig { path: PathBuf },
}

#[derive(Debug, clap::Args)]
struct CommonArgs {
    /// Configuration file (defaults apply when absent).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Model file, overriding the configured modelPath.
    #[arg(long)]
    model: Option<PathBuf>,
}

impl CommonArgs {
    fn resolve(&self) -> Result<VadConfig> {
        let mut config = read_config(self.config.as_deref())?;
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("melvad=info,melvad_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Train {
            speech,
            non_speech,
            common,
        } => train(&speech, &non_speech, &common),
        Command::Classify { wav, common, json } => classify(&wav, &common, json),
        Command::Extract { wav, config } => extract(&wav, config.as_deref()),
        Command::InitConfig { path } => {
            save_config(&path, &VadConfig::default())
                .with_context(|| format!("write config {}", path.display()))?;
            info!(path = %path.display(), "default configuration written");
            Ok(())
        }
    }
}

fn read_config(path: Option<&Path>) -> Result<VadConfig> {
    match path {
        Some(path) => load_config(path).with_context(|| format!("load config {}", path.display())),
        None => Ok(VadConfig::default()),
    }
}

fn train(speech: &Path, non_speech: &Path, common: &CommonArgs) -> Result<()> {
    let config = common.resolve()?;
    let model_path = config.model_path.clone();
    let mut vad = Vad::new(config).context("build detector")?;
    let report = vad
        .train(&[
            LabeledSource::speech(speech),
            LabeledSource::non_speech(non_speech),
        ])
        .context("train model")?;

    info!(
        files = report.files,
        examples = report.examples,
        model = %model_path.display(),
        "training complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn classify(wav: &Path, common: &CommonArgs, json: bool) -> Result<()> {
    let mut vad = Vad::new(common.resolve()?).context("build detector")?;
    vad.load_model().context("load model")?;
    let decisions = vad
        .classify_file(wav)
        .with_context(|| format!("classify {}", wav.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &decisions)?;
        writeln!(out)?;
    } else {
        for d in &decisions {
            writeln!(out, "{:>6} {:>10.1} ms  {}", d.index, d.start_ms, describe(d))?;
        }
    }

    let speech = decisions.iter().filter(|d| d.is_speech()).count();
    info!(frames = decisions.len(), speech, "classification complete");
    Ok(())
}

fn describe(decision: &FrameDecision) -> &'static str {
    if decision.is_speech() {
        "speech"
    } else {
        "non-speech"
    }
}

fn extract(wav: &Path, config: Option<&Path>) -> Result<()> {
    let config = read_config(config)?;
    let mut extractor = FeatureExtractor::new(config.features).context("build extractor")?;
    let mut stream =
        WavStream::open(wav).with_context(|| format!("open {}", wav.display()))?;
    let features = extractor
        .extract(&mut stream)
        .with_context(|| format!("extract {}", wav.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &features)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_train_arguments() {
        let cli = Cli::try_parse_from([
            "melvad",
            "train",
            "--speech",
            "s",
            "--non-speech",
            "n",
            "--model",
            "m.json",
        ])
        .unwrap();
        match cli.command {
            Command::Train {
                speech,
                non_speech,
                common,
            } => {
                assert_eq!(speech, PathBuf::from("s"));
                assert_eq!(non_speech, PathBuf::from("n"));
                assert_eq!(common.model, Some(PathBuf::from("m.json")));
                assert!(common.config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn model_flag_overrides_config() {
        let common = CommonArgs {
            config: None,
            model: Some(PathBuf::from("elsewhere.json")),
        };
        let config = common.resolve().unwrap();
        assert_eq!(config.model_path, PathBuf::from("elsewhere.json"));
    }
}
