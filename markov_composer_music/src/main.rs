// Markov Composer CLI entry point.
//
// Trains a Markov model on a note corpus (or the built-in melody), generates
// one part per instrument and writes the composition as JSON.
// The pipeline: load corpus -> train (or load model) -> generate -> write.
//
// Usage:
//   cargo run -p markov_composer_music --bin generate -- [corpus.json ...]
//     [--config FILE] [--order N] [--mode joint|independent] [--length N]
//     [--seed N] [--instruments A,B] [--ensemble NAME]
//     [--save-model FILE] [--load-model FILE] [--output FILE]
//
// Corpus files hold a JSON array of tracks. Progress goes to stdout when
// the composition is written to a file, and to stderr when the composition
// itself goes to stdout. Set RUST_LOG for library diagnostics.

use markov_composer_music::config::ComposerConfig;
use markov_composer_music::corpus::builtin_melody;
use markov_composer_music::error::{Error, Result};
use markov_composer_music::instrument::{Ensemble, PRESET_NAMES};
use markov_composer_music::model::{GenerationMode, TrainedModel};
use markov_composer_music::note::Track;
use markov_composer_music::pipeline::{Composition, compose, compose_parts, train, train_parts};
use markov_composer_prng::ComposerRng;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Flags that take a value; anything else not starting with `--` is a corpus file.
const VALUE_FLAGS: [&str; 10] = [
    "--config",
    "--order",
    "--mode",
    "--length",
    "--seed",
    "--instruments",
    "--ensemble",
    "--save-model",
    "--load-model",
    "--output",
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        if let Error::UnknownInstrument(_) = e {
            eprintln!("Known instruments: {}", PRESET_NAMES.join(", "));
        }
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let output: Option<PathBuf> = parse_flag::<String>(args, "--output")?.map(PathBuf::from);
    let to_file = output.is_some();
    let say = |line: String| {
        if to_file {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    };

    let config = build_config(args)?;
    let seed = config.seed.unwrap_or_else(clock_seed);

    say("=== Markov Composer ===".to_string());
    say(format!("Order: {}, mode: {:?}", config.order, config.mode));
    say(format!("Length: {} notes per part", config.length));
    say(format!("Instruments: {}", config.instruments.join(", ")));
    say(format!("Seed: {} (pass --seed {} to reproduce)", seed, seed));

    for flag in unknown_flags(args) {
        say(format!("Note: ignoring unknown option {}", flag));
    }

    say("[1/4] Preparing model...".to_string());
    let corpus = corpus_paths(args);
    let mut rng = ComposerRng::new(seed);
    let composition = match parse_flag::<String>(args, "--load-model")? {
        Some(path) => {
            say(format!("  Loading model from {}", path));
            let model = TrainedModel::load(Path::new(&path))?;
            if model.order() != config.order || model.mode() != config.mode {
                say(format!(
                    "  Note: loaded model is order {} {:?}, using it as is.",
                    model.order(),
                    model.mode()
                ));
            }
            if !corpus.is_empty() {
                say(format!(
                    "  Note: --load-model given, ignoring corpus files: {}",
                    corpus.join(", ")
                ));
            }
            if !config.voice_mappings.is_empty() {
                say("  Note: --load-model given, ignoring voice mappings.".to_string());
            }
            say(format!("  Vocabulary: {} distinct states", model.vocabulary().len()));
            save_model(args, &model, &say)?;

            say("[2/4] Generating parts...".to_string());
            compose(&model, &config, &mut rng)?
        }
        None => {
            let tracks = load_corpus(&corpus)?;
            let notes: usize = tracks.iter().map(|t| t.notes.len()).sum();
            say(format!("  Training on {} tracks ({} notes)", tracks.len(), notes));
            if config.voice_mappings.is_empty() {
                let model = train(&tracks, &config)?;
                say(format!("  Vocabulary: {} distinct states", model.vocabulary().len()));
                save_model(args, &model, &say)?;

                say("[2/4] Generating parts...".to_string());
                compose(&model, &config, &mut rng)?
            } else {
                let parts = train_parts(&tracks, &config)?;
                for (instrument, model) in &parts {
                    say(format!(
                        "  {}: {} distinct states",
                        instrument.name,
                        model.vocabulary().len()
                    ));
                }
                if parse_flag::<String>(args, "--save-model")?.is_some() {
                    say(
                        "  Note: voice mappings train one model per voice, not saving a model."
                            .to_string(),
                    );
                }

                say("[2/4] Generating parts...".to_string());
                compose_parts(&parts, &config, &mut rng)?
            }
        }
    };

    say("[3/4] Summary".to_string());
    summarize(&composition, &say);

    let json = serde_json::to_string_pretty(&composition)?;
    match &output {
        Some(path) => {
            say(format!("[4/4] Writing composition to {}...", path.display()));
            std::fs::write(path, json)?;
            say("  Done!".to_string());
        }
        None => {
            say("[4/4] Writing composition to stdout...".to_string());
            println!("{}", json);
        }
    }
    Ok(())
}

/// Config file (if any) with command-line overrides applied, validated.
fn build_config(args: &[String]) -> Result<ComposerConfig> {
    let mut config = match parse_flag::<String>(args, "--config")? {
        Some(path) => ComposerConfig::load(Path::new(&path))?,
        None => ComposerConfig::default(),
    };
    if let Some(order) = parse_flag(args, "--order")? {
        config.order = order;
    }
    if let Some(mode) = parse_flag::<String>(args, "--mode")? {
        config.mode = GenerationMode::parse(&mode)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown mode '{}'", mode)))?;
    }
    if let Some(length) = parse_flag(args, "--length")? {
        config.length = length;
    }
    if let Some(seed) = parse_flag(args, "--seed")? {
        config.seed = Some(seed);
    }
    if let Some(name) = parse_flag::<String>(args, "--ensemble")? {
        let ensemble = Ensemble::parse(&name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown ensemble '{}'", name)))?;
        config.instruments = ensemble.members().iter().map(|s| s.to_string()).collect();
    }
    if let Some(list) = parse_flag::<String>(args, "--instruments")? {
        config.instruments = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    config.validate()?;
    Ok(config)
}

fn load_corpus(paths: &[&str]) -> Result<Vec<Track>> {
    if paths.is_empty() {
        return Ok(vec![builtin_melody()]);
    }
    let mut tracks = Vec::new();
    for path in paths {
        let data = std::fs::read_to_string(path)?;
        let file_tracks: Vec<Track> = serde_json::from_str(&data)?;
        tracing::debug!(path, tracks = file_tracks.len(), "loaded corpus file");
        tracks.extend(file_tracks);
    }
    Ok(tracks)
}

fn summarize(composition: &Composition, say: &impl Fn(String)) {
    for part in &composition.parts {
        let pitches: Vec<u8> = part.pitches().into_iter().flatten().collect();
        let span = match (pitches.iter().min(), pitches.iter().max()) {
            (Some(lo), Some(hi)) => format!("{}..={}", lo, hi),
            _ => "rests only".to_string(),
        };
        say(format!(
            "  {}: {} notes, {:.1} beats, pitches {}, {} back-offs",
            part.instrument.name,
            part.notes.len(),
            part.beats(),
            span,
            part.report.backoffs
        ));
    }
}

fn save_model(args: &[String], model: &TrainedModel, say: &impl Fn(String)) -> Result<()> {
    if let Some(path) = parse_flag::<String>(args, "--save-model")? {
        model.save(Path::new(&path))?;
        say(format!("  Saved model to {}", path));
    }
    Ok(())
}

/// `--options` this tool does not know.
fn unknown_flags(args: &[String]) -> Vec<&str> {
    args.iter()
        .skip(1)
        .map(String::as_str)
        .filter(|a| a.starts_with("--") && !VALUE_FLAGS.contains(a))
        .collect()
}

/// Positional arguments: everything that is neither a flag nor a flag's value.
fn corpus_paths(args: &[String]) -> Vec<&str> {
    let mut paths = Vec::new();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with("--") {
            paths.push(arg.as_str());
        }
    }
    paths
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    let value = args
        .get(pos + 1)
        .ok_or_else(|| Error::InvalidConfig(format!("{} needs a value", flag)))?;
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::InvalidConfig(format!("bad value '{}' for {}", value, flag)))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("generate")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn flags_and_positionals_are_separated() {
        let a = args(&["a.json", "--order", "2", "b.json", "--mode", "independent"]);
        assert_eq!(corpus_paths(&a), vec!["a.json", "b.json"]);
        assert_eq!(parse_flag::<usize>(&a, "--order").unwrap(), Some(2));
        assert_eq!(parse_flag::<u64>(&a, "--seed").unwrap(), None);
        assert!(unknown_flags(&a).is_empty());
    }

    #[test]
    fn unknown_flags_are_reported() {
        let a = args(&["--lenght", "20", "--seed", "3", "--verbose"]);
        assert_eq!(unknown_flags(&a), vec!["--lenght", "--verbose"]);
        // The misspelled flag's value is treated as a corpus file.
        assert_eq!(corpus_paths(&a), vec!["20"]);
    }

    #[test]
    fn bad_flag_values_are_errors() {
        let a = args(&["--length", "many"]);
        assert!(parse_flag::<usize>(&a, "--length").is_err());
        let a = args(&["--seed"]);
        assert!(parse_flag::<u64>(&a, "--seed").is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let a = args(&[
            "--order",
            "2",
            "--mode",
            "independent",
            "--ensemble",
            "wind trio",
            "--seed",
            "11",
        ]);
        let config = build_config(&a).unwrap();
        assert_eq!(config.order, 2);
        assert_eq!(config.mode, GenerationMode::Independent);
        assert_eq!(config.instruments, vec!["Flute", "Clarinet", "Bassoon"]);
        assert_eq!(config.seed, Some(11));

        let a = args(&["--instruments", "Viola, Flute #2"]);
        let config = build_config(&a).unwrap();
        assert_eq!(config.instruments, vec!["Viola", "Flute #2"]);

        assert!(build_config(&args(&["--order", "5"])).is_err());
        assert!(build_config(&args(&["--mode", "fused"])).is_err());
    }
}
