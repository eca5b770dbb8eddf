//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::engine::{export_wav, AudioFormat};
use crate::pipeline::Analyzer;
use crate::report::TrackMetadata;

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Analyze a single file and print the report.
pub fn analyze(
    file: &Path,
    title: Option<String>,
    composer: Option<String>,
    config: Option<&Path>,
    as_json: bool,
    save_normalized: Option<&Path>,
) -> Result<()> {
    let analyzer = Analyzer::new(load_config(config)?)?;
    let track = TrackMetadata { title, composer };

    let source = analyzer.loader().read_source(file)?;
    let extension = file.extension().and_then(|e| e.to_str());
    let buffer = analyzer.loader().load_bytes(&source, extension)?;

    if let Some(out) = save_normalized {
        export_wav(&buffer, out)
            .with_context(|| format!("failed to write {}", out.display()))?;
        info!("Normalized audio written to {}", out.display());
    }

    let report = analyzer.analyze_loaded(buffer, &source, &track)?;

    if as_json {
        println!("{}", report.to_json_pretty()?);
    } else {
        println!("{}", report.summary());
    }

    Ok(())
}

/// Write vocal and instrumental stems next to each other in `out_dir`.
pub fn separate(file: &Path, out_dir: &Path, config: Option<&Path>) -> Result<()> {
    let analyzer = Analyzer::new(load_config(config)?)?;

    let buffer = analyzer.loader().load(file)?;
    let stems = analyzer.separator().separate(&buffer)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let vocals_path = out_dir.join(format!("{}_vocals.wav", stem));
    let instrumental_path = out_dir.join(format!("{}_instrumental.wav", stem));

    export_wav(&stems.vocals, &vocals_path)?;
    export_wav(&stems.instrumental, &instrumental_path)?;

    println!("Vocals:       {}", vocals_path.display());
    println!("Instrumental: {}", instrumental_path.display());

    Ok(())
}

/// Analyze every allow-listed file below `dir`.
///
/// Individual failures are reported and skipped; the command fails only if
/// the directory cannot be walked.
pub fn batch(dir: &Path, config: Option<&Path>, as_json: bool) -> Result<()> {
    let analyzer = Analyzer::new(load_config(config)?)?;

    let mut results = Vec::new();
    let mut failures = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_supported(path) {
            continue;
        }

        let track = TrackMetadata {
            title: path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
            composer: None,
        };

        match analyzer.analyze_file(path, &track) {
            Ok(report) => {
                if !as_json {
                    println!(
                        "{}  {:>6.1} BPM  {:<9} {:<18} market {:.1}",
                        path.display(),
                        report.features.features.tempo,
                        report.theory.key,
                        report.features.mood.to_string(),
                        report.scores.market_score
                    );
                }
                results.push(json!({ "path": path.display().to_string(), "report": report }));
            }
            Err(e) => {
                failures += 1;
                warn!("Skipping {}: {}", path.display(), e);
                if !as_json {
                    println!("{}  FAILED: {}", path.display(), e.friendly_message());
                }
                results.push(json!({
                    "path": path.display().to_string(),
                    "error": { "code": e.error_code(), "message": e.friendly_message() }
                }));
            }
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!();
        println!(
            "{} file(s) analyzed, {} failed",
            results.len() - failures,
            failures
        );
    }

    Ok(())
}

/// Print the effective configuration.
pub fn show_config(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Some(Path::new("/nonexistent/songscope.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/songscope.json"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sample_rate": 44100}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.frame_size, AnalysisConfig::default().frame_size);
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a/b/song.WAV")));
        assert!(is_supported(Path::new("song.mp3")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_analyze_saves_normalized_copy() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("tone.wav");
        let normalized = dir.path().join("tone_normalized.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for i in 0..44100 * 3 {
            let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.4;
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        analyze(&input, None, None, None, true, Some(&normalized)).unwrap();

        let reader = hound::WavReader::open(&normalized).unwrap();
        assert_eq!(reader.spec().sample_rate, 22050);
        let peak = reader
            .into_samples::<f32>()
            .map(|s| s.unwrap().abs())
            .fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_skips_bad_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.wav"), b"not really audio").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert!(batch(dir.path(), None, true).is_ok());
    }
}
