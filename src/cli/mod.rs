//! CLI Module
//!
//! Command-line front end for Songscope. It plays the part of the calling
//! application: it hands files and track details to the analysis pipeline
//! and prints the resulting reports.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Songscope - musical quality reports for audio recordings
#[derive(Parser, Debug)]
#[command(name = "songscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Analysis configuration file (JSON); missing fields use defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one audio file and print its report
    #[command(name = "analyze")]
    Analyze {
        /// WAV or MP3 file
        file: PathBuf,

        /// Track title
        #[arg(short, long)]
        title: Option<String>,

        /// Composer name
        #[arg(long)]
        composer: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also write the normalized mono audio to this WAV file
        #[arg(long)]
        save_normalized: Option<PathBuf>,
    },

    /// Split a file into vocal and instrumental WAV stems
    #[command(name = "separate")]
    Separate {
        /// WAV or MP3 file
        file: PathBuf,

        /// Directory for the stems
        #[arg(short, long)]
        out_dir: PathBuf,
    },

    /// Analyze every WAV/MP3 file below a directory
    #[command(name = "batch")]
    Batch {
        /// Directory to scan recursively
        dir: PathBuf,

        /// Print one JSON document with all results
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    #[command(name = "config")]
    Config,
}
