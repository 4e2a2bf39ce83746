//! modopus: render tracker modules and encode them to Ogg Opus.
//!
//! For every input the module is rendered to stereo PCM, tagged with the
//! requested comments and written next to the input (or into `-o DIR`) as
//! `<name>.opus`. A file that fails is logged and skipped; the exit code only
//! reports whether the options themselves were usable.

mod cli;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use modopus::TranscodePipeline;
use modopus::encode::OggOpusEngine;
use modopus::report;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_logging(args.quiet);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet {
        "warn"
    } else {
        "warn,modopus=info,modopus_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(args: &cli::Args) -> Result<ExitCode> {
    let decoders = modopus::decode::default_engine();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.supported {
        report::print_supported(&mut out, decoders.as_ref()).context("print supported formats")?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.inputs.is_empty() {
        let usage = cli::Args::command().render_usage();
        eprintln!("{usage}");
        return Ok(ExitCode::FAILURE);
    }

    let config = args.to_config()?;
    let pipeline = TranscodePipeline::new(&config, decoders.as_ref(), &OggOpusEngine);
    pipeline.run(&args.inputs, &mut out)?;
    out.flush().context("flush stdout")?;
    Ok(ExitCode::SUCCESS)
}
