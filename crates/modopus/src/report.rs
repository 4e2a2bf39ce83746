//! User-facing output: the settings banner and introspection listings.

use std::io::{self, Write};
use std::path::Path;

use crate::decode::{DecodeEngine, ModuleDecoder, join_list};
use crate::settings::RenderSettings;

/// Per-file settings banner, shown unless running quietly.
pub fn print_settings(
    out: &mut dyn Write,
    input: &str,
    output: &Path,
    settings: &RenderSettings,
    auto_comment: bool,
) -> io::Result<()> {
    writeln!(out, "Input:          {input}")?;
    writeln!(out, "Output:         {}", output.display())?;
    writeln!(out, "Channels:       {}", settings.channels())?;
    writeln!(out, "Sample rate:    {} Hz", settings.sample_rate())?;
    writeln!(out, "Frame size:     {} ms", settings.frame_duration())?;
    writeln!(out, "Play count:     {} + 1 times", settings.repeat_count())?;
    writeln!(out, "Gain:           {} mB", settings.gain_millibel())?;
    writeln!(out, "Interpolation:  {}", settings.interpolation())?;
    writeln!(out, "Auto comments:  {}", if auto_comment { "yes" } else { "no" })?;
    writeln!(out)
}

/// Every metadata key with its value, as `key:"value"`.
///
/// Keys the module fails to answer are logged and skipped.
pub fn print_metadata(out: &mut dyn Write, module: &dyn ModuleDecoder) -> io::Result<()> {
    writeln!(out, "Printing metadata:")?;
    for key in module.metadata_keys() {
        match module.metadata(&key) {
            Ok(value) => writeln!(out, "{key}:\"{}\"", value.unwrap_or_default())?,
            Err(e) => tracing::warn!(key = %key, error = %e, "metadata unavailable"),
        }
    }
    Ok(())
}

pub fn print_subsongs(out: &mut dyn Write, module: &dyn ModuleDecoder) -> io::Result<()> {
    writeln!(out, "Printing subsong data:")?;
    for (index, name) in module.subsong_names().iter().enumerate() {
        writeln!(out, "{index}: {name}")?;
    }
    Ok(())
}

pub fn print_supported(out: &mut dyn Write, engine: &dyn DecodeEngine) -> io::Result<()> {
    writeln!(out, "Current supported formats are:")?;
    writeln!(out, "{}", join_list(&engine.supported_extensions()))
}
