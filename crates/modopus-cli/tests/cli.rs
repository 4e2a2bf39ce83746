use assert_cmd::Command;
use std::error::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Write a minimal 4-channel ProTracker module: one looping sample, 4 rows at speed 1.
fn write_test_module<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn Error>> {
    let mut data = vec![0u8; 1084];
    data[..8].copy_from_slice(b"cli test");
    data[20..24].copy_from_slice(b"bass");
    data[42..44].copy_from_slice(&16u16.to_be_bytes()); // length in words
    data[45] = 48; // volume
    data[48..50].copy_from_slice(&16u16.to_be_bytes()); // loop length in words
    data[950] = 1;
    data[1080..1084].copy_from_slice(b"M.K.");

    let mut pattern = vec![0u8; 64 * 16];
    pattern[..4].copy_from_slice(&[0x11, 0xAC, 0x00, 0x00]); // C-2, sample 16 (empty)
    pattern[4..8].copy_from_slice(&[0x00, 0xD6, 0x10, 0x00]); // C-3, sample 1
    pattern[8..12].copy_from_slice(&[0x00, 0x00, 0x0F, 0x01]); // speed 1
    pattern[3 * 16 + 12..3 * 16 + 16].copy_from_slice(&[0x00, 0x00, 0x0D, 0x00]);
    data.extend_from_slice(&pattern);
    data.extend((0..32).map(|i| if i < 16 { 0x40u8 } else { 0xC0 }));
    fs::write(path, data)?;
    Ok(())
}

#[test]
fn help_exits_successfully() -> Result<(), Box<dyn Error>> {
    let output = Command::cargo_bin("modopus")?.arg("--help").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("--framesize"));
    assert!(stdout.contains("windowed sinc"));
    Ok(())
}

#[test]
fn missing_inputs_is_a_usage_error() -> Result<(), Box<dyn Error>> {
    let output = Command::cargo_bin("modopus")?.output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr)?.contains("Usage"));
    Ok(())
}

#[test]
fn invalid_options_exit_with_one() -> Result<(), Box<dyn Error>> {
    let cases: [&[&str]; 5] = [
        &["--bogus", "a.mod"],
        &["--framesize", "30", "a.mod"],
        &["--repeat-count", "-1", "a.mod"],
        &["--interpolation", "-3", "a.mod"],
        &["--samplerate", "0", "a.mod"],
    ];
    for args in cases {
        let output = Command::cargo_bin("modopus")?.args(args).output()?;
        assert_eq!(output.status.code(), Some(1), "args: {args:?}");
    }
    Ok(())
}

#[test]
fn supported_lists_formats() -> Result<(), Box<dyn Error>> {
    let output = Command::cargo_bin("modopus")?.arg("--supported").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("Current supported formats are:"));
    let formats = lines.next().ok_or("no format list")?;
    assert!(formats.split(';').any(|ext| ext == "mod"));
    Ok(())
}

#[test]
fn transcodes_module_next_to_input() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("song.mod");
    write_test_module(&input)?;

    let output = Command::cargo_bin("modopus")?
        .args(["--auto-comment", "--title", "Renamed"])
        .arg(&input)
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Play count:     0 + 1 times"));
    let written = fs::read(dir.path().join("song.opus"))?;
    assert!(written.starts_with(b"OggS"));
    assert!(written.windows(13).any(|w| w == b"title=Renamed"));
    Ok(())
}

#[test]
fn per_file_failures_do_not_change_exit_code() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let good = dir.path().join("good.mod");
    write_test_module(&good)?;
    let unsupported = dir.path().join("notes.txt");
    fs::write(&unsupported, "hello")?;

    let output = Command::cargo_bin("modopus")?
        .arg("-q")
        .arg(&unsupported)
        .arg(dir.path().join("missing.mod"))
        .arg(&good)
        .output()?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(dir.path().join("good.opus").is_file());
    assert!(!String::from_utf8(output.stderr)?.is_empty());
    Ok(())
}

#[test]
fn output_dir_must_exist() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("song.mod");
    write_test_module(&input)?;

    let output = Command::cargo_bin("modopus")?
        .arg("-o")
        .arg(dir.path().join("nowhere"))
        .arg(&input)
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("song.opus").exists());
    Ok(())
}

#[test]
fn dry_run_writes_nothing() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("song.mod");
    write_test_module(&input)?;

    let output = Command::cargo_bin("modopus")?
        .args(["--dry-run", "--print-metadata"])
        .arg(&input)
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("title:\"cli test\""));
    assert!(!dir.path().join("song.opus").exists());
    Ok(())
}
