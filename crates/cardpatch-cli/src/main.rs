mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cardpatch_core::{CONFIG_FILE, Config, Strategy};
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use commands::hex_utils::{parse_hex_address, parse_offset};
use commands::{EXIT_FAILURE, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "cardpatch")]
#[command(version, about = "Patch CARD data inside Unity AssetBundles")]
struct Args {
    #[arg(short, long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Offset of the blob's u64 total-size field when its header is not recognized (hex with 0x)
    #[arg(long, value_parser = parse_offset, global = true)]
    size_field_offset: Option<usize>,

    /// Lower bound of the metadata size-field search when the header is not recognized (hex with 0x)
    #[arg(long, value_parser = parse_offset, global = true)]
    metadata_start: Option<usize>,

    /// Treat the bundle as a bare serialized file
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the original asset bytes with the new asset inside a bundle
    Patch {
        original_bundle: PathBuf,
        original_asset: PathBuf,
        new_asset: PathBuf,
        output_bundle: PathBuf,
        /// Only consider entries with this name or path
        expected_entry_name: Option<String>,

        #[arg(long, default_value = "auto")]
        strategy: Strategy,

        /// Skip re-opening the output after saving
        #[arg(long)]
        no_verify: bool,

        /// String that must survive in the output (repeatable)
        #[arg(long = "marker")]
        markers: Vec<String>,
    },
    /// Replace a whole entry selected by container path or object name
    Rebuild {
        #[arg(long)]
        bundle: PathBuf,
        #[arg(long)]
        asset: PathBuf,
        /// Exact entry path
        #[arg(long)]
        container: Option<String>,
        /// Entry name
        #[arg(long)]
        object: Option<String>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Show header fields and entries of a bundle
    Inspect {
        bundle: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Find where an asset sits inside a bundle without patching
    Locate {
        bundle: PathBuf,
        original_asset: PathBuf,
        #[arg(long, default_value = "auto")]
        strategy: Strategy,
        #[arg(long)]
        entry: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Hexdump a file or one entry of a bundle
    Hexdump {
        file: PathBuf,
        /// Dump this entry's payload instead of the file
        #[arg(long)]
        entry: Option<String>,
        /// Start offset (hex)
        #[arg(long, value_parser = parse_hex_address, default_value = "0")]
        offset: u64,
        #[arg(long, default_value = "256")]
        size: usize,
        #[arg(long)]
        ascii: bool,
    },
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = load_config(&args);
    let is_rebuild = matches!(args.command, Command::Rebuild { .. });
    let result = match args.command {
        Command::Patch {
            original_bundle,
            original_asset,
            new_asset,
            output_bundle,
            expected_entry_name,
            strategy,
            no_verify,
            markers,
        } => commands::patch::run(
            &commands::patch::PatchPaths {
                original_bundle,
                original_asset,
                new_asset,
                output_bundle,
            },
            expected_entry_name,
            strategy,
            !no_verify,
            markers,
            &config,
            args.raw,
        ),
        Command::Rebuild {
            bundle,
            asset,
            container,
            object,
            output,
        } => commands::rebuild::run(&bundle, &asset, container, object, &output, args.raw),
        Command::Inspect { bundle, json } => commands::inspect::run(&bundle, json, args.raw),
        Command::Locate {
            bundle,
            original_asset,
            strategy,
            entry,
            json,
        } => commands::locate::run(
            &bundle,
            &original_asset,
            strategy,
            entry,
            json,
            &config,
            args.raw,
        ),
        Command::Hexdump {
            file,
            entry,
            offset,
            size,
            ascii,
        } => commands::hexdump::run(&file, entry.as_deref(), offset, size, ascii, args.raw),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!("{:#}", e);
            let code = if is_rebuild {
                commands::rebuild::exit_code(&e)
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("cardpatch={}", level).parse()?)
                .add_directive(format!("cardpatch_core={}", level).parse()?),
        )
        .init();
    Ok(())
}

/// Config file with command-line profile overrides applied
fn load_config(args: &Args) -> Config {
    let mut config = Config::load_or_default(&args.config);
    if let Some(offset) = args.size_field_offset {
        config.profile.size_field_offset = offset;
    }
    if let Some(start) = args.metadata_start {
        config.profile.metadata_start = start;
    }
    debug!(
        "Profile: size field at 0x{:X}, metadata from 0x{:X}",
        config.profile.size_field_offset, config.profile.metadata_start
    );
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_arguments() {
        let args = Args::try_parse_from([
            "cardpatch",
            "patch",
            "in.bundle",
            "old.bytes",
            "new.bytes",
            "out/patched.bundle",
            "CAB-5d8e3c",
            "--strategy",
            "size-tolerant",
            "--marker",
            "CARD_Name",
            "--marker",
            "CARD_Desc",
            "--metadata-start",
            "0x20",
        ])
        .unwrap();

        assert_eq!(args.metadata_start, Some(0x20));
        let Command::Patch {
            expected_entry_name,
            strategy,
            no_verify,
            markers,
            ..
        } = args.command
        else {
            panic!("expected patch command");
        };
        assert_eq!(expected_entry_name.as_deref(), Some("CAB-5d8e3c"));
        assert_eq!(strategy, Strategy::SizeTolerant);
        assert!(!no_verify);
        assert_eq!(markers, vec!["CARD_Name", "CARD_Desc"]);
    }

    #[test]
    fn test_patch_requires_four_paths() {
        let err = Args::try_parse_from(["cardpatch", "patch", "in.bundle", "old.bytes"])
            .err()
            .unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_rebuild_arguments() {
        let args = Args::try_parse_from([
            "cardpatch",
            "rebuild",
            "--bundle",
            "a.bundle",
            "--asset",
            "card.bytes",
            "--object",
            "CARD",
            "--output",
            "b.bundle",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Rebuild { object: Some(ref o), container: None, .. } if o == "CARD"
        ));
    }

    #[test]
    fn test_unknown_strategy_is_usage_error() {
        assert!(
            Args::try_parse_from(["cardpatch", "locate", "a", "b", "--strategy", "fuzzy"]).is_err()
        );
    }

    #[test]
    fn test_profile_overrides() {
        let args = Args::try_parse_from([
            "cardpatch",
            "--config",
            "/no/such/cardpatch.toml",
            "--size-field-offset",
            "0x10",
            "inspect",
            "a.bundle",
        ])
        .unwrap();
        let config = load_config(&args);
        assert_eq!(config.profile.size_field_offset, 0x10);
        assert_eq!(config.profile.metadata_start, 0x30);
    }
}
