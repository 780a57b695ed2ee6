//! `sfpack` command-line tool: GeoJSON in, sfpack bytes out, and back.

mod geojson;
mod stats;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sfpack::{
    AttributeMode, CollectionLayout, CoordEncoding, CursorChaining, DEFAULT_SRID, EncodeOptions,
    decode_framed, encode_with_options,
};

#[derive(Parser, Debug)]
#[command(name = "sfpack", version, about = "Quantized binary encoding for GeoJSON")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a GeoJSON file
    Encode {
        /// Input GeoJSON, `-` for stdin
        input: PathBuf,

        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Decode an sfpack file to GeoJSON
    Decode {
        /// Input file, `-` for stdin
        input: PathBuf,

        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Report encoded sizes and coordinate error for a GeoJSON file
    Stats {
        /// Input GeoJSON, `-` for stdin
        input: PathBuf,

        #[command(flatten)]
        codec: CodecArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct CodecArgs {
    /// Spatial reference id; read from the `crs` member, else 4326
    #[arg(long)]
    srid: Option<u32>,

    /// Quantization scale; 10000000 for geographic SRIDs, else 100
    #[arg(long)]
    scale: Option<i64>,

    /// Store plain f64 coordinates
    #[arg(long)]
    float: bool,

    /// Drop properties, ids and extensions
    #[arg(long)]
    bare: bool,

    /// Restart the delta cursor at every collection element
    #[arg(long)]
    per_element: bool,

    /// Write collections as one chunk per element
    #[arg(long)]
    chunked: bool,
}

impl CodecArgs {
    fn options(&self, value: &Value) -> Result<EncodeOptions> {
        let srid = self
            .srid
            .or_else(|| geojson::srid_from_crs(value))
            .unwrap_or(DEFAULT_SRID);
        let scale = self.scale.unwrap_or_else(|| geojson::default_scale(srid));

        let mut options = EncodeOptions::new(srid, scale)
            .with_context(|| format!("invalid scale {scale}"))?;
        if self.float {
            options = options.coords(CoordEncoding::Float);
        }
        if self.bare {
            options = options.attributes(AttributeMode::Bare);
        }
        if self.per_element {
            options = options.chaining(CursorChaining::PerElement);
        }
        if self.chunked {
            options = options.layout(CollectionLayout::Chunked);
        }
        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn read_geojson(path: &Path) -> Result<Value> {
    let bytes = read_input(path)?;
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not JSON", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Encode {
            input,
            output,
            codec,
        } => {
            let value = read_geojson(&input)?;
            let options = codec.options(&value)?;
            let document = geojson::parse_document(&value)?;
            let bytes = encode_with_options(&document, options)
                .with_context(|| format!("failed to encode {}", document.type_name()))?;
            info!(
                kind = document.type_name(),
                srid = options.frame.srid,
                scale = options.frame.scale.get(),
                bytes = bytes.len(),
                "encoded"
            );
            write_output(output.as_deref(), &bytes)
        }
        Command::Decode {
            input,
            output,
            compact,
        } => {
            let bytes = read_input(&input)?;
            let (document, frame) = decode_framed(&bytes)
                .with_context(|| format!("failed to decode {}", input.display()))?;
            info!(
                kind = document.type_name(),
                srid = frame.srid,
                scale = frame.scale.get(),
                "decoded"
            );
            let value = geojson::document_to_json(&document, frame.srid)?;
            let mut text = if compact {
                serde_json::to_vec(&value)?
            } else {
                serde_json::to_vec_pretty(&value)?
            };
            text.push(b'\n');
            write_output(output.as_deref(), &text)
        }
        Command::Stats { input, codec } => {
            let value = read_geojson(&input)?;
            let options = codec.options(&value)?;
            let document = geojson::parse_document(&value)?;
            let report = stats::size_report(&value, &document, options)?;
            let mut text = serde_json::to_vec_pretty(&report)?;
            text.push(b'\n');
            write_output(None, &text)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_options_from_crs() {
        let cli = Cli::parse_from(["sfpack", "encode", "in.json", "--per-element", "--chunked"]);
        let Command::Encode { codec, .. } = cli.command else {
            panic!("expected encode");
        };
        let value = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::28992" } },
            "features": []
        });
        let options = codec.options(&value).unwrap();
        assert_eq!(options.frame.srid, 28992);
        assert_eq!(options.frame.scale.get(), 100);
        assert_eq!(options.chaining, CursorChaining::PerElement);
        assert_eq!(options.layout, CollectionLayout::Chunked);
    }

    #[test]
    fn test_explicit_flags_win() {
        let cli = Cli::parse_from([
            "sfpack", "-v", "stats", "in.json", "--srid", "3857", "--scale", "1000", "--float",
        ]);
        assert_eq!(cli.verbose, 1);
        let Command::Stats { codec, .. } = cli.command else {
            panic!("expected stats");
        };
        let options = codec.options(&json!({ "type": "Point" })).unwrap();
        assert_eq!(options.frame.srid, 3857);
        assert_eq!(options.frame.scale.get(), 1000);
        assert_eq!(options.coords, CoordEncoding::Float);
    }

    #[test]
    fn test_rejects_bad_scale() {
        let cli = Cli::parse_from(["sfpack", "encode", "in.json", "--scale", "0"]);
        let Command::Encode { codec, .. } = cli.command else {
            panic!("expected encode");
        };
        assert!(codec.options(&json!({})).is_err());
    }
}
