//! echolink-encode: turn a signed transaction into the SMS bodies to send.

use std::io::Read;

use anyhow::{bail, Context, Result};

use echolink_relay::config::RelayConfig;
use echolink_relay::segment::split;

fn print_usage() {
    println!("echolink-encode - encode a signed transaction for SMS transport");
    println!();
    println!("Usage:");
    println!("  echolink-encode [options] <signed-tx-hex>");
    println!("  echolink-encode [options] < signed-tx.hex");
    println!();
    println!("Prints one SMS body per line, in sending order. Segment size,");
    println!("compression and hex prefix come from the relay config file");
    println!("($ECHOLINK_CONFIG or ./echolink.toml) when one exists.");
    println!();
    println!("Options:");
    println!("  --max-segment-size <n>   Characters per SMS (overrides the config)");
    println!("  --stats                  Print payload size to stderr");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut max_segment_size: Option<usize> = None;
    let mut show_stats = false;
    let mut tx_hex: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--max-segment-size" => {
                i += 1;
                max_segment_size = Some(
                    args.get(i)
                        .context("--max-segment-size requires a value")?
                        .parse()
                        .context("--max-segment-size must be a number")?,
                );
            }
            "--stats" => show_stats = true,
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other if tx_hex.is_none() => tx_hex = Some(other.to_string()),
            other => bail!("unexpected argument: {other}"),
        }
        i += 1;
    }

    let tx_hex = match tx_hex {
        Some(hex) => hex,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read transaction from stdin")?;
            input
        }
    };

    let tx_hex = tx_hex.trim();
    if tx_hex.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    let config = RelayConfig::load().context("failed to load configuration")?;
    let max_segment_size = max_segment_size.unwrap_or(config.protocol.max_segment_size);

    let payload = config
        .codec()
        .encode(tx_hex)
        .context("not a signed transaction hex string")?;
    let segments = split(payload.as_str(), max_segment_size).context("failed to split payload")?;

    if show_stats {
        eprintln!(
            "{} hex chars -> {} payload chars -> {} SMS",
            tx_hex.trim_start_matches("0x").len(),
            payload.char_len(),
            segments.len()
        );
    }

    for segment in &segments {
        println!("{}", segment.to_wire());
    }
    Ok(())
}
