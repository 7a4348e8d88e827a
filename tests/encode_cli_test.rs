use std::path::Path;
use std::process::Command;

use echolink_relay::codec::TxCodec;
use echolink_relay::segment::{split, Segment};

const SIGNED_TX: &str = "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

fn encode_cli(config: &Path, args: &[&str]) -> Vec<String> {
    let output = Command::new(env!("CARGO_BIN_EXE_echolink-encode"))
        .env_clear()
        .env("ECHOLINK_CONFIG", config)
        .args(args)
        .arg(SIGNED_TX)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn write_config(dir: &Path, toml: &str) -> std::path::PathBuf {
    let path = dir.join("echolink.toml");
    std::fs::write(&path, toml).unwrap();
    path
}

#[test]
fn test_segment_size_comes_from_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), "[protocol]\nmax_segment_size = 40\n");

    let bodies = encode_cli(&config, &[]);
    let payload = TxCodec::default().encode(SIGNED_TX).unwrap();
    let expected: Vec<String> = split(payload.as_str(), 40)
        .unwrap()
        .iter()
        .map(Segment::to_wire)
        .collect();

    assert!(bodies.len() > 1);
    assert_eq!(bodies, expected);
}

#[test]
fn test_flag_overrides_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), "[protocol]\nmax_segment_size = 40\n");

    let bodies = encode_cli(&config, &["--max-segment-size", "1000"]);
    let payload = TxCodec::default().encode(SIGNED_TX).unwrap();

    assert_eq!(bodies, vec![payload.into_string()]);
}
