use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "hybridnet-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn stat_line(stdout: &str) -> Option<&str> {
    stdout.lines().find(|line| line.starts_with("sink_rx_bytes="))
}

#[test]
fn hybrid_lan_writes_all_artifacts_into_the_working_dir() {
    let dir = unique_temp_dir("cli-default");

    let output = Command::new(env!("CARGO_BIN_EXE_hybrid_lan"))
        .current_dir(&dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("run hybrid_lan");
    assert!(
        output.status.success(),
        "hybrid_lan failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    // 默认 --verbose true 输出应用层日志
    assert!(stdout.contains("PacketSink 收到数据"), "app logs missing");
    let line = stat_line(&stdout).expect("summary line");
    assert!(
        line.starts_with("sink_rx_bytes=102400 source_tx_bytes=102400 "),
        "unexpected summary: {line}"
    );

    for name in [
        "hybrid-lan.tr",
        "hybrid-lan-6-0.pcap",
        "hybrid-lan-7-1.pcap",
        "hybrid-lan.flowmon.json",
    ] {
        let meta = fs::metadata(dir.join(name)).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(meta.len() > 0, "{name} is empty");
    }

    let raw = fs::read_to_string(dir.join("hybrid-lan.flowmon.json")).expect("read flowmon");
    let v: Value = serde_json::from_str(&raw).expect("parse flowmon");
    let flows = v
        .get("flows")
        .and_then(|f| f.as_array())
        .expect("flows must be an array");
    let data = flows
        .iter()
        .find(|f| {
            f["five_tuple"]["src"] == "10.1.3.5"
                && f["five_tuple"]["dst"] == "10.1.2.5"
                && f["five_tuple"]["dst_port"] == 50
        })
        .expect("station to host flow");
    let tx = data["stats"]["tx_packets"].as_u64().expect("tx_packets");
    let rx = data["stats"]["rx_packets"].as_u64().expect("rx_packets");
    assert!(rx > 0 && rx <= tx, "rx={rx} tx={tx}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn hybrid_lan_without_stations_reports_the_failing_step() {
    let dir = unique_temp_dir("cli-no-wifi");

    let output = Command::new(env!("CARGO_BIN_EXE_hybrid_lan"))
        .current_dir(&dir)
        .args(["--nWifi", "0"])
        .output()
        .expect("run hybrid_lan");
    assert!(!output.status.success(), "nWifi=0 must fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("flow driver"), "stderr={stderr}");
    assert!(stat_line(&String::from_utf8_lossy(&output.stdout)).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn hybrid_lan_accepts_quiet_mode_and_smaller_lan() {
    let dir = unique_temp_dir("cli-quiet");

    let output = Command::new(env!("CARGO_BIN_EXE_hybrid_lan"))
        .current_dir(&dir)
        .env_remove("RUST_LOG")
        .args(["--verbose", "false", "--nCsma", "4", "--nWifi", "2"])
        .output()
        .expect("run hybrid_lan");
    assert!(
        output.status.success(),
        "hybrid_lan failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    // 静默模式下不输出应用层日志
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("PacketSink 收到数据"), "app logs leaked");
    assert!(stat_line(&stdout).is_some());

    let _ = fs::remove_dir_all(&dir);
}
