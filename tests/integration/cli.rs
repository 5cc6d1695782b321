// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration tests for the `mcast` binary: exit codes and banners.

use std::io::{BufRead, BufReader};
use std::net::UdpSocket;
use std::process::{Command, Output, Stdio};

use crate::common::free_port;

fn mcast(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mcast"))
        .args(args)
        .output()
        .expect("failed to run mcast")
}

#[test]
fn test_send_prints_banner_and_exits_cleanly() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = receiver.local_addr().unwrap().port().to_string();
    let output = mcast(&[
        "send", "--group", "127.0.0.1", "--port", &port, "--max", "2", "--interval", "10",
    ]);

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(&format!("Sending from host-chosen-address to 127.0.0.1:{}", port)),
        "{}",
        stdout
    );

    let mut buf = [0u8; 64];
    let len = receiver.recv(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"This is test number: 1");
}

#[test]
fn test_send_banner_echoes_source_and_block() {
    let port = free_port().to_string();
    let output = mcast(&[
        "send",
        "--group",
        "127.0.0.8/30",
        "--port",
        &port,
        "--interface-ip",
        "127.0.0.1:0",
        "--max",
        "1",
    ]);

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains(&format!("Sending from 127.0.0.1:0 to 127.0.0.8/30:{}", port)));
}

#[test]
fn test_send_to_closed_port_is_a_runtime_failure() {
    let port = free_port().to_string();
    let output = mcast(&[
        "send", "--group", "127.0.0.1", "--port", &port, "--max", "5", "--interval", "20",
    ]);

    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("refused"), "{}", stderr);
    assert!(stderr.contains("1 failed"), "{}", stderr);
}

#[test]
fn test_receive_banner_names_host_chosen_interface() {
    let port = free_port().to_string();
    let mut child = Command::new(env!("CARGO_BIN_EXE_mcast"))
        .args(["receive", "--group", "127.0.0.1", "--port", &port])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to run mcast");

    let mut line = String::new();
    BufReader::new(child.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    child.kill().unwrap();
    child.wait().unwrap();

    assert_eq!(
        line.trim_end(),
        format!("Listening on 127.0.0.1:{} interface: host-chosen", port)
    );
}

#[test]
fn test_bad_prefix_is_a_configuration_failure() {
    let output = mcast(&["send", "--group", "239.1.1.0/40"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("send.group"));
}

#[test]
fn test_short_padding_is_a_configuration_failure() {
    let port = free_port().to_string();
    let output = mcast(&[
        "send", "--group", "127.0.0.1", "--port", &port, "--padding", "4", "--max", "1",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_too_many_listeners_is_a_configuration_failure() {
    let output = mcast(&["receive", "--group", "127.0.0.0/8", "--port", "5050"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unsupported_options_are_rejected() {
    let output = mcast(&["query", "--play-nice"]);
    assert_eq!(output.status.code(), Some(2));

    let output = mcast(&["join", "--group", "239.1.1.0/30"]);
    assert_eq!(output.status.code(), Some(2));

    let output = mcast(&["leave", "--igmp-version", "1"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_usage_errors() {
    let output = mcast(&["--log-level", "loud", "send"]);
    assert_eq!(output.status.code(), Some(2));

    let output = mcast(&["send", "--ttl", "256"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_file_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mcast.json5");
    let port = free_port();
    std::fs::write(
        &path,
        format!(
            "{{ send: {{ group: '127.0.0.2', port: {}, max: 1, text: 'from file' }} }}",
            port
        ),
    )
    .unwrap();

    let output = mcast(&["--config", path.to_str().unwrap(), "send"]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains(&format!("to 127.0.0.2:{}", port)));

    std::fs::write(&path, "{ send: ").unwrap();
    let output = mcast(&["--config", path.to_str().unwrap(), "send"]);
    assert_eq!(output.status.code(), Some(2));
}
