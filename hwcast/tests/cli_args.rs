//! CLI arg parsing tests for hwcast (client)
use assert_cmd::Command;

#[test]
fn help_mentions_short_and_long_flags() {
    let out = Command::cargo_bin("hwcast")
        .unwrap()
        .arg("--help")
        .output()
        .expect("run hwcast --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for flag in ["--status", "-s", "--count", "-n", "--fresh", "--timeout"] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn non_websocket_url_is_rejected() {
    let out = Command::cargo_bin("hwcast")
        .unwrap()
        .arg("http://127.0.0.1:8888/")
        .output()
        .expect("run hwcast");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unsupported scheme"));
}

#[test]
fn fresh_requires_status() {
    Command::cargo_bin("hwcast")
        .unwrap()
        .args(["--fresh", "127.0.0.1:1"])
        .assert()
        .code(2);
}

#[test]
fn unreachable_agent_exits_nonzero() {
    // Grab a free port and release it so nothing is listening there.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    Command::cargo_bin("hwcast")
        .unwrap()
        .arg(format!("127.0.0.1:{port}"))
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(1);
}
