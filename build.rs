use std::process::Command;

fn main() {
    let date = chrono::Utc::now().format("%Y-%m-%d").to_string();

    // Short commit hash when building from a checkout, "release" otherwise
    let commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "release".to_string());

    println!(
        "cargo:rustc-env=RING_LONG_VERSION={} ({} {})",
        env!("CARGO_PKG_VERSION"),
        commit,
        date
    );
    println!("cargo:rerun-if-changed=.git/HEAD");
}
