use std::process::Command;

pub fn main() {
    // Set SAPI_GIT_HASH
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_default();
    println!("cargo:rustc-env=SAPI_GIT_HASH={git_hash}");
    println!("cargo:rerun-if-changed=build.rs");
}
