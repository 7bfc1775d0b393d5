use std::process::Command;

fn main() {
    // Rerun if environment variables change
    println!("cargo:rerun-if-env-changed=PACKAGE_VERSION");
    println!("cargo:rerun-if-env-changed=BUILD_INFO");

    let build_info = generate_build_info();
    println!("cargo:rustc-env=BUILD_INFO={}", build_info);

    // Rerun if .git/HEAD changes
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs/heads");
}

/// Build identifier shown at startup and by the health endpoint.
/// Format: `<version>+build.<commits>.<hash>[-dirty]`, or `<version>+ci` from CI.
fn generate_build_info() -> String {
    let package_version =
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

    if let Ok(version) = std::env::var("PACKAGE_VERSION") {
        return format!("{}+ci", version);
    }

    let commit_count = get_commit_count().unwrap_or(0);
    let commit_hash = get_commit_hash().unwrap_or_else(|| "unknown".to_string());
    let dirty_suffix = if is_dirty() { "-dirty" } else { "" };

    format!(
        "{}+build.{}.{}{}",
        package_version, commit_count, commit_hash, dirty_suffix
    )
}

fn git_output(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
}

fn get_commit_count() -> Option<u32> {
    git_output(&["rev-list", "--count", "HEAD"]).and_then(|s| s.parse().ok())
}

fn get_commit_hash() -> Option<String> {
    git_output(&["rev-parse", "--short", "HEAD"])
}

fn is_dirty() -> bool {
    Command::new("git")
        .args(["diff", "--quiet"])
        .status()
        .map(|status| !status.success())
        .unwrap_or(false)
}
