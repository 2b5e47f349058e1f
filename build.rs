// GeigerCounter - Build Script
//
// Propagates the ESP-IDF environment and stamps the firmware version.

use std::process::Command;

fn main() {
    // ESP-IDF environment setup (device builds only)
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    // Get git version info
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=VERSION_STRING=GeigerCounter v{}-g{}", version, git_hash);

    // Credentials are baked in at build time
    for key in [
        "GEIGER_DEPLOYMENT",
        "GEIGER_WIFI_SSID",
        "GEIGER_WIFI_PASSWORD",
        "GEIGER_MQTT_USER",
        "GEIGER_MQTT_API_KEY",
        "GEIGER_CHANNEL_ID",
        "GEIGER_CHANNEL_WRITE_KEY",
    ] {
        println!("cargo:rerun-if-env-changed={}", key);
    }

    // Rebuild if git HEAD changes
    println!("cargo:rerun-if-changed=.git/HEAD");
}
