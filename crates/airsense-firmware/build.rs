//! Bakes WiFi and upload credentials from `.env` into the firmware image.
//!
//! Values already present in the build environment win over `.env`.
//! Missing values are compiled in as empty strings, which the station treats
//! as "run offline".

const KEYS: [&str; 3] = ["AIRSENSE_SSID", "AIRSENSE_PASSWORD", "AIRSENSE_AUTH_HEADER"];

fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
