use chrono::Utc;

fn main() {
    // Build timestamp reported by /api/health
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=RECIPEBOOK_BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-changed=build.rs");
}
