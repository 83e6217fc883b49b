//! Build script for nftprobe
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! surfaced through `nftprobe --version`.

fn main() {
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
