//! SSVEP demo: synthetic recording, band table and 40 Hz detection.
//!
//! Run with: cargo run -p eegspec-analysis --example ssvep_demo

use eegspec_analysis::{ChannelSelection, SsvepParams, SyntheticEeg, detect_ssvep};
use eegspec_core::ChannelRead;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recording = SyntheticEeg::default().generate()?;
    println!(
        "=== Synthetic recording: {} channels, {:.0} s at {} Hz ===\n",
        recording.channel_count(),
        recording.duration(),
        recording.sample_rate()
    );

    let channels = ChannelSelection::Default.gather(&recording)?;
    let report = detect_ssvep(&channels, recording.sample_rate(), &SsvepParams::default())?;

    println!("{:>8} {:>10} {:>10} {:>8}", "Channel", "Peak (Hz)", "SNR (dB)", "Tier");
    println!("{:->8} {:->10} {:->10} {:->8}", "", "", "", "");
    for d in &report.detections {
        let snr = d.snr_db.map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        println!(
            "{:>8} {:>10.3} {:>10} {:>8}",
            d.channel, d.peak_frequency, snr, d.confidence
        );
    }

    println!("\nBest channel: {}", report.best_channel.as_deref().unwrap_or("none"));
    if let Some(pca) = &report.pca {
        println!("PC1 explains {:.1}% of variance", pca.explained_variance_ratio[0] * 100.0);
    }

    println!("\n=== Relative band power ===\n");
    for ch in &report.bands {
        let cells: Vec<String> = ch
            .powers
            .bands
            .iter()
            .map(|b| format!("{}={:.2}", b.name, b.relative.unwrap_or(0.0)))
            .collect();
        println!("{:>8}  {}", ch.channel, cells.join("  "));
    }
    Ok(())
}
