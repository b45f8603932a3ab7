//! Example: read frames straight from a capture device
//!
//! Needs capture privileges.
//!
//! Run with: sudo cargo run --example basic_capture -- eth0

use enceladus_capture::{CaptureConfig, CaptureSource, PcapSource};
use enceladus_core::PipelineConfig;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let device = std::env::args().nth(1).unwrap_or_else(|| "eth0".to_string());
    let source = PcapSource::open(&CaptureConfig::from_pipeline(&PipelineConfig::for_device(&device)))?;
    println!("Capturing on {} ({}), 20 frames or 10 seconds", device, source.link_type());

    let frames = source.frames()?;
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    for n in 1..=20 {
        tokio::select! {
            _ = &mut deadline => break,
            next = frames.next() => match next {
                Some(Ok(frame)) => println!(
                    "[{}] {} bytes on the wire, {} captured",
                    n,
                    frame.len(),
                    frame.data().len()
                ),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }

    drop(frames);
    println!("{}", source.stats()?);
    source.close();
    Ok(())
}
