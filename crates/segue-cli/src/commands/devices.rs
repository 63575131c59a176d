//! Audio output device listing command.

use clap::Args;
use segue_io::backend::AudioBackend;
use segue_io::cpal_backend::CpalBackend;

#[derive(Args)]
pub struct DevicesArgs {}

pub fn run(_args: DevicesArgs) -> anyhow::Result<()> {
    let backend = CpalBackend::new();
    let devices = backend.list_devices()?;

    if devices.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }

    println!("Output Devices ({})", backend.name());
    println!("==============\n");
    for (idx, device) in devices.iter().enumerate() {
        let default = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, default
        );
    }
    println!();
    println!("Tip: pass a partial name with --output:");
    println!("  segue play <track> --output \"USB\"");
    Ok(())
}
