//! Device listing command

use crate::DeviceArgs;
use anyhow::Result;
use luma_gpu::{choose_device, list_devices, selector_for};

pub fn run(args: DeviceArgs) -> Result<()> {
    let devices = list_devices();
    if devices.is_empty() {
        println!("No compute devices found");
        return Ok(());
    }

    let config = args.config();
    let selector = selector_for(&config);
    let chosen = choose_device(&devices, selector.as_ref()).ok();

    for device in &devices {
        let marker = if Some(device.index) == chosen { "*" } else { " " };
        println!(
            "{marker} [{}] {} ({:?}, {})",
            device.index, device.name, device.kind, device.platform
        );
    }

    match chosen {
        Some(index) => println!("\nSelected: [{index}] ({})", selector.describe()),
        None => println!("\nNo device matches: {}", selector.describe()),
    }
    Ok(())
}
