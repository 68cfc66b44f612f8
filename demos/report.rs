//! Print the state of a Riden PSU, or flash its firmware.
//!
//! ```text
//! cargo run --example report -- [PORT] [FIRMWARE]
//! ```
//!
//! Set `RUST_LOG=debug` to see every register transaction.

use std::{
    env,
    error::Error,
    fs,
    io::{self, Write},
};

use inquire::Select;
use riden_psu::{
    bootloader::BootloaderClient,
    config::{BootloaderConfig, SerialConfig},
    psu::RidenPsu,
    serial::SerialPortLink,
    transport::RtuMaster,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get serial port from command line arg or interactive selection
    let mut args = env::args().skip(1);
    let port_name = match args.next() {
        Some(port_name) => port_name,
        None => select_port()?,
    };
    println!("Using port: {}", port_name);

    let config = SerialConfig::new(port_name);
    match args.next() {
        Some(firmware) => flash(config, &firmware),
        None => report(config),
    }
}

fn select_port() -> Result<String, Box<dyn Error>> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        return Err("No serial ports found!".into());
    }

    let port_names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    Ok(Select::new("Select a serial port:", port_names).prompt()?)
}

fn report(config: SerialConfig) -> Result<(), Box<dyn Error>> {
    let unit_id = config.unit_id;
    let mut psu = RidenPsu::connect(RtuMaster::new(SerialPortLink::new(config), unit_id))?;

    let info = *psu.info();
    println!(
        "Product model: {} (id {}), serial {}, firmware {}",
        psu.profile().model,
        info.id,
        info.serial(),
        info.firmware
    );

    let state = psu.refresh()?;
    println!("{:#?}", state);
    match state.clock.to_datetime() {
        Some(datetime) => println!("Device clock: {}", datetime),
        None => println!("Device clock is not set"),
    }
    Ok(())
}

fn flash(config: SerialConfig, firmware: &str) -> Result<(), Box<dyn Error>> {
    let image = fs::read(firmware)?;
    let unit_id = config.unit_id;
    let mut client =
        BootloaderClient::new(SerialPortLink::new(config), unit_id, BootloaderConfig::default());

    client.enter()?;
    println!("Device found: {}", client.query_info()?);

    client.flash(&image, |sent, total| {
        print!("\rFlashing firmware... {sent}/{total} bytes");
        let _ = io::stdout().flush();
    })?;
    println!("\nDone");
    Ok(())
}
