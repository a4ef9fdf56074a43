//! Drives a simulated head through a typical print job from the host side.
//!
//! The device runs on a thread over an in-process socket pair, so this needs
//! nothing else running:
//!   cargo run --example host-session --features peer

use std::sync::atomic::AtomicBool;
use std::thread;

use phead::peer::{DeviceSession, Dispatcher, HostConfig, HostLink, PeerError, SessionConfig};
use phead::transport::LinkStream;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host_end, device_end) = LinkStream::pair()?;

    let device = thread::spawn(move || -> Result<(), PeerError> {
        let mut session =
            DeviceSession::from_stream(device_end, Dispatcher::default(), SessionConfig::default())?;
        let stats = session.run(&AtomicBool::new(true))?;
        eprintln!("device: served {} requests", stats.requests);
        Ok(())
    });

    let mut host = HostLink::from_stream(host_end, HostConfig::default())?;

    let rtt = host.ping()?;
    println!("ping: {:.2}ms", rtt.as_secs_f64() * 1000.0);

    let descriptor = host.describe()?;
    println!(
        "device: {} fw {} hw {}",
        descriptor.model,
        phead::peer::Descriptor::version_string(descriptor.firmware_version),
        phead::peer::Descriptor::version_string(descriptor.hardware_version)
    );

    host.init_with(0x20, 8, 0)?;
    host.calibrate(0x20)?;
    host.start_print(0)?;
    host.refill()?;
    host.stop_print()?;

    match host.read_battery() {
        Ok(level) => println!("battery: {level}"),
        Err(PeerError::Device(code)) => println!("battery: refused with {code}"),
        Err(e) => return Err(e.into()),
    }

    host.shutdown()?;
    drop(host);

    device.join().map_err(|_| "device thread panicked")??;
    Ok(())
}
