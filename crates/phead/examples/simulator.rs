//! Simulated print head: serves hosts on a Unix socket until Ctrl-C.
//!
//! Run with:
//!   cargo run --example simulator --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- describe --socket /tmp/phead-sim-<pid>/head.sock

use std::fs;
use std::sync::atomic::AtomicBool;
use std::thread;

use phead::peer::{DeviceListener, DeviceProfile, PowerMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("phead-sim-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("head.sock");

    // A battery-powered head, so battery reads answer.
    let profile = DeviceProfile {
        power_mode: PowerMode::Battery,
        battery_level: 3700,
        ..DeviceProfile::default()
    };
    let listener = DeviceListener::bind(&sock_path)?.with_profile(&profile)?;
    eprintln!("Simulating {} on {}", profile.model, sock_path.display());

    loop {
        let mut session = listener.accept()?;
        eprintln!("Host connected: {}", session.id());
        thread::spawn(move || match session.run(&AtomicBool::new(true)) {
            Ok(stats) => eprintln!(
                "{} closed after {} requests ({} errors)",
                session.id(),
                stats.requests,
                stats.error_responses
            ),
            Err(e) => eprintln!("{} failed: {e}", session.id()),
        });
    }
}
