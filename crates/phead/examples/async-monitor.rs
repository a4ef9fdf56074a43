//! Async host using `PheadCodec` with tokio's framed streams.
//!
//! Starts a simulated head on a background thread, then talks to it through
//! `FramedRead` / `FramedWrite`:
//!   cargo run --example async-monitor --features peer,async

use std::sync::atomic::AtomicBool;
use std::thread;

use futures_util::{SinkExt, StreamExt};
use phead::frame::category::{general, print};
use phead::frame::{Category, Command, PheadCodec, Response};
use phead::peer::DeviceListener;
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("phead-async-{}", std::process::id()));
    std::fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("head.sock");

    let listener = DeviceListener::bind(&sock_path)?;
    let device = thread::spawn(move || {
        let mut session = listener.accept()?;
        session.run(&AtomicBool::new(true))
    });

    let stream = UnixStream::connect(&sock_path).await?;
    let (rx, tx) = stream.into_split();
    let mut responses = FramedRead::new(rx, PheadCodec::host());
    let mut requests = FramedWrite::new(tx, PheadCodec::host());

    let script = [
        Command::Ping,
        Command::invoke(Category::General, general::DESCRIPTION, &[]),
        Command::invoke(Category::Print, print::SET_SPEED, &12u16.to_le_bytes()),
        Command::invoke(Category::Temperature, 0x01, &[]),
    ];

    for command in script {
        let label = command.describe();
        requests.send(command).await?;
        let Some(frame) = responses.next().await.transpose()? else {
            eprintln!("device closed the link");
            break;
        };
        match Response::from_frame(&frame)? {
            Response::Ok(payload) => println!("{label}: ok {:02X?}", &payload[..]),
            Response::Error(code) => println!("{label}: {code}"),
        }
    }

    drop(requests);
    drop(responses);
    let stats = device.join().map_err(|_| "device thread panicked")??;
    println!("device served {} requests", stats.requests);
    let _ = std::fs::remove_dir_all(&sock_dir);
    Ok(())
}
