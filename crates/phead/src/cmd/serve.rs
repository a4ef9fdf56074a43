use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use phead_peer::{DeviceProfile, SessionConfig};

use crate::cmd::ServeArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let profile = match &args.profile {
        Some(path) => DeviceProfile::load(path).map_err(|err| peer_error("profile", err))?,
        None => DeviceProfile::default(),
    };
    let session_config = SessionConfig {
        idle_timeout: args.idle_timeout,
        ..SessionConfig::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if let Some(port) = &args.serial {
        return serve_serial(port, args.baud, &profile, session_config, &running);
    }
    match &args.socket {
        Some(path) => serve_socket(path, &profile, session_config, args.count, running),
        None => Err(CliError::usage(
            "nothing to serve on: use --socket or --serial (or set PHEAD_SOCKET)",
        )),
    }
}

#[cfg(unix)]
fn serve_socket(
    path: &std::path::Path,
    profile: &DeviceProfile,
    session_config: SessionConfig,
    count: Option<usize>,
    running: Arc<AtomicBool>,
) -> CliResult<i32> {
    let listener = phead_peer::DeviceListener::bind(path)
        .and_then(|listener| listener.with_profile(profile))
        .map_err(|err| peer_error("bind failed", err))?
        .with_session_config(session_config);
    tracing::info!(
        path = %listener.path().display(),
        model = %profile.model,
        "print head simulator listening"
    );

    let mut sessions = Vec::new();
    let mut accepted = 0usize;
    while running.load(Ordering::SeqCst) {
        let mut session = listener
            .accept()
            .map_err(|err| peer_error("accept failed", err))?;
        accepted += 1;
        reap_finished(&mut sessions);
        let running = running.clone();
        sessions.push(std::thread::spawn(move || {
            match session.run(&running) {
                Ok(stats) => tracing::info!(
                    session = session.id(),
                    requests = stats.requests,
                    errors = stats.error_responses,
                    dropped = stats.dropped_frames,
                    "session closed"
                ),
                Err(err) => tracing::warn!(session = session.id(), %err, "session failed"),
            }
        }));

        if count.is_some_and(|count| accepted >= count) {
            break;
        }
    }

    for handle in sessions {
        join_session(handle);
    }
    Ok(SUCCESS)
}

/// Join and drop the handles of sessions that have already ended.
fn reap_finished(sessions: &mut Vec<JoinHandle<()>>) {
    let mut i = 0;
    while i < sessions.len() {
        if sessions[i].is_finished() {
            join_session(sessions.swap_remove(i));
        } else {
            i += 1;
        }
    }
}

fn join_session(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("session thread panicked");
    }
}

#[cfg(not(unix))]
fn serve_socket(
    _path: &std::path::Path,
    _profile: &DeviceProfile,
    _session_config: SessionConfig,
    _count: Option<usize>,
    _running: Arc<AtomicBool>,
) -> CliResult<i32> {
    Err(CliError::usage("--socket needs Unix domain sockets"))
}

#[cfg(feature = "serial")]
fn serve_serial(
    port: &str,
    baud: u32,
    profile: &DeviceProfile,
    session_config: SessionConfig,
    running: &AtomicBool,
) -> CliResult<i32> {
    use phead_peer::{DeviceSession, Dispatcher};

    let stream = phead_transport::serial::open(port, baud, session_config.poll_interval)
        .map_err(|err| crate::exit::transport_error("serial open failed", err))?;
    tracing::info!(port, baud, model = %profile.model, "print head simulator on serial port");

    let mut session =
        DeviceSession::from_stream(stream, Dispatcher::from_profile(profile), session_config)
            .map_err(|err| peer_error("session setup failed", err))?
            .with_id(port);
    let stats = session
        .run(running)
        .map_err(|err| peer_error("session failed", err))?;
    tracing::info!(requests = stats.requests, "serial session closed");
    Ok(SUCCESS)
}

#[cfg(not(feature = "serial"))]
fn serve_serial(
    _port: &str,
    _baud: u32,
    _profile: &DeviceProfile,
    _session_config: SessionConfig,
    _running: &AtomicBool,
) -> CliResult<i32> {
    Err(CliError::usage(
        "--serial needs a build with the `serial` feature",
    ))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
