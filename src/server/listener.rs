//! Listening socket and port selection.
//!
//! - a configured port is bound as is
//! - port `0` in a debug build binds [`DEBUG_PORT`]
//! - port `0` in a release build picks a random port from the ephemeral
//!   range and re-rolls while the port is taken

use anyhow::{Result, anyhow};
use rand::Rng;
use std::io;
use std::net::TcpListener;
use std::ops::RangeInclusive;

/// Fixed port used by debug builds.
pub const DEBUG_PORT: u16 = 64132;

/// IANA dynamic/private port range.
pub const EPHEMERAL_PORTS: RangeInclusive<u16> = 49152..=65535;

/// Maximum random port attempts
const MAX_PORT_RETRIES: u16 = 32;

/// Bind the style server socket according to the configured port.
pub fn bind(configured: u16) -> Result<(TcpListener, u16)> {
    match configured {
        0 if cfg!(debug_assertions) => bind_exact(DEBUG_PORT),
        0 => bind_random(&mut rand::thread_rng(), MAX_PORT_RETRIES),
        port => bind_exact(port),
    }
}

fn bind_exact(port: u16) -> Result<(TcpListener, u16)> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|e| anyhow!("Failed to bind style server on port {}: {}", port, e))?;
    Ok((listener, port))
}

/// Try random ephemeral ports until one binds.
fn bind_random(rng: &mut impl Rng, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error: Option<io::Error> = None;

    for _ in 0..max_retries {
        let port = rng.gen_range(EPHEMERAL_PORTS);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                crate::debug!("server"; "port {} unavailable: {}", port, e);
                last_error = Some(e);
            }
        }
    }

    Err(anyhow!(
        "Failed to bind style server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Whether something already listens on `port`.
///
/// Probed by trying to bind it.
pub fn port_in_use(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_bind_random_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let (listener, port) = bind_random(&mut rng, MAX_PORT_RETRIES).unwrap();

        assert!(EPHEMERAL_PORTS.contains(&port));
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_bind_random_rerolls_taken_port() {
        // the first port this seed picks is already taken
        let first = StdRng::seed_from_u64(11).gen_range(EPHEMERAL_PORTS);
        let Ok(_holder) = TcpListener::bind(("127.0.0.1", first)) else {
            return;
        };

        let mut rng = StdRng::seed_from_u64(11);
        let (_listener, port) = bind_random(&mut rng, MAX_PORT_RETRIES).unwrap();
        assert_ne!(port, first);
    }

    #[test]
    fn test_bind_exact_conflict() {
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        assert!(port_in_use(port));
        assert!(bind(port).is_err());
    }

    #[test]
    fn test_bind_configured_port() {
        let port = {
            let probe = TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let (listener, bound) = bind(port).unwrap();
        assert_eq!(bound, port);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }
}
