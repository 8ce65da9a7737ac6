// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Network association wait
//!
//! Startup cannot continue until the device has joined the network.  Rather
//! than wait forever, [`wait_for_association`] checks an
//! [`AssociationProvider`] a bounded number of times and reports
//! [`Error::AssociationTimeout`] if the network never comes up, leaving the
//! caller to decide what to do (the firmware resets).

use core::future::Future;
use embedded_hal_async::delay::DelayNs;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::Error;
use crate::config::AssociationPolicy;

/// Something that can report whether the device has joined the network.
pub trait AssociationProvider {
    /// Returns `true` once the device is associated and ready to serve.
    fn is_associated(&mut self) -> impl Future<Output = bool>;
}

/// Waits for `provider` to report association, checking up to
/// `policy.max_attempts` times, `policy.poll_interval_ms` apart.
///
/// Returns:
/// - `Ok(attempts)` - the number of checks made, including the successful one
/// - `Err(Error::AssociationTimeout)` if every check failed
pub async fn wait_for_association<A, D>(
    provider: &mut A,
    delay: &mut D,
    policy: &AssociationPolicy,
) -> Result<u32, Error>
where
    A: AssociationProvider,
    D: DelayNs,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        if provider.is_associated().await {
            debug!("Ok:    Network associated after {attempt} attempt(s)");
            return Ok(attempt);
        }
        trace!("Info:  Network not associated, attempt {attempt}/{attempts}");

        if attempt < attempts {
            delay.delay_ms(policy.poll_interval_ms).await;
        }
    }

    warn!("Error: Network not associated after {attempts} attempts");
    Err(Error::AssociationTimeout { attempts })
}
