// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Broadcast to listeners

use core::future::Future;

/// Fans records out to every connected listener.
///
/// Delivery is best effort.  There is no acknowledgement, and listeners that
/// connect after a record was sent never see it.
pub trait Broadcaster {
    /// Sends `record` to all currently connected listeners.
    fn broadcast(&mut self, record: &str) -> impl Future<Output = ()>;

    /// Processes pending listener events (connects, disconnects, inbound
    /// messages).  Called once per poll cycle, after [`Self::broadcast`].
    fn service(&mut self) -> impl Future<Output = ()>;
}
