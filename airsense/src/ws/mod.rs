// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - WebSocket listener server
//!
//! [`MAX_LISTENERS`] listener tasks each accept one connection at a time on
//! the station's port.  Records reach them through the [`RECORDS`] pub/sub
//! channel, and they report what their connections do through the
//! [`EVENTS`] channel, which the poll loop drains when it services the
//! [`WsBroadcaster`].

use alloc::string::{String, ToString};
use embassy_net::IpEndpoint;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::PubSubChannel;
use embassy_time::Duration;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_assertions::const_assert;

use airsense_core::Broadcaster;

pub(crate) mod server;

pub(crate) use server::start;

// Number of listener tasks, and so of simultaneous connections.
pub(crate) const MAX_LISTENERS: usize = 4;

// Records queued per subscriber before the oldest is dropped.
const RECORD_QUEUE_DEPTH: usize = 4;

// Listener events queued between two services of the broadcaster.
const EVENT_QUEUE_DEPTH: usize = 16;

// Time allowed for a client to send its upgrade request.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// Inbound text messages are logged up to this many bytes.
const MAX_MESSAGE_LOG_LEN: usize = 128;

// Buffer sizes for the listener tasks
const WS_TASK_TCP_RX_BUF_SIZE: usize = 1536;
const WS_TASK_TCP_TX_BUF_SIZE: usize = 1024;
const WS_HEADER_BUF_SIZE: usize = 1024;
// Largest frame header is 14 bytes
const WS_FRAME_BUF_SIZE: usize = airsense_ws::MAX_PAYLOAD + 14;

// Bytes following the upgrade request are moved to the frame buffer
const_assert!(WS_FRAME_BUF_SIZE >= WS_HEADER_BUF_SIZE);

/// Records to send to every connected listener.
pub(crate) static RECORDS: PubSubChannel<
    CriticalSectionRawMutex,
    String,
    RECORD_QUEUE_DEPTH,
    MAX_LISTENERS,
    1,
> = PubSubChannel::new();

/// Connection events from the listener tasks.
pub(crate) static EVENTS: Channel<CriticalSectionRawMutex, ListenerEvent, EVENT_QUEUE_DEPTH> =
    Channel::new();

/// What a listener task's connection did.
#[derive(Debug, Clone)]
pub(crate) enum ListenerEvent {
    Connected {
        id: usize,
        remote: Option<IpEndpoint>,
    },
    Message {
        id: usize,
        text: String,
    },
    Disconnected {
        id: usize,
    },
}

impl ListenerEvent {
    // Queues the event for the poll loop, dropping it if the queue is full.
    pub(crate) fn notify(self) {
        if let Err(e) = EVENTS.try_send(self) {
            debug!("ws:    Event queue full, dropped {:?}", e);
        }
    }
}

/// [`Broadcaster`] over the listener tasks.
pub(crate) struct WsBroadcaster {
    listeners: usize,
}

impl WsBroadcaster {
    pub(crate) fn new() -> Self {
        Self { listeners: 0 }
    }

    fn handle(&mut self, event: ListenerEvent) {
        match event {
            ListenerEvent::Connected { id, remote } => {
                self.listeners += 1;
                match remote {
                    Some(remote) => info!("ws:    Listener {id} connected from {remote}"),
                    None => info!("ws:    Listener {id} connected"),
                }
                debug!("Info:  {} listener(s) connected", self.listeners);
            }
            ListenerEvent::Message { id, text } => {
                info!("ws:    Listener {id} sent: {text}");
            }
            ListenerEvent::Disconnected { id } => {
                self.listeners = self.listeners.saturating_sub(1);
                info!("ws:    Listener {id} disconnected");
                debug!("Info:  {} listener(s) connected", self.listeners);
            }
        }
    }
}

impl Broadcaster for WsBroadcaster {
    async fn broadcast(&mut self, record: &str) {
        if self.listeners == 0 {
            trace!("Info:  No listeners connected");
        }
        RECORDS
            .immediate_publisher()
            .publish_immediate(record.to_string());
    }

    async fn service(&mut self) {
        while let Ok(event) = EVENTS.try_receive() {
            self.handle(event);
        }
    }
}
