// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - WebSocket listener tasks

use alloc::string::ToString;
use alloc::vec::Vec;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::with_timeout;
use embedded_io_async::Write;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use airsense_ws::{
    CLOSE_NORMAL, Frame, HandshakeError, Opcode, decode, encode, encode_close, parse_upgrade,
    reject_response, upgrade_response,
};

use crate::error::{AirsenseError, ErrorKind};
use crate::ws::{
    HANDSHAKE_TIMEOUT, ListenerEvent, MAX_LISTENERS, MAX_MESSAGE_LOG_LEN, RECORDS,
    WS_FRAME_BUF_SIZE, WS_HEADER_BUF_SIZE, WS_TASK_TCP_RX_BUF_SIZE, WS_TASK_TCP_TX_BUF_SIZE,
};

// Whether to keep a connection open after handling a frame.
enum Flow {
    Continue,
    Close,
}

/// Serves a single WebSocket connection at a time.
struct Listener {
    id: usize,
    header_buf: [u8; WS_HEADER_BUF_SIZE],
    frame_buf: [u8; WS_FRAME_BUF_SIZE],
    out: Vec<u8>,
}

impl Listener {
    fn new(id: usize) -> Self {
        Self {
            id,
            header_buf: [0; WS_HEADER_BUF_SIZE],
            frame_buf: [0; WS_FRAME_BUF_SIZE],
            out: Vec::new(),
        }
    }

    // Performs the upgrade handshake.  Returns the number of bytes that
    // followed the request, which have been moved to the start of the frame
    // buffer.
    async fn handshake(&mut self, socket: &mut TcpSocket<'_>) -> Result<usize, AirsenseError> {
        let id = self.id;
        let mut total_read = 0;
        loop {
            if total_read >= WS_HEADER_BUF_SIZE {
                info!("ws:    Listener {id} upgrade request too large");
                let error = HandshakeError::Malformed;
                socket.write_all(reject_response(&error).as_bytes()).await?;
                socket.flush().await?;
                return Err(AirsenseError::Airsense(ErrorKind::TooLarge));
            }

            let n = match with_timeout(
                HANDSHAKE_TIMEOUT,
                socket.read(&mut self.header_buf[total_read..]),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => return Err(AirsenseError::Airsense(ErrorKind::Timeout)),
            };
            if n == 0 {
                debug!("ws:    Listener {id} client dropped connection");
                return Err(AirsenseError::Airsense(ErrorKind::Network));
            }
            total_read += n;

            match parse_upgrade(&self.header_buf[..total_read]) {
                Ok(upgrade) => {
                    debug!("ws:    Listener {id} upgrading {}", upgrade.path);
                    let response = upgrade_response(upgrade.key);
                    let header_len = upgrade.header_len;
                    socket.write_all(response.as_bytes()).await?;
                    socket.flush().await?;

                    let pending = total_read - header_len;
                    self.frame_buf[..pending]
                        .copy_from_slice(&self.header_buf[header_len..total_read]);
                    return Ok(pending);
                }
                Err(HandshakeError::Incomplete) => continue,
                Err(e) => {
                    info!("ws:    Listener {id} rejected upgrade: {e}");
                    socket.write_all(reject_response(&e).as_bytes()).await?;
                    socket.flush().await?;
                    return Err(e.into());
                }
            }
        }
    }

    // Forwards records to the client and handles its frames until either
    // side closes the connection.
    async fn serve(
        &mut self,
        socket: &mut TcpSocket<'_>,
        mut pending: usize,
    ) -> Result<(), AirsenseError> {
        let mut records = RECORDS
            .subscriber()
            .map_err(|_| AirsenseError::Airsense(ErrorKind::NoSubscriber))?;

        loop {
            // Handle every complete frame already received
            loop {
                let (frame, used) = match decode(&self.frame_buf[..pending]) {
                    Ok(Some(decoded)) => decoded,
                    Ok(None) => break,
                    Err(e) => {
                        info!("ws:    Listener {} protocol error: {e}", self.id);
                        self.send_close(socket, e.close_code()).await?;
                        return Err(e.into());
                    }
                };
                self.frame_buf.copy_within(used..pending, 0);
                pending -= used;

                if let Flow::Close = self.handle_frame(socket, frame).await? {
                    return Ok(());
                }
            }

            let event = select(
                records.next_message_pure(),
                socket.read(&mut self.frame_buf[pending..]),
            )
            .await;
            match event {
                Either::First(record) => {
                    self.send(socket, Opcode::Text, record.as_bytes()).await?;
                }
                Either::Second(result) => {
                    let n = result?;
                    if n == 0 {
                        debug!("ws:    Listener {} client closed connection", self.id);
                        return Ok(());
                    }
                    pending += n;
                }
            }
        }
    }

    async fn handle_frame(
        &mut self,
        socket: &mut TcpSocket<'_>,
        frame: Frame,
    ) -> Result<Flow, AirsenseError> {
        let id = self.id;
        match frame.opcode {
            Opcode::Text => {
                let text = frame
                    .text_prefix(MAX_MESSAGE_LOG_LEN)
                    .unwrap_or("<invalid utf-8>");
                ListenerEvent::Message {
                    id,
                    text: text.to_string(),
                }
                .notify();
            }
            Opcode::Binary | Opcode::Continuation => {
                debug!(
                    "ws:    Listener {id} ignoring {:?} frame of {} bytes",
                    frame.opcode,
                    frame.payload.len()
                );
            }
            Opcode::Ping => {
                trace!("ws:    Listener {id} ping");
                self.send(socket, Opcode::Pong, &frame.payload).await?;
            }
            Opcode::Pong => trace!("ws:    Listener {id} pong"),
            Opcode::Close => {
                let code = frame.close_code().unwrap_or(CLOSE_NORMAL);
                debug!("ws:    Listener {id} client sent close {code}");
                self.send_close(socket, code).await?;
                return Ok(Flow::Close);
            }
        }
        Ok(Flow::Continue)
    }

    async fn send(
        &mut self,
        socket: &mut TcpSocket<'_>,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<(), AirsenseError> {
        self.out.clear();
        encode(opcode, payload, &mut self.out);
        socket.write_all(&self.out).await?;
        socket.flush().await?;
        Ok(())
    }

    async fn send_close(
        &mut self,
        socket: &mut TcpSocket<'_>,
        code: u16,
    ) -> Result<(), AirsenseError> {
        self.out.clear();
        encode_close(code, &mut self.out);
        socket.write_all(&self.out).await?;
        socket.flush().await?;
        Ok(())
    }
}

/// Starts the WebSocket listener tasks on `port`.
pub(crate) fn start(stack: Stack<'static>, port: u16, spawner: &Spawner) {
    for id in 0..MAX_LISTENERS {
        spawner.must_spawn(task(id, stack, port));
    }
}

#[embassy_executor::task(pool_size = MAX_LISTENERS)]
async fn task(id: usize, stack: Stack<'static>, port: u16) -> ! {
    info!("Exec:  WebSocket listener {id} task started on port {port}");

    let mut rx_buffer = [0; WS_TASK_TCP_RX_BUF_SIZE];
    let mut tx_buffer = [0; WS_TASK_TCP_TX_BUF_SIZE];
    let mut listener = Listener::new(id);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);

        if let Err(e) = socket.accept(port).await {
            warn!("ws:    Listener {id} accept error: {e:?}");
            continue;
        }
        let remote = socket.remote_endpoint();
        trace!("ws:    Listener {id} accepted {remote:?}");

        match listener.handshake(&mut socket).await {
            Ok(pending) => {
                ListenerEvent::Connected { id, remote }.notify();
                if let Err(e) = listener.serve(&mut socket, pending).await {
                    debug!("ws:    Listener {id} connection ended: {e}");
                }
                ListenerEvent::Disconnected { id }.notify();
            }
            Err(e) => debug!("ws:    Listener {id} handshake failed: {e}"),
        }

        // Explicitly close the socket once the connection has ended
        socket.close();
    }
}
