use log::{debug, trace, warn};

use crate::frame::{self, Header, HeaderVariant};
use crate::ring_buffer::RingBuffer;
use crate::{Error, Interface};

/// Number of send attempts before [`Node::send_data`] gives up.
pub const DEFAULT_RETRANSMIT: u8 = 2;

/// If EOF does not arrive within this time, the frame is discarded. [ms]
pub const DEFAULT_RX_MSG_TIMEOUT_MS: u32 = 300;
/// Budget for pushing one composed frame out through the peripheral. [ms]
pub const DEFAULT_TX_MSG_TIMEOUT_MS: u32 = 300;
/// The peer must answer a `send_data` within this time. [ms]
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 300;

/// Stable numeric codes reported through the debug callback. Every value
/// matches what external log consumers already key on; none is fatal.
pub mod debug_code {
    /// The receive callback produced no byte inside the interrupt.
    pub const RX_BYTE_FAILED: u8 = 1;
    /// Receive ring buffer overrun; the buffer was flushed.
    pub const RX_BUFFER_OVERRUN: u8 = 2;
    /// Transmit requested with nothing framed.
    pub const TX_NOTHING_TO_SEND: u8 = 10;
    /// The peripheral rejected a byte.
    pub const TX_BYTE_FAILED: u8 = 11;
    /// A whole frame did not go out within the transmit timeout.
    pub const TX_FRAME_TIMEOUT: u8 = 12;
    /// No response arrived within the response timeout.
    pub const RESPONSE_TIMEOUT: u8 = 60;
    /// Frame transmission failed inside `send_data`.
    pub const TX_UNSUCCESSFUL: u8 = 61;
    /// Composed frame would exceed the maximum frame size.
    pub const FRAME_TOO_BIG: u8 = 62;
    /// The peer answered with an error status (failed CRC on its side).
    pub const ERROR_STATUS_RECEIVED: u8 = 63;
    /// An inbound frame was still in progress when `send_data` was called
    /// and did not complete within the response timeout.
    pub const BUSY_LINE_TIMEOUT: u8 = 64;
    /// Response frame transmission failed.
    pub const RESPONSE_TX_FAILED: u8 = 70;
    /// Response frame could not be composed.
    pub const RESPONSE_FRAME_TOO_BIG: u8 = 71;
    /// Payload bytes kept arriving past the receive buffer bound.
    pub const PAYLOAD_OVERRUN: u8 = 80;
    /// Received frame failed the CRC check.
    pub const CRC_MISMATCH: u8 = 81;
    /// Header-only frame received while no response was awaited.
    pub const UNEXPECTED_EMPTY_FRAME: u8 = 82;
    /// An escaped literal overran the receive buffer bound.
    pub const ESCAPED_PAYLOAD_OVERRUN: u8 = 90;
    /// DLE was not followed by a valid escaped byte.
    pub const FRAMING_ERROR: u8 = 91;
    /// EOF did not arrive within the receive frame timeout.
    pub const RX_FRAME_TIMEOUT: u8 = 100;
    /// Payload handed to a send call exceeds the payload bound.
    pub const PAYLOAD_TOO_BIG: u8 = 110;
    /// Dummy response transmission failed.
    pub const DUMMY_RESPONSE_TX_FAILED: u8 = 150;
    /// Error response transmission failed.
    pub const ERROR_RESPONSE_TX_FAILED: u8 = 161;
    /// A response frame arrived while no response was awaited.
    pub const UNEXPECTED_RESPONSE: u8 = 191;
}

/// Receive state machine states, driven one byte at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Waiting for a start-of-frame byte; anything else is discarded.
    SearchingForSof,
    /// SOF seen, waiting for the first header byte.
    ReceivingHeader,
    /// Waiting for the status byte (second header byte, full-duplex only).
    ReceivingStatus,
    /// Collecting payload bytes until EOF.
    ReceivingPayload,
    /// A DLE was seen, the next byte is an XOR-ed literal.
    ReceivingEscape,
}

/// Callback invoked on every valid, non-response frame. The peer's
/// `send_data` is polling for an answer, so the handler must send one
/// through `responder` before it returns.
pub type MessageHandler<T, U> = fn(app: &U, responder: &mut Responder<'_, T, U>, payload: &[u8]);

/// Sink for the numeric codes in [`debug_code`].
pub type DebugHandler<U> = fn(app: &U, code: u8);

/// Outbound frame scratch buffer, sized at init for the worst case framed
/// size and never reallocated.
struct TxFrame {
    data: Vec<u8>,
    size: usize,
}

/// One endpoint of the protocol. Owns the receive ring buffer, the receive
/// state machine and the frame scratch buffers; talks to the hardware only
/// through [`Interface`].
///
/// `receive_data` is meant for the receive interrupt context and touches
/// nothing but the ring buffer; every other method belongs to the
/// cooperative main context.
pub struct Node<'a, 'b, T: Interface, U> {
    /// Identifier string used as the log target.
    pub name: String,
    /// Hardware interface.
    pub hw_if: &'a T,
    /// Application.
    pub app: &'b U,
    /// Frame timeouts, adjustable after construction. [ms]
    pub rx_msg_timeout: u32,
    pub tx_msg_timeout: u32,
    pub response_timeout: u32,
    /// Send attempts per `send_data` call.
    pub retransmit: u8,
    id: u8,
    variant: HeaderVariant,
    max_payload: u8,
    rx_buff: RingBuffer,
    rx_state: RxState,
    /// Timestamp of the current frame's SOF.
    rx_start_time: u32,
    /// Received payload; holds up to `max_payload` bytes plus the CRC
    /// trailer while a frame is being collected.
    rx_data: Vec<u8>,
    rx_data_index: usize,
    /// Last acknowledgement byte seen (half-duplex header).
    ack: u8,
    /// Last response flag byte seen (full-duplex header).
    response: u8,
    /// Last status byte seen (full-duplex header).
    status: u8,
    expect_response: bool,
    tx: TxFrame,
    handle_message: MessageHandler<T, U>,
    debug: DebugHandler<U>,
}

impl<'a, 'b, T: Interface, U> Node<'a, 'b, T, U> {
    /// Construct a node. All buffers are allocated here and never resized:
    /// the receive ring buffer holds `rx_buff_frames` (at least 1) worst
    /// case frames, the scratch buffers are sized from `max_payload`.
    ///
    /// # Arguments
    /// * `name` - identifier string for the log target.
    /// * `hw_if` - reference to the hardware interface.
    /// * `app` - reference to the application, handed back to the callbacks.
    /// * `id` - node identity tag.
    /// * `variant` - header shape, must match the peer.
    /// * `max_payload` - payload bytes one frame may carry.
    /// * `rx_buff_frames` - framed messages the ring buffer can hold before
    ///   the parser must run.
    /// * `handle_message` - callback for valid inbound data frames.
    /// * `debug` - sink for numeric diagnostic codes.
    pub fn new(
        name: String,
        hw_if: &'a T,
        app: &'b U,
        id: u8,
        variant: HeaderVariant,
        max_payload: u8,
        rx_buff_frames: u8,
        handle_message: MessageHandler<T, U>,
        debug: DebugHandler<U>,
    ) -> Self {
        let max_frame_size = variant.max_frame_size(max_payload);
        Node {
            name,
            hw_if,
            app,
            id,
            variant,
            max_payload,
            rx_buff: RingBuffer::new(max_frame_size * rx_buff_frames as usize),
            rx_state: RxState::SearchingForSof,
            rx_start_time: 0,
            rx_msg_timeout: DEFAULT_RX_MSG_TIMEOUT_MS,
            tx_msg_timeout: DEFAULT_TX_MSG_TIMEOUT_MS,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT_MS,
            retransmit: DEFAULT_RETRANSMIT,
            rx_data: vec![0; max_payload as usize + frame::CRC_SIZE],
            rx_data_index: 0,
            ack: frame::ACK,
            response: frame::DATA,
            status: frame::STATUS_OK,
            expect_response: false,
            tx: TxFrame {
                data: vec![0; max_frame_size],
                size: 0,
            },
            handle_message,
            debug,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Last acknowledgement byte observed (half-duplex header field).
    pub fn ack(&self) -> u8 {
        self.ack
    }

    /// Last status byte observed (full-duplex header field).
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn is_expecting_response(&self) -> bool {
        self.expect_response
    }

    /// Payload of the last valid frame; after a successful `send_data` this
    /// is the response payload (empty for a dummy response).
    pub fn response_payload(&self) -> &[u8] {
        &self.rx_data[..self.rx_data_index]
    }

    pub fn rx_data_size(&self) -> usize {
        self.rx_data_index
    }

    /// Read one byte from the peripheral into the ring buffer. Call this
    /// from the receive interrupt routine.
    pub fn receive_data(&mut self) {
        match self.hw_if.rx_byte() {
            Some(byte) => self.buffer_rx_byte(byte),
            None => (self.debug)(self.app, debug_code::RX_BYTE_FAILED),
        }
    }

    /// Drain whatever the peripheral has ready, then run the parser. The
    /// entry point for hosts that poll instead of using a receive
    /// interrupt; on interrupt-driven hosts `rx_byte` returns `None` here
    /// and only the parser runs.
    pub fn poll(&mut self) {
        while let Some(byte) = self.hw_if.rx_byte() {
            self.buffer_rx_byte(byte);
        }
        self.parse_rx_data();
    }

    fn buffer_rx_byte(&mut self, byte: u8) {
        if self.rx_buff.put(&[byte]).is_err() {
            warn!(target: self.name.as_str(), "rx buffer overrun, flushing");
            (self.debug)(self.app, debug_code::RX_BUFFER_OVERRUN);
            self.rx_buff.flush();
        }
    }

    /// Feed all buffered bytes through the receive state machine and check
    /// the frame timeout. Poll frequently from the main context; valid data
    /// frames invoke the message handler from inside this call.
    pub fn parse_rx_data(&mut self) {
        let mut byte = [0_u8; 1];
        while self.rx_buff.get(&mut byte).is_ok() {
            self.rx_byte(byte[0]);
        }
        self.rx_frame_timeout();
    }

    fn rx_byte(&mut self, byte: u8) {
        match self.rx_state {
            RxState::SearchingForSof => {
                if byte == frame::SOF {
                    self.start_frame();
                }
                // garbage before a frame, keep searching
            }
            RxState::ReceivingHeader => match self.variant {
                HeaderVariant::HalfDuplex => {
                    self.ack = byte;
                    self.rx_data_index = 0;
                    self.rx_state = RxState::ReceivingPayload;
                }
                HeaderVariant::FullDuplex => {
                    self.response = byte;
                    self.rx_state = RxState::ReceivingStatus;
                }
            },
            RxState::ReceivingStatus => {
                self.status = byte;
                self.rx_data_index = 0;
                self.rx_state = RxState::ReceivingPayload;
            }
            RxState::ReceivingPayload => {
                if byte == frame::DLE {
                    self.rx_state = RxState::ReceivingEscape;
                } else if byte == frame::EOF {
                    self.rx_state = RxState::SearchingForSof;
                    self.finalize_frame();
                } else if byte == frame::SOF {
                    // unescaped SOF mid-frame: the rest of the old frame is
                    // lost, resync on the new one
                    warn!(target: self.name.as_str(), "SOF inside frame, resyncing");
                    self.start_frame();
                } else if !self.rx_data_put(byte) {
                    self.rx_state = RxState::SearchingForSof;
                    (self.debug)(self.app, debug_code::PAYLOAD_OVERRUN);
                }
            }
            RxState::ReceivingEscape => {
                let literal = byte ^ frame::DLE_XOR;
                if literal == frame::SOF || literal == frame::EOF || literal == frame::DLE {
                    self.rx_state = RxState::ReceivingPayload;
                    if !self.rx_data_put(literal) {
                        self.rx_state = RxState::SearchingForSof;
                        (self.debug)(self.app, debug_code::ESCAPED_PAYLOAD_OVERRUN);
                    }
                } else {
                    // DLE never stands alone in a well formed frame
                    self.rx_state = RxState::SearchingForSof;
                    (self.debug)(self.app, debug_code::FRAMING_ERROR);
                }
            }
        }
    }

    fn start_frame(&mut self) {
        self.rx_state = RxState::ReceivingHeader;
        self.rx_start_time = self.hw_if.millis();
        self.rx_data_index = 0;
        self.ack = frame::ACK;
    }

    fn rx_data_put(&mut self, byte: u8) -> bool {
        if self.rx_data_index >= self.rx_data.len() {
            return false;
        }
        self.rx_data[self.rx_data_index] = byte;
        self.rx_data_index += 1;
        true
    }

    /// EOF seen: check the frame and hand it on.
    fn finalize_frame(&mut self) {
        if self.rx_data_index == 0 {
            // header-only frame, no payload and no CRC
            if self.expect_response {
                self.expect_response = false;
            } else {
                (self.debug)(self.app, debug_code::UNEXPECTED_EMPTY_FRAME);
            }
            return;
        }

        if self.hw_if.calculate_crc(&self.rx_data[..self.rx_data_index]) != 0 {
            warn!(target: self.name.as_str(), "crc mismatch, frame dropped");
            (self.debug)(self.app, debug_code::CRC_MISMATCH);
            self.rx_data_index = 0;
            self.mark_error_status();
            if self.expect_response {
                // the response itself was corrupted; release the sender so
                // it retries instead of waiting out the timeout
                self.expect_response = false;
            } else {
                let _ = self.responder().send_error_response();
            }
            return;
        }
        self.rx_data_index -= frame::CRC_SIZE;

        if self.is_response() {
            if self.expect_response {
                // sender loop reads the payload out of rx_data
                self.expect_response = false;
            } else {
                (self.debug)(self.app, debug_code::UNEXPECTED_RESPONSE);
                self.rx_data_index = 0;
            }
            return;
        }

        debug!(
            target: self.name.as_str(),
            "frame received, payload len={}", self.rx_data_index
        );
        let app = self.app;
        let handle_message = self.handle_message;
        let mut responder = Responder {
            hw_if: self.hw_if,
            app,
            debug: self.debug,
            name: &self.name,
            variant: self.variant,
            ack: self.ack,
            max_payload: self.max_payload,
            tx: &mut self.tx,
            tx_msg_timeout: self.tx_msg_timeout,
        };
        handle_message(app, &mut responder, &self.rx_data[..self.rx_data_index]);
    }

    fn is_response(&self) -> bool {
        match self.variant {
            // one-byte headers cannot flag a response; anything that
            // arrives while a response is awaited counts as the response
            HeaderVariant::HalfDuplex => self.expect_response,
            HeaderVariant::FullDuplex => self.response == frame::RESPONSE,
        }
    }

    fn is_status_ok(&self) -> bool {
        match self.variant {
            HeaderVariant::HalfDuplex => self.ack == frame::ACK,
            HeaderVariant::FullDuplex => self.status == frame::STATUS_OK,
        }
    }

    fn mark_error_status(&mut self) {
        match self.variant {
            HeaderVariant::HalfDuplex => self.ack = frame::NACK,
            HeaderVariant::FullDuplex => self.status = frame::STATUS_ERROR,
        }
    }

    fn rx_frame_timeout(&mut self) {
        if self.rx_state != RxState::SearchingForSof
            && self.hw_if.millis().wrapping_sub(self.rx_start_time) > self.rx_msg_timeout
        {
            warn!(target: self.name.as_str(), "rx frame timeout, frame dropped");
            self.rx_state = RxState::SearchingForSof;
            self.rx_data_index = 0;
            (self.debug)(self.app, debug_code::RX_FRAME_TIMEOUT);
        }
    }

    /// Transmit `payload` and wait for the peer's response, retransmitting
    /// on error status or timeout up to `retransmit` times. On success the
    /// response payload is available through [`Node::response_payload`].
    ///
    /// The wait is a deadline-bounded poll of the parser; the peripheral is
    /// drained in place, so a polled host needs no other pump while this
    /// call runs.
    pub fn send_data(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.is_empty() {
            (self.debug)(self.app, debug_code::TX_NOTHING_TO_SEND);
            return Err(Error::NoPayload);
        }

        // let an in-progress inbound frame finish first so our transmission
        // does not collide with the response the peer is about to expect
        let start = self.hw_if.millis();
        while self.rx_state != RxState::SearchingForSof {
            self.poll();
            if self.hw_if.millis().wrapping_sub(start) > self.response_timeout {
                (self.debug)(self.app, debug_code::BUSY_LINE_TIMEOUT);
                break;
            }
        }

        let header = match self.variant {
            HeaderVariant::HalfDuplex => Header::Ack(frame::ACK),
            HeaderVariant::FullDuplex => Header::ResponseStatus(frame::DATA, frame::STATUS_OK),
        };
        for attempt in 0..self.retransmit {
            trace!(
                target: self.name.as_str(),
                "send_data: attempt={}, payload len={}", attempt, payload.len()
            );
            if let Err(err) = self.responder().compose(header, payload) {
                (self.debug)(self.app, debug_code::FRAME_TOO_BIG);
                // an oversized frame will not shrink, do not retry
                return Err(err);
            }
            if self.responder().transmit().is_err() {
                (self.debug)(self.app, debug_code::TX_UNSUCCESSFUL);
                continue;
            }

            // report an error unless the response says otherwise
            self.mark_error_status();
            self.expect_response = true;
            let sent = self.hw_if.millis();
            while self.expect_response {
                self.poll();
                if self.hw_if.millis().wrapping_sub(sent) > self.response_timeout {
                    (self.debug)(self.app, debug_code::RESPONSE_TIMEOUT);
                    break;
                }
            }
            if self.expect_response {
                // nothing arrived, reset and retry
                self.expect_response = false;
                self.rx_state = RxState::SearchingForSof;
                continue;
            }
            if self.is_status_ok() {
                return Ok(());
            }
            // the peer saw a corrupted frame; retransmit immediately
            (self.debug)(self.app, debug_code::ERROR_STATUS_RECEIVED);
        }
        Err(Error::NoResponse)
    }

    /// Frame `payload` as a response to the peer's `send_data` and transmit
    /// it once. The sender on the other side is the retry authority, so
    /// there are no retries here.
    pub fn send_response(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.responder().send_response(payload)
    }

    /// Confirm reception without returning data: a header-only frame with
    /// no payload and no CRC.
    pub fn send_dummy_response(&mut self) -> Result<(), Error> {
        self.responder().send_dummy_response()
    }

    /// Flush all buffered bytes and return the receiver to its initial
    /// state. Call from hardware error handlers (overrun, noise, frame
    /// error); calling it twice is the same as calling it once.
    pub fn reset_node(&mut self) {
        self.rx_buff.flush();
        self.rx_data_index = 0;
        self.rx_state = RxState::SearchingForSof;
        self.ack = frame::ACK;
        self.response = frame::DATA;
        self.status = frame::STATUS_OK;
        self.expect_response = false;
    }

    fn responder(&mut self) -> Responder<'_, T, U> {
        Responder {
            hw_if: self.hw_if,
            app: self.app,
            debug: self.debug,
            name: &self.name,
            variant: self.variant,
            ack: self.ack,
            max_payload: self.max_payload,
            tx: &mut self.tx,
            tx_msg_timeout: self.tx_msg_timeout,
        }
    }
}

/// The transmit half of a node, handed to the message handler so it can
/// answer the frame it is holding before the peer's response timeout runs
/// out.
pub struct Responder<'r, T, U> {
    hw_if: &'r T,
    app: &'r U,
    debug: DebugHandler<U>,
    name: &'r str,
    variant: HeaderVariant,
    /// Acknowledgement byte echoed into half-duplex response headers.
    ack: u8,
    max_payload: u8,
    tx: &'r mut TxFrame,
    tx_msg_timeout: u32,
}

impl<'r, T: Interface, U> Responder<'r, T, U> {
    /// Frame `payload` as a response and transmit it once.
    pub fn send_response(&mut self, payload: &[u8]) -> Result<(), Error> {
        let header = match self.variant {
            HeaderVariant::HalfDuplex => Header::Ack(self.ack),
            HeaderVariant::FullDuplex => {
                Header::ResponseStatus(frame::RESPONSE, frame::STATUS_OK)
            }
        };
        if let Err(err) = self.compose(header, payload) {
            (self.debug)(self.app, debug_code::RESPONSE_FRAME_TOO_BIG);
            return Err(err);
        }
        self.transmit().map_err(|err| {
            (self.debug)(self.app, debug_code::RESPONSE_TX_FAILED);
            err
        })
    }

    /// Confirm reception without returning data.
    pub fn send_dummy_response(&mut self) -> Result<(), Error> {
        self.status_frame(true);
        self.transmit().map_err(|err| {
            (self.debug)(self.app, debug_code::DUMMY_RESPONSE_TX_FAILED);
            err
        })
    }

    /// Tell the peer its frame arrived corrupted so its `send_data`
    /// retries.
    pub(crate) fn send_error_response(&mut self) -> Result<(), Error> {
        self.status_frame(false);
        self.transmit().map_err(|err| {
            (self.debug)(self.app, debug_code::ERROR_RESPONSE_TX_FAILED);
            err
        })
    }

    /// Build a header-only frame: no payload, no CRC.
    fn status_frame(&mut self, ok: bool) {
        self.tx.data[0] = frame::SOF;
        match self.variant {
            HeaderVariant::HalfDuplex => {
                self.tx.data[1] = if ok { frame::ACK } else { frame::NACK };
                self.tx.data[2] = frame::EOF;
                self.tx.size = 3;
            }
            HeaderVariant::FullDuplex => {
                self.tx.data[1] = frame::RESPONSE;
                self.tx.data[2] = if ok { frame::STATUS_OK } else { frame::STATUS_ERROR };
                self.tx.data[3] = frame::EOF;
                self.tx.size = 4;
            }
        }
    }

    fn compose(&mut self, header: Header, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > self.max_payload as usize {
            (self.debug)(self.app, debug_code::PAYLOAD_TOO_BIG);
            return Err(Error::FrameTooBig);
        }
        let crc = self.hw_if.calculate_crc(payload);
        self.tx.size = frame::compose(&mut self.tx.data, header, payload, crc)?;
        Ok(())
    }

    /// Push the framed bytes out one at a time, bounded by the frame
    /// transmit timeout.
    fn transmit(&mut self) -> Result<(), Error> {
        if self.tx.size < self.variant.min_frame_size() {
            (self.debug)(self.app, debug_code::TX_NOTHING_TO_SEND);
            return Err(Error::NoPayload);
        }
        let start = self.hw_if.millis();
        for index in 0..self.tx.size {
            if !self.hw_if.tx_byte(self.tx.data[index]) {
                (self.debug)(self.app, debug_code::TX_BYTE_FAILED);
                return Err(Error::Transmit);
            }
            if self.hw_if.millis().wrapping_sub(start) > self.tx_msg_timeout {
                (self.debug)(self.app, debug_code::TX_FRAME_TIMEOUT);
                return Err(Error::Transmit);
            }
        }
        trace!(target: self.name, "frame sent, {} bytes on wire", self.tx.size);
        Ok(())
    }
}
