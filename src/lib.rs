//! # SDP
//! SDP (Simple Data Protocol) is a point-to-point frame based protocol that
//! carries small acknowledged payloads between two endpoints over a
//! UART-class serial link. Frames are delimited with start/end bytes,
//! delimiter occurrences inside a payload are escaped, integrity is checked
//! with a CRC-16, and a request/response discipline with bounded
//! retransmission runs on top.

//! ## Example
//! ```
//! extern crate sdp_rs as sdp;
//! use std::cell::{Cell, RefCell};
//! use std::collections::VecDeque;
//!
//! struct App {}
//!
//! impl App {
//!     fn print_msg(&self, buffer: &[u8]) {
//!         print!("The data received: [ ");
//!         for byte in buffer {
//!             print!("0x{:02x} ", byte);
//!         }
//!         println!("]");
//!     }
//! }
//!
//! struct Uart {
//!     rx_buf: RefCell<VecDeque<u8>>,
//!     tx_buf: RefCell<Vec<u8>>,
//!     clock: Cell<u32>,
//! }
//!
//! impl sdp::Interface for Uart {
//!     fn rx_byte(&self) -> Option<u8> {
//!         self.rx_buf.borrow_mut().pop_front()
//!     }
//!
//!     fn tx_byte(&self, byte: u8) -> bool {
//!         self.tx_buf.borrow_mut().push(byte);
//!         true
//!     }
//!
//!     fn millis(&self) -> u32 {
//!         let now = self.clock.get();
//!         self.clock.set(now + 1);
//!         now
//!     }
//! }
//!
//! fn handle_message(app: &App, responder: &mut sdp::Responder<Uart, App>, payload: &[u8]) {
//!     app.print_msg(payload);
//!     responder.send_dummy_response().unwrap();
//! }
//!
//! fn debug(_app: &App, code: u8) {
//!     println!("debug code: {}", code);
//! }
//!
//! fn main() {
//!     let app = App {};
//!     let uart = Uart {
//!         rx_buf: RefCell::new(VecDeque::new()),
//!         tx_buf: RefCell::new(Vec::new()),
//!         clock: Cell::new(0),
//!     };
//!     let mut node = sdp::Node::new(
//!         String::from("node"),
//!         &uart,
//!         &app,
//!         0,
//!         sdp::HeaderVariant::HalfDuplex,
//!         8,
//!         2,
//!         handle_message,
//!         debug,
//!     );
//!
//!     // wire image of a frame carrying [0x01, 0x02, 0x03]
//!     let wire = [0x7e, 0x00, 0x01, 0x02, 0x03, 0x0c, 0x1e, 0x66];
//!     uart.rx_buf.borrow_mut().extend(wire);
//!     node.poll();
//!
//!     // the handler ran and its acknowledgement is on the wire
//!     assert_eq!(*uart.tx_buf.borrow(), [0x7e, 0x00, 0x66]);
//! }
//! ```

mod crc;
mod frame;
mod interface;
mod node;
mod ring_buffer;

pub use crc::{crc16, Crc16Context};
pub use frame::{
    compose, stuff, unstuff, verify, Header, HeaderVariant, ACK, CRC_SIZE, DATA, DLE, DLE_XOR,
    EOF, NACK, RESPONSE, SOF, STATUS_ERROR, STATUS_OK,
};
pub use interface::Interface;
pub use node::{
    debug_code, DebugHandler, MessageHandler, Node, Responder, RxState,
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_RETRANSMIT, DEFAULT_RX_MSG_TIMEOUT_MS,
    DEFAULT_TX_MSG_TIMEOUT_MS,
};
pub use ring_buffer::{RbError, RingBuffer};

/// Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// There is no payload to frame; ordinary frames carry at least one
    /// byte.
    NoPayload,
    /// The framed size would exceed the maximum frame size.
    FrameTooBig,
    /// Byte or frame transmission did not complete in time.
    Transmit,
    /// No valid response arrived within the retransmission budget.
    NoResponse,
}
