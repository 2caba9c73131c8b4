extern crate sdp_rs as sdp;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

struct App {}

impl App {
    fn print_msg(&self, buffer: &[u8]) {
        print!("The data received: [");
        for byte in buffer {
            print!(" 0x{:02x}", byte);
        }
        println!(" ]");
    }
}

struct Uart {
    rx_buf: RefCell<VecDeque<u8>>,
    tx_buf: RefCell<Vec<u8>>,
    clock: Cell<u32>,
}

impl Uart {
    fn open(&self) {
        println!("Open uart.");
    }

    fn close(&self) {
        println!("Close uart.");
    }
}

impl sdp::Interface for Uart {
    fn rx_byte(&self) -> Option<u8> {
        self.rx_buf.borrow_mut().pop_front()
    }

    fn tx_byte(&self, byte: u8) -> bool {
        self.tx_buf.borrow_mut().push(byte);
        true
    }

    fn millis(&self) -> u32 {
        let now = self.clock.get();
        self.clock.set(now + 1);
        now
    }
}

fn handle_message(app: &App, responder: &mut sdp::Responder<Uart, App>, payload: &[u8]) {
    app.print_msg(payload);
    if responder.send_dummy_response().is_err() {
        panic!("Opps!");
    }
}

fn debug(_app: &App, code: u8) {
    println!("debug code: {}", code);
}

fn main() {
    env_logger::init();

    let payload: [u8; 5] = [0x01, 0x7e, 0x7d, 0x66, 0x02];
    let app = App {};
    let uart = Uart {
        rx_buf: RefCell::new(VecDeque::new()),
        tx_buf: RefCell::new(Vec::new()),
        clock: Cell::new(0),
    };
    let mut node = sdp::Node::new(
        String::from("node"),
        &uart,
        &app,
        0,
        sdp::HeaderVariant::HalfDuplex,
        8,
        2,
        handle_message,
        debug,
    );

    uart.open();

    // frame the payload by hand and place it on the receive side
    let mut frame = [0u8; 32];
    let size = sdp::compose(
        &mut frame,
        sdp::Header::Ack(sdp::ACK),
        &payload,
        sdp::crc16(&payload),
    )
    .unwrap();
    print!("Wire bytes: [");
    for byte in &frame[..size] {
        print!(" 0x{:02x}", byte);
    }
    println!(" ]");
    uart.rx_buf.borrow_mut().extend(frame[..size].iter().copied());

    node.poll();

    print!("Acknowledgement sent: [");
    for byte in uart.tx_buf.borrow().iter() {
        print!(" 0x{:02x}", byte);
    }
    println!(" ]");

    uart.close();
}
