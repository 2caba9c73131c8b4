extern crate sdp_rs as sdp;
use std::cell::Cell;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

struct Uart {
    name: String,
    sender: Sender<u8>,
    receiver: Receiver<u8>,
    start: Instant,
}

impl Uart {
    fn new(name: String, sender: Sender<u8>, receiver: Receiver<u8>) -> Self {
        Uart {
            name,
            sender,
            receiver,
            start: Instant::now(),
        }
    }

    fn open(&self) {
        println!("{}: open uart.", self.name);
    }

    fn close(&self) {
        println!("{}: close uart.", self.name);
    }
}

impl sdp::Interface for Uart {
    fn rx_byte(&self) -> Option<u8> {
        self.receiver.try_recv().ok()
    }

    fn tx_byte(&self, byte: u8) -> bool {
        self.sender.send(byte).is_ok()
    }

    fn millis(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

struct App {
    name: String,
    replied: Cell<bool>,
}

fn handle_message(app: &App, responder: &mut sdp::Responder<Uart, App>, payload: &[u8]) {
    print!("{} received: [", app.name);
    for byte in payload {
        print!(" 0x{:02x}", byte);
    }
    println!(" ]");

    // answer with the same payload, reversed
    let mut reply = payload.to_vec();
    reply.reverse();
    match responder.send_response(&reply) {
        Ok(()) => app.replied.set(true),
        Err(err) => println!("{}: response failed: {:?}", app.name, err),
    }
}

fn debug(app: &App, code: u8) {
    log::debug!(target: app.name.as_str(), "debug code: {}", code);
}

fn main() {
    env_logger::init();

    let payload: [u8; 4] = [0x7e, 0x01, 0x02, 0x7d];
    let (tx1, rx2) = channel();
    let (tx2, rx1) = channel();

    let requester_builder = thread::Builder::new().name("requester".into());
    let requester = requester_builder
        .spawn(move || {
            let uart = Uart::new(String::from("uart1"), tx1, rx1);
            let app = App {
                name: String::from("app1"),
                replied: Cell::new(false),
            };
            let mut node = sdp::Node::new(
                String::from("node1"),
                &uart,
                &app,
                1,
                sdp::HeaderVariant::FullDuplex,
                16,
                2,
                handle_message,
                debug,
            );
            uart.open();

            print!("The data to be sent: [");
            for byte in payload.iter() {
                print!(" 0x{:02x}", byte);
            }
            println!(" ]");

            match node.send_data(&payload) {
                Ok(()) => {
                    print!("node1 got response: [");
                    for byte in node.response_payload() {
                        print!(" 0x{:02x}", byte);
                    }
                    println!(" ]");
                }
                Err(err) => println!("node1: send failed: {:?}", err),
            }

            uart.close();
        })
        .unwrap();

    let responder_builder = thread::Builder::new().name("responder".into());
    let responder = responder_builder
        .spawn(move || {
            let uart = Uart::new(String::from("uart2"), tx2, rx2);
            let app = App {
                name: String::from("app2"),
                replied: Cell::new(false),
            };
            let mut node = sdp::Node::new(
                String::from("node2"),
                &uart,
                &app,
                2,
                sdp::HeaderVariant::FullDuplex,
                16,
                2,
                handle_message,
                debug,
            );
            uart.open();

            while !app.replied.get() {
                node.poll();
                thread::sleep(Duration::from_millis(1));
            }

            uart.close();
        })
        .unwrap();

    requester.join().unwrap();
    responder.join().unwrap();
}
