//! CDC-ACM serial function: exposes a virtual serial port to the host,
//! backed by a receive and a transmit ring buffer.
//!
//! All queue manipulation is pure (no host access needed); only actually
//! moving bytes across the wire needs a [`FunctionHost`], so `transmit`,
//! `receive` and `discard_received` take one explicitly. The device calls
//! them with a freshly built host from its own dispatch; application code
//! calls them with one obtained through [`crate::usb::device::UsbDevice::with_function`].

use crate::usb::config::SERIAL_PACKET_LENGTH;
use crate::usb::control::{ControlDirection, ControlHandler, ControlRequest};
use crate::usb::function::{is_class_interface_request, Function, FunctionHost, FunctionLogic};
use crate::usb::model::SetupPacket;
use crate::util::CircularBuffer;
use crate::Result;

/// Interrupt IN endpoint reserved for SERIAL_STATE notifications; not
/// currently driven, matching descriptor layout only.
#[allow(dead_code)]
const EP_STATUS_IN: u8 = 0;
const EP_DATA_IN: u8 = 1;
const EP_DATA_OUT: u8 = 2;

const REQ_SET_LINE_CODING: u8 = 0x20;
const REQ_GET_LINE_CODING: u8 = 0x21;
const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

/// First four bytes of SHA-256("microbits-core.cdc-acm.v1"), big-endian.
#[cfg(feature = "function-type-ids")]
const FUNCTION_TYPE: u32 = 0x5002_0f28;

/// The function was (re-)initialized, e.g. following a USB bus reset.
pub const EV_RESET: u32 = 1 << 0;
/// Bytes are available to [`SerialFunction::receive`].
pub const EV_DATA_RX: u32 = 1 << 1;
/// A queued [`SerialFunction::transmit`] packet has gone out on the wire.
pub const EV_DATA_TX: u32 = 1 << 2;
/// The host changed DTR/RTS via `SET_CONTROL_LINE_STATE`.
pub const EV_CONTROL_SIGNALS_CHANGED: u32 = 1 << 3;
/// The host changed baud rate/framing via `SET_LINE_CODING`.
pub const EV_LINE_CODING_CHANGED: u32 = 1 << 4;

/// Line coding as exchanged by `SET_LINE_CODING`/`GET_LINE_CODING`
/// (USB CDC PSTN subclass, section 6.3.10/6.3.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoding {
    pub dw_line_rate: u32,
    pub b_char_format: u8,
    pub b_parity_type: u8,
    pub b_data_bits: u8,
}

impl LineCoding {
    pub const LENGTH: usize = 7;

    pub const CHAR_STOP_1: u8 = 0x00;
    pub const CHAR_STOP_1_5: u8 = 0x01;
    pub const CHAR_STOP_2: u8 = 0x02;

    pub const PARITY_NONE: u8 = 0x00;
    pub const PARITY_ODD: u8 = 0x01;
    pub const PARITY_EVEN: u8 = 0x02;
    pub const PARITY_MARK: u8 = 0x03;
    pub const PARITY_SPACE: u8 = 0x04;

    fn encode(&self, buffer: &mut [u8]) {
        buffer[0..4].copy_from_slice(&self.dw_line_rate.to_le_bytes());
        buffer[4] = self.b_char_format;
        buffer[5] = self.b_parity_type;
        buffer[6] = self.b_data_bits;
    }

    fn decode(buffer: &[u8]) -> Self {
        LineCoding {
            dw_line_rate: u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]),
            b_char_format: buffer[4],
            b_parity_type: buffer[5],
            b_data_bits: buffer[6],
        }
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        LineCoding { dw_line_rate: 115_200, b_char_format: Self::CHAR_STOP_1, b_parity_type: Self::PARITY_NONE, b_data_bits: 8 }
    }
}

/// CDC-ACM serial function. Logical endpoints: 0 (interrupt status IN),
/// 1 (bulk data IN), 2 (bulk data OUT).
pub struct SerialFunction<'a> {
    rx_queue: CircularBuffer<'a>,
    tx_queue: CircularBuffer<'a>,
    rx_packet: [u8; SERIAL_PACKET_LENGTH],
    rx_packet_length: usize,
    tx_packet_length: usize,
    tx_ready: bool,
    line_coding: LineCoding,
    control_signals: u16,
    events: u32,
    discard_on_reset: bool,
}

impl<'a> SerialFunction<'a> {
    /// `receive_buffer`/`transmit_buffer` must each be large enough to
    /// hold at least one packet (`SERIAL_PACKET_LENGTH` bytes) plus one
    /// byte of ring-buffer headroom.
    pub fn new(receive_buffer: &'a mut [u8], transmit_buffer: &'a mut [u8]) -> Self {
        SerialFunction {
            rx_queue: CircularBuffer::new(receive_buffer),
            tx_queue: CircularBuffer::new(transmit_buffer),
            rx_packet: [0u8; SERIAL_PACKET_LENGTH],
            rx_packet_length: 0,
            tx_packet_length: 0,
            tx_ready: true,
            line_coding: LineCoding::default(),
            control_signals: 0,
            events: 0,
            discard_on_reset: true,
        }
    }

    pub fn set_receive_buffer(&mut self, buffer: &'a mut [u8]) {
        self.rx_queue.set_buffer(buffer);
    }

    pub fn set_transmit_buffer(&mut self, buffer: &'a mut [u8]) {
        self.tx_queue.set_buffer(buffer);
    }

    /// Controls what [`Function::initialize`] does to queued, unread RX
    /// bytes and queued, unsent TX bytes across a reset. `true` (the
    /// default) drops both queues, matching a bare USB reset tearing down
    /// any in-flight line state; `false` preserves them, for integrators
    /// who reset the USB link without wanting to lose buffered application
    /// data.
    pub fn set_discard_on_reset(&mut self, discard: bool) {
        self.discard_on_reset = discard;
    }

    /// Drain and clear the pending event bitmask (`EV_*` constants).
    pub fn pull_events(&mut self) -> u32 {
        core::mem::take(&mut self.events)
    }

    /// Bytes available to read: whatever's already queued plus whatever's
    /// staged in the most recently received packet.
    pub fn receive_pending_bytes(&self) -> usize {
        self.rx_queue.pending_bytes() + self.rx_packet_length
    }

    pub fn receive_queue(&self) -> &CircularBuffer<'a> {
        &self.rx_queue
    }

    /// Drop up to `length` queued receive bytes without reading them.
    pub fn discard_received(&mut self, length: usize, host: &mut dyn FunctionHost) {
        let from_queue = length.min(self.rx_queue.pending_bytes());
        self.rx_queue.advance_read(from_queue);
        self.process_pending_packet(host);
    }

    /// Copy up to `buffer.len()` received bytes out of the queue.
    pub fn receive(&mut self, buffer: &mut [u8], host: &mut dyn FunctionHost) -> usize {
        let n = self.rx_queue.read_bytes(buffer);
        self.process_pending_packet(host);
        n
    }

    /// Queue bytes for transmission, kicking off a packet immediately if
    /// the endpoint is idle. Returns the number of bytes actually queued.
    pub fn transmit(&mut self, buffer: &[u8], host: &mut dyn FunctionHost) -> usize {
        let n = self.tx_queue.write_bytes(buffer);

        if self.tx_ready {
            self.transmit_next_chunk(host);
        }

        n
    }

    pub fn transmit_free_bytes(&self) -> usize {
        self.tx_queue.free_bytes()
    }

    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    pub fn control_signals(&self) -> u16 {
        self.control_signals
    }

    fn transmit_next_chunk(&mut self, host: &mut dyn FunctionHost) {
        let pending = self.tx_queue.pending_bytes();
        if pending == 0 {
            self.tx_ready = true;
            return;
        }

        self.tx_ready = false;
        let slice = self.tx_queue.read_slice();
        let len = slice.len().min(SERIAL_PACKET_LENGTH);
        self.tx_packet_length = len;
        host.transmit_packet(EP_DATA_IN, slice, len);
    }

    /// Move bytes staged in `rx_packet` into the queue and, once drained,
    /// re-arm the OUT endpoint for the next packet.
    fn process_pending_packet(&mut self, host: &mut dyn FunctionHost) {
        if self.rx_packet_length == 0 {
            return;
        }

        let free = self.rx_queue.free_bytes();
        let n = free.min(self.rx_packet_length);
        if n == 0 {
            return;
        }

        self.rx_queue.write_bytes(&self.rx_packet[..n]);
        self.events |= EV_DATA_RX;

        if n == self.rx_packet_length {
            self.rx_packet_length = 0;
            host.receive_packet(EP_DATA_OUT, &mut self.rx_packet);
        } else {
            self.rx_packet.copy_within(n.., 0);
            self.rx_packet_length -= n;
        }
    }
}

impl<'a> ControlHandler for SerialFunction<'a> {
    fn setup_control(&mut self, request: &mut ControlRequest) {
        if !is_class_interface_request(&*request) {
            return;
        }

        match request.setup.b_request {
            REQ_SET_LINE_CODING => {
                request.accepted = true;
                request.max_length = LineCoding::LENGTH as u32;
            }
            REQ_GET_LINE_CODING => {
                request.accepted = true;
                request.direction = ControlDirection::Outbound;
                request.max_length = LineCoding::LENGTH as u32;
            }
            REQ_SET_CONTROL_LINE_STATE => {
                request.accepted = true;
            }
            _ => {}
        }
    }

    fn handle_control(&mut self, setup: &SetupPacket, buffer: &mut [u8], length: &mut u32) -> Result<()> {
        match setup.b_request {
            REQ_SET_LINE_CODING => {
                let coding = LineCoding::decode(&buffer[..LineCoding::LENGTH]);
                if coding != self.line_coding {
                    self.line_coding = coding;
                    self.events |= EV_LINE_CODING_CHANGED;
                }
            }
            REQ_GET_LINE_CODING => {
                self.line_coding.encode(&mut buffer[..LineCoding::LENGTH]);
                *length = LineCoding::LENGTH as u32;
            }
            REQ_SET_CONTROL_LINE_STATE => {
                if setup.w_value != self.control_signals {
                    self.control_signals = setup.w_value;
                    self.events |= EV_CONTROL_SIGNALS_CHANGED;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

impl<'a> FunctionLogic for SerialFunction<'a> {
    fn packet_received(&mut self, host: &mut dyn FunctionHost, endpoint: u8, length: usize) {
        if endpoint != EP_DATA_OUT {
            return;
        }

        self.rx_packet_length = length;
        self.process_pending_packet(host);
    }

    fn transmit_complete(&mut self, host: &mut dyn FunctionHost, endpoint: u8) {
        if endpoint != EP_DATA_IN {
            return;
        }

        self.tx_queue.advance_read(self.tx_packet_length);
        self.tx_packet_length = 0;
        self.events |= EV_DATA_TX;
        self.transmit_next_chunk(host);
    }
}

impl<'a> Function for SerialFunction<'a> {
    #[cfg(feature = "function-type-ids")]
    fn function_type(&self) -> u32 {
        FUNCTION_TYPE
    }

    fn initialize(&mut self, host: &mut dyn FunctionHost) -> Result<()> {
        self.rx_packet_length = 0;
        self.tx_packet_length = 0;
        self.tx_ready = true;
        if self.discard_on_reset {
            self.rx_queue.reset();
            self.tx_queue.reset();
        }
        self.events |= EV_RESET;
        host.receive_packet(EP_DATA_OUT, &mut self.rx_packet);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_coding_round_trips() {
        let coding = LineCoding { dw_line_rate: 9600, b_char_format: LineCoding::CHAR_STOP_1, b_parity_type: LineCoding::PARITY_EVEN, b_data_bits: 7 };
        let mut buffer = [0u8; LineCoding::LENGTH];
        coding.encode(&mut buffer);
        assert_eq!(LineCoding::decode(&buffer), coding);
    }

    #[test]
    fn default_line_coding_is_8n1_115200() {
        let coding = LineCoding::default();
        assert_eq!(coding.dw_line_rate, 115_200);
        assert_eq!(coding.b_data_bits, 8);
        assert_eq!(coding.b_parity_type, LineCoding::PARITY_NONE);
        assert_eq!(coding.b_char_format, LineCoding::CHAR_STOP_1);
    }

    struct NoopHost;

    impl FunctionHost for NoopHost {
        fn link_speed(&self) -> crate::usb::model::LinkSpeed {
            crate::usb::model::LinkSpeed::Full
        }
        fn stall_endpoint(&mut self, _logical_endpoint: u8, _stall: bool) {}
        fn stalled(&self, _logical_endpoint: u8) -> bool {
            false
        }
        fn receive_packet(&mut self, _logical_endpoint: u8, _buffer: &mut [u8]) {}
        fn transmit_packet(&mut self, _logical_endpoint: u8, _buffer: &[u8], _length: usize) {}
    }

    #[test]
    fn line_coding_change_sets_event_and_pull_events_drains_it() {
        let mut rx = [0u8; 128];
        let mut tx = [0u8; 128];
        let mut serial = SerialFunction::new(&mut rx, &mut tx);
        let mut host = NoopHost;

        let mut buffer = [0u8; LineCoding::LENGTH];
        LineCoding { dw_line_rate: 9600, ..LineCoding::default() }.encode(&mut buffer);
        let setup = SetupPacket {
            bm_request_type: 0,
            b_request: REQ_SET_LINE_CODING,
            w_value: 0,
            w_index: 0,
            w_length: LineCoding::LENGTH as u16,
        };
        let mut length = 0u32;
        serial.handle_control(&setup, &mut buffer, &mut length).unwrap();

        let events = serial.pull_events();
        assert_eq!(events & EV_LINE_CODING_CHANGED, EV_LINE_CODING_CHANGED);
        assert_eq!(serial.pull_events(), 0, "pull_events must clear the mask");

        serial.initialize(&mut host).unwrap();
        assert_eq!(serial.pull_events() & EV_RESET, EV_RESET);
    }

    #[test]
    fn discard_on_reset_false_preserves_queued_bytes() {
        let mut rx = [0u8; 128];
        let mut tx = [0u8; 128];
        let mut serial = SerialFunction::new(&mut rx, &mut tx);
        let mut host = NoopHost;

        serial.set_discard_on_reset(false);
        serial.transmit(b"hello", &mut host);
        assert!(serial.transmit_free_bytes() < tx.len() - 1);

        serial.initialize(&mut host).unwrap();
        assert!(serial.transmit_free_bytes() < tx.len() - 1);
    }
}
