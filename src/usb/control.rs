//! Control-transfer state machine: SETUP token handling, request routing
//! to the handler that accepts it, and the standard (chapter 9) request
//! handler shared by every device.
//!
//! The original engine stores a raw pointer to whichever [`ControlHandler`]
//! accepted the current request and to whichever [`ControlStreamer`] it
//! may have installed, both of which can remain live across several
//! packet/transmit-complete callbacks. Rust's borrow checker does not let
//! [`ControlEndpointImpl`] hold such a reference while its owner (the
//! device) also holds the handler it points to, so here the handler and
//! streamer are resolved by the caller for each call and passed in
//! explicitly; [`ControlEndpointImpl`] itself only remembers *which*
//! handler is active (via the caller-defined identity it's given back)
//! well enough to keep the state machine deterministic.

use crate::usb::config::MAX_CONTROL_PACKET;
use crate::usb::model::{LinkSpeed, SetupPacket, EP_CONTROL_IN, EP_CONTROL_OUT};
use crate::usb::pcd::{PeripheralController, SetAddressPhase};
use crate::{Error, Result};

/// Direction of the data stage of a control transfer, from the handler's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlDirection {
    /// Host to device.
    Inbound,
    /// Device to host.
    Outbound,
}

/// A control request in the process of being resolved. A [`ControlHandler`]
/// fills this in from [`ControlHandler::setup_control`] to accept (or
/// decline) the request.
#[derive(Debug, Clone, Copy)]
pub struct ControlRequest {
    /// The SETUP token being resolved.
    pub setup: SetupPacket,
    /// Negotiated link speed, for handlers that pick descriptor variants
    /// by speed (e.g. `GET_DESCRIPTOR(CONFIGURATION)`).
    pub link_speed: LinkSpeed,
    /// Set by the handler to accept the request.
    pub accepted: bool,
    /// Direction of the data stage; defaults to inbound, must be flipped
    /// by the handler for any request that returns data to the host.
    pub direction: ControlDirection,
    /// Maximum number of bytes the handler is willing to transfer.
    pub max_length: u32,
    /// Set by the handler if it wants its data phase driven by a
    /// [`ControlStreamer`] instead of `handle_control`'s single-shot
    /// buffer.
    pub uses_streamer: bool,
}

impl ControlRequest {
    /// A request initialized for `setup`, not yet accepted by anybody.
    pub fn new(setup: SetupPacket, link_speed: LinkSpeed) -> Self {
        ControlRequest {
            setup,
            link_speed,
            accepted: false,
            direction: ControlDirection::Inbound,
            max_length: 0,
            uses_streamer: false,
        }
    }

    /// Reset to the not-yet-accepted state, so a second candidate handler
    /// can be tried against the same SETUP token.
    pub fn reset(&mut self) {
        self.accepted = false;
        self.direction = ControlDirection::Inbound;
        self.max_length = 0;
        self.uses_streamer = false;
    }
}

/// Application-facing view of the control endpoint, given to streamers so
/// they can drive their own packet transfers.
pub trait ControlEndpoint {
    fn setup_packet(&self) -> SetupPacket;
    fn packet_buffer(&mut self) -> &mut [u8];
    fn packet_length(&self) -> usize;
    fn link_speed(&self) -> LinkSpeed;
    fn receive_packet(&mut self);
    /// Transmit the first `length` bytes currently sitting in
    /// `packet_buffer()`.
    fn transmit_packet(&mut self, length: usize);
    fn abort_request(&mut self);
}

/// Handles one class of control request (the standard chapter-9 requests,
/// or a function's class/vendor requests).
pub trait ControlHandler {
    /// Inspect `request.setup` and, if this handler recognizes it, fill in
    /// `request.accepted`/`direction`/`max_length`/`uses_streamer`.
    fn setup_control(&mut self, request: &mut ControlRequest);

    /// Produce (inbound) or consume (outbound) up to `*length` bytes for
    /// a one-shot (non-streamed) data phase.
    fn handle_control(&mut self, setup: &SetupPacket, buffer: &mut [u8], length: &mut u32) -> Result<()>;

    /// Called once the transfer this handler accepted has finished, with
    /// whether it succeeded.
    fn complete_control(&mut self, _setup: &SetupPacket, _success: bool) {}
}

/// Drives a multi-packet data phase too large to fit in one
/// `handle_control` call. Only one direction's callback ever fires for a
/// given streamer (inbound streamers never see `transmit_complete`,
/// outbound streamers never see `packet_received`); the unused side's
/// default body exists only so implementors don't have to stub it out.
pub trait ControlStreamer {
    /// The transfer finished successfully.
    fn completed(&mut self) {}
    /// The transfer was aborted before completion.
    fn aborted(&mut self) {}
    /// An inbound chunk has arrived in `endpoint.packet_buffer()`.
    fn packet_received(&mut self, _buffer: &[u8], _length: usize) {
        unreachable!("packet_received called on an outbound-only streamer")
    }
    /// The previous outbound chunk finished transmitting; queue the next
    /// one (or finish) through `endpoint`.
    fn transmit_complete(&mut self, _endpoint: &mut dyn ControlEndpoint) {
        unreachable!("transmit_complete called on an inbound-only streamer")
    }
}

/// Side-effects of the standard request set that only the device
/// orchestration layer can carry out (bus address assignment, the
/// configured/deconfigured transition, endpoint stall bookkeeping).
/// Passed to [`StandardControlHandler`] per call instead of being stored,
/// for the same reason [`ControlHandler`]/[`ControlStreamer`] resolution
/// is caller-driven (see module docs).
pub trait ControlEffects {
    fn set_address(&mut self, address: u8, phase: SetAddressPhase);
    fn set_configured(&mut self) -> Result<()>;
    fn deconfigure(&mut self);
    fn stall_endpoint(&mut self, endpoint: u16, stall: bool);
    fn stalled(&self, endpoint: u16) -> bool;
    fn validate_endpoint(&self, endpoint: u16) -> bool;
}

/// State machine driving one USB control endpoint (the mandatory
/// endpoint-0 pair). Owns only the packet buffer and bookkeeping; the
/// active handler/streamer/PCD are passed into each call by the device
/// layer that owns them.
pub struct ControlEndpointImpl {
    state: SetupState,
    setup: SetupPacket,
    packet_length: u16,
    data_length: u16,
    buffer: [u8; MAX_CONTROL_PACKET],
    speed: LinkSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupState {
    Idle,
    TxMoreData,
    TxData,
    RxData,
    TxStatus,
    RxStatus,
    Waiting,
}

/// What `setup_received` resolved the current transfer to: either a
/// one-shot handler call, or a streamer driving a multi-packet phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No handler accepted the request; the caller should stall both
    /// control endpoints.
    Rejected,
    /// `handle_control`/`complete_control` drive the rest of the
    /// transfer.
    Handler,
    /// A streamer drives the rest of the transfer.
    Streamed,
}

struct EndpointCtx<'a, P: PeripheralController> {
    ep: &'a mut ControlEndpointImpl,
    pcd: &'a mut P,
}

impl<'a, P: PeripheralController> ControlEndpoint for EndpointCtx<'a, P> {
    fn setup_packet(&self) -> SetupPacket {
        self.ep.setup
    }

    fn packet_buffer(&mut self) -> &mut [u8] {
        &mut self.ep.buffer
    }

    fn packet_length(&self) -> usize {
        self.ep.packet_length as usize
    }

    fn link_speed(&self) -> LinkSpeed {
        self.ep.speed
    }

    fn receive_packet(&mut self) {
        self.pcd.receive_packet(EP_CONTROL_OUT, &mut self.ep.buffer);
        self.ep.state = SetupState::RxData;
    }

    fn transmit_packet(&mut self, length: usize) {
        let remaining = (self.ep.setup.w_length as usize).saturating_sub(self.ep.data_length as usize);
        let length = length.min(remaining);
        self.pcd.transmit_packet(EP_CONTROL_IN, &self.ep.buffer, length);
        self.ep.data_length += length as u16;

        self.ep.state = if self.ep.data_length as usize == self.ep.setup.w_length as usize
            || length < MAX_CONTROL_PACKET
        {
            SetupState::TxData
        } else {
            SetupState::TxMoreData
        };
    }

    fn abort_request(&mut self) {
        self.ep.state = SetupState::Idle;
        self.pcd.stall_endpoint(EP_CONTROL_IN, true);
        self.pcd.stall_endpoint(EP_CONTROL_OUT, true);
    }
}

impl ControlEndpointImpl {
    pub const fn new() -> Self {
        ControlEndpointImpl {
            state: SetupState::Idle,
            setup: SetupPacket {
                bm_request_type: 0,
                b_request: 0,
                w_value: 0,
                w_index: 0,
                w_length: 0,
            },
            packet_length: 0,
            data_length: 0,
            buffer: [0u8; MAX_CONTROL_PACKET],
            speed: LinkSpeed::None,
        }
    }

    pub fn setup_packet(&self) -> SetupPacket {
        self.setup
    }

    pub fn link_speed(&self) -> LinkSpeed {
        self.speed
    }

    /// Parse the SETUP token sitting in the packet buffer without
    /// touching the state machine, so a caller can decide which handler
    /// should receive the request before driving it through
    /// [`ControlEndpointImpl::setup_received`].
    pub fn pending_setup(&self, length: usize) -> Result<SetupPacket> {
        if length != SetupPacket::LENGTH {
            return Err(Error::InvalidSetupLength);
        }

        SetupPacket::parse(&self.buffer[..SetupPacket::LENGTH]).ok_or(Error::InvalidSetupLength)
    }

    /// Reset the state machine on bus reset/disconnect, aborting whatever
    /// transfer (if any) was in flight. The caller is responsible for
    /// calling `streamer.aborted()` / `handler.complete_control(false)`
    /// first if one was active, since only it knows which was active.
    pub fn reset<P: PeripheralController>(&mut self, pcd: &mut P, speed: LinkSpeed) {
        self.speed = speed;
        self.state = SetupState::Idle;
        pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
    }

    /// A SETUP token just arrived. The caller must have already copied
    /// `length` bytes into `packet_buffer()` before calling this (the PCD
    /// delivers the raw bytes there). `resolve` is invoked with a fresh
    /// [`ControlRequest`] and must attempt each candidate handler in turn,
    /// returning the index of the one that accepted it (if any) together
    /// with the request it left behind.
    pub fn setup_received<P: PeripheralController>(
        &mut self,
        pcd: &mut P,
        length: usize,
        mut resolve: impl FnMut(&mut ControlRequest),
        handler: Option<&mut dyn ControlHandler>,
    ) -> Result<Resolution> {
        self.state = SetupState::Idle;
        self.data_length = 0;

        if length != SetupPacket::LENGTH {
            return Err(Error::InvalidSetupLength);
        }

        self.setup = SetupPacket::parse(&self.buffer[..SetupPacket::LENGTH])
            .ok_or(Error::InvalidSetupLength)?;

        let mut request = ControlRequest::new(self.setup, self.speed);
        resolve(&mut request);
        // `resolve` may have remapped a logical endpoint/interface number
        // into `request.setup`; the rest of the transfer must see that
        // remapped value, not the raw one off the wire.
        self.setup = request.setup;

        let Some(handler) = handler else {
            return Ok(Resolution::Rejected);
        };

        if !request.accepted {
            handler.setup_control(&mut request);
        }

        if !request.accepted {
            return Err(Error::ControlRequestRejected);
        }

        let device_to_host = request.direction == ControlDirection::Outbound;
        let mut valid = self.setup.device_to_host() == device_to_host
            && self.setup.w_length as u32 <= request.max_length;

        if valid && !request.uses_streamer {
            valid = self.setup.w_length as usize <= MAX_CONTROL_PACKET;
        }

        if !valid {
            return Err(Error::ControlValidationFailed);
        }

        if device_to_host {
            if request.uses_streamer {
                self.state = SetupState::Waiting;
                self.packet_length = MAX_CONTROL_PACKET as u16;
                return Ok(Resolution::Streamed);
            }

            let mut response_length = MAX_CONTROL_PACKET as u32;
            handler.handle_control(&self.setup, &mut self.buffer, &mut response_length)?;

            if response_length > self.setup.w_length as u32 {
                response_length = self.setup.w_length as u32;
            }

            pcd.transmit_packet(EP_CONTROL_IN, &self.buffer, response_length as usize);
            self.state = SetupState::TxData;
        } else if self.setup.w_length == 0 {
            let mut request_length = 0u32;
            handler.handle_control(&self.setup, &mut self.buffer, &mut request_length)?;
            self.state = SetupState::TxStatus;
            pcd.transmit_packet(EP_CONTROL_IN, &self.buffer, 0);
        } else {
            self.state = SetupState::RxData;
            pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
        }

        Ok(Resolution::Handler)
    }

    /// A non-SETUP packet arrived on the control OUT endpoint.
    pub fn packet_received<P: PeripheralController>(
        &mut self,
        pcd: &mut P,
        length: usize,
        handler: &mut dyn ControlHandler,
    ) -> Result<()> {
        match self.state {
            SetupState::RxStatus => {
                handler.complete_control(&self.setup, true);
                self.state = SetupState::Idle;
                pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
                Ok(())
            }
            SetupState::RxData => {
                let mut request_length = length as u32;
                if request_length > self.setup.w_length as u32 {
                    request_length = self.setup.w_length as u32;
                }

                handler.handle_control(&self.setup, &mut self.buffer, &mut request_length)?;
                self.state = SetupState::TxStatus;
                pcd.transmit_packet(EP_CONTROL_IN, &self.buffer, 0);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A non-SETUP, streamed packet arrived on the control OUT endpoint.
    pub fn packet_received_streamed<P: PeripheralController>(
        &mut self,
        pcd: &mut P,
        length: usize,
        streamer: &mut dyn ControlStreamer,
    ) -> Result<()> {
        if self.state != SetupState::RxData {
            return Ok(());
        }

        if self.data_length as u32 + length as u32 > self.setup.w_length as u32 {
            return Err(Error::ControlDataTooLong);
        }

        self.state = SetupState::Waiting;
        self.data_length += length as u16;
        streamer.packet_received(&self.buffer, length);

        let completed = self.state != SetupState::Idle && self.data_length as u32 >= self.setup.w_length as u32;
        if completed {
            self.state = SetupState::TxStatus;
            pcd.transmit_packet(EP_CONTROL_IN, &self.buffer, 0);
        }

        Ok(())
    }

    /// A queued transmission on the control IN endpoint completed, for a
    /// one-shot (non-streamed) transfer.
    pub fn transmit_complete<P: PeripheralController>(
        &mut self,
        pcd: &mut P,
        handler: &mut dyn ControlHandler,
    ) {
        match self.state {
            SetupState::TxStatus => {
                handler.complete_control(&self.setup, true);
                self.state = SetupState::Idle;
                pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
            }
            SetupState::TxData => {
                self.state = SetupState::RxStatus;
                pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
            }
            _ => {}
        }
    }

    /// A queued transmission on the control IN endpoint completed, for a
    /// streamed transfer.
    pub fn transmit_complete_streamed<P: PeripheralController>(
        &mut self,
        pcd: &mut P,
        streamer: &mut dyn ControlStreamer,
    ) {
        match self.state {
            SetupState::TxStatus => {
                streamer.completed();
                self.state = SetupState::Idle;
                pcd.receive_packet(EP_CONTROL_OUT, &mut self.buffer);
            }
            SetupState::TxMoreData => {
                self.state = SetupState::Waiting;
                self.packet_length = MAX_CONTROL_PACKET as u16;
                let mut ctx = EndpointCtx { ep: self, pcd };
                streamer.transmit_complete(&mut ctx);
            }
            _ => {}
        }
    }

    /// Prime the first packet of an outbound streamed transfer. Must be
    /// called once right after `setup_received` returns
    /// `Ok(Resolution::Streamed)`: that call only enters the `Waiting`
    /// state and does not itself move any bytes, so without this nudge
    /// the transfer never sends anything.
    pub fn prime_streamer<P: PeripheralController>(&mut self, pcd: &mut P, streamer: &mut dyn ControlStreamer) {
        let mut ctx = EndpointCtx { ep: self, pcd };
        streamer.transmit_complete(&mut ctx);
    }

    /// Abort whatever transfer is in flight (both control endpoints get
    /// stalled); the caller notifies the active handler/streamer first.
    pub fn abort_request<P: PeripheralController>(&mut self, pcd: &mut P) {
        self.state = SetupState::Idle;
        pcd.stall_endpoint(EP_CONTROL_IN, true);
        pcd.stall_endpoint(EP_CONTROL_OUT, true);
    }

    /// `true` while a streamer (rather than a one-shot `handle_control`
    /// call) is driving the current transfer's data phase.
    pub fn is_waiting(&self) -> bool {
        self.state == SetupState::Waiting
    }
}

impl Default for ControlEndpointImpl {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams a fixed descriptor byte range out in `MAX_CONTROL_PACKET`-sized
/// chunks. Length is taken either from the descriptor's own `bLength`
/// byte (device and other fixed-size descriptors) or from its
/// little-endian `wTotalLength` field at offset 2 (configuration
/// descriptors, which bundle interface/endpoint sub-descriptors).
pub struct ByteStreamer<'a> {
    data: &'a [u8],
    remaining: usize,
}

impl<'a> ByteStreamer<'a> {
    /// A descriptor whose length is its own first byte.
    pub fn regular(data: &'a [u8]) -> Self {
        let length = data.first().copied().unwrap_or(0) as usize;
        ByteStreamer { data, remaining: length }
    }

    /// A configuration descriptor, whose length is `wTotalLength`.
    pub fn configuration(data: &'a [u8]) -> Self {
        let length = data.get(2..4).map(|b| u16::from_le_bytes([b[0], b[1]]) as usize).unwrap_or(0);
        ByteStreamer { data, remaining: length }
    }
}

impl<'a> ControlStreamer for ByteStreamer<'a> {
    fn transmit_complete(&mut self, endpoint: &mut dyn ControlEndpoint) {
        let chunk = self.remaining.min(endpoint.packet_length());
        endpoint.packet_buffer()[..chunk].copy_from_slice(&self.data[..chunk]);
        self.data = &self.data[chunk..];
        self.remaining -= chunk;
        endpoint.transmit_packet(chunk);
    }
}

/// Lazily encodes an ASCII string as a UTF-16LE USB string descriptor,
/// emitting the 2-byte `{bLength, bDescriptorType}` header ahead of the
/// first chunk.
pub struct StringStreamer<'a> {
    str: &'a [u8],
    first: bool,
}

impl<'a> StringStreamer<'a> {
    pub fn new(str: &'a [u8]) -> Self {
        StringStreamer { str, first: true }
    }
}

const STRING_DESCRIPTOR_TYPE: u8 = 0x03;

impl<'a> ControlStreamer for StringStreamer<'a> {
    fn transmit_complete(&mut self, endpoint: &mut dyn ControlEndpoint) {
        const HEADER_LEN: usize = 2;

        let mut budget = endpoint.packet_length();
        let buf = endpoint.packet_buffer();
        let mut written = 0;

        if self.first {
            buf[0] = (HEADER_LEN + 2 * self.str.len()) as u8;
            buf[1] = STRING_DESCRIPTOR_TYPE;
            self.first = false;
            written += HEADER_LEN;
            budget -= HEADER_LEN;
        }

        while budget > 1 && !self.str.is_empty() {
            buf[written] = self.str[0];
            buf[written + 1] = 0;
            self.str = &self.str[1..];
            written += 2;
            budget -= 2;
        }

        endpoint.transmit_packet(written);
    }
}

/// A registered string descriptor.
#[derive(Debug, Clone, Copy)]
pub struct StringDescriptor {
    pub index: u8,
    pub data: &'static [u8],
}

/// Compile-time descriptor tables an integrator provides.
#[derive(Debug, Clone, Copy)]
pub struct UsbDescriptors {
    pub device: &'static [u8],
    pub configuration: &'static [u8],
    pub strings: &'static [StringDescriptor],
    /// Index of a serial-number string descriptor generated at runtime
    /// rather than stored statically, if any.
    pub serial_number_index: Option<u8>,
}

const DESCRIPTOR_DEVICE: u8 = 0x01;
const DESCRIPTOR_CONFIGURATION: u8 = 0x02;
const DESCRIPTOR_STRING: u8 = 0x03;
const DESCRIPTOR_DEV_QUALIFIER: u8 = 0x06;
const DESCRIPTOR_OTHER_SPEED: u8 = 0x07;

const REQ_GET_STATUS: u8 = 0x00;
const REQ_CLEAR_FEATURE: u8 = 0x01;
const REQ_SET_FEATURE: u8 = 0x03;
const REQ_SET_ADDRESS: u8 = 0x05;
const REQ_GET_DESCRIPTOR: u8 = 0x06;
const REQ_GET_CONFIGURATION: u8 = 0x08;
const REQ_SET_CONFIGURATION: u8 = 0x09;
const REQ_GET_INTERFACE: u8 = 0x0A;
const REQ_SET_INTERFACE: u8 = 0x0B;

const FEATURE_ENDPOINT_HALT: u16 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlFunc {
    Default,
    SetAddress,
    SetStall,
    GetStatus,
}

enum StreamerSlot<'a> {
    None,
    Byte(ByteStreamer<'a>),
    String(StringStreamer<'a>),
}

/// The chapter-9 standard request handler every device installs for
/// device- and interface-recipient requests not claimed by a function.
pub struct StandardControlHandler<'a> {
    descriptors: &'a UsbDescriptors,
    serial_number: Option<&'a [u8]>,
    func: ControlFunc,
    configured: bool,
    streamer: StreamerSlot<'a>,
}

impl<'a> StandardControlHandler<'a> {
    pub fn new(descriptors: &'a UsbDescriptors, serial_number: Option<&'a [u8]>) -> Self {
        StandardControlHandler {
            descriptors,
            serial_number,
            func: ControlFunc::Default,
            configured: false,
            streamer: StreamerSlot::None,
        }
    }

    /// `true` while a `GET_DESCRIPTOR` request is being streamed out.
    pub fn is_streaming(&self) -> bool {
        !matches!(self.streamer, StreamerSlot::None)
    }

    /// Replace the runtime serial number string, if the compiled
    /// descriptor set reserves a string index for one.
    pub fn set_serial_number(&mut self, serial: Option<&'a [u8]>) {
        self.serial_number = serial;
    }

    /// Bus reset: drop whatever was in flight and forget the configured
    /// state, so the next `SET_CONFIGURATION` re-runs hardware setup.
    pub fn reset(&mut self) {
        self.func = ControlFunc::Default;
        self.configured = false;
        self.streamer = StreamerSlot::None;
    }

    pub fn streamer_packet_received(&mut self, buffer: &[u8], length: usize) {
        match &mut self.streamer {
            StreamerSlot::Byte(s) => s.packet_received(buffer, length),
            StreamerSlot::String(s) => s.packet_received(buffer, length),
            StreamerSlot::None => {}
        }
    }

    pub fn streamer_transmit_complete(&mut self, endpoint: &mut dyn ControlEndpoint) {
        match &mut self.streamer {
            StreamerSlot::Byte(s) => s.transmit_complete(endpoint),
            StreamerSlot::String(s) => s.transmit_complete(endpoint),
            StreamerSlot::None => {}
        }
    }

    pub fn streamer_completed(&mut self) {
        match &mut self.streamer {
            StreamerSlot::Byte(s) => s.completed(),
            StreamerSlot::String(s) => s.completed(),
            StreamerSlot::None => {}
        }
        self.streamer = StreamerSlot::None;
    }

    pub fn streamer_aborted(&mut self) {
        match &mut self.streamer {
            StreamerSlot::Byte(s) => s.aborted(),
            StreamerSlot::String(s) => s.aborted(),
            StreamerSlot::None => {}
        }
        self.streamer = StreamerSlot::None;
    }

    fn setup_get_descriptor(&mut self, request: &mut ControlRequest) {
        let desc_type = (request.setup.w_value >> 8) as u8;
        let index = request.setup.w_value as u8;

        request.direction = ControlDirection::Outbound;
        request.max_length = u32::MAX;
        request.uses_streamer = true;

        match desc_type {
            DESCRIPTOR_DEVICE => {
                request.accepted = true;
                self.streamer = StreamerSlot::Byte(ByteStreamer::regular(self.descriptors.device));
            }
            DESCRIPTOR_CONFIGURATION => {
                request.accepted = true;
                self.streamer = StreamerSlot::Byte(ByteStreamer::configuration(self.descriptors.configuration));
            }
            DESCRIPTOR_STRING => self.setup_string_descriptor(request, index),
            DESCRIPTOR_DEV_QUALIFIER | DESCRIPTOR_OTHER_SPEED => {}
            _ => {}
        }
    }

    fn setup_string_descriptor(&mut self, request: &mut ControlRequest, index: u8) {
        if let (Some(serial_index), Some(serial)) = (self.descriptors.serial_number_index, self.serial_number) {
            if index != 0 && index == serial_index {
                request.accepted = true;
                self.streamer = StreamerSlot::String(StringStreamer::new(serial));
                return;
            }
        }

        for s in self.descriptors.strings {
            if s.index == index {
                request.accepted = true;
                self.streamer = StreamerSlot::Byte(ByteStreamer::regular(s.data));
                return;
            }
        }
    }

    fn setup_feature(&mut self, request: &mut ControlRequest, effects: &dyn ControlEffects) {
        if request.setup.recipient() == crate::usb::model::SetupRecipient::Endpoint
            && request.setup.w_value == FEATURE_ENDPOINT_HALT
        {
            if !effects.validate_endpoint(request.setup.w_index) {
                return;
            }

            self.func = ControlFunc::SetStall;
            request.accepted = true;
        }
    }

    /// Resolve `request` against the standard request set. `effects` is
    /// only consulted for `SET_FEATURE`/`CLEAR_FEATURE` endpoint
    /// validation; the rest of the side effects happen in
    /// [`StandardControlHandler::handle_control_with`].
    pub fn setup_control_with(&mut self, request: &mut ControlRequest, effects: &dyn ControlEffects) {
        self.func = ControlFunc::Default;

        match request.setup.b_request {
            REQ_GET_DESCRIPTOR => self.setup_get_descriptor(request),
            REQ_SET_ADDRESS => {
                request.accepted = true;
                self.func = ControlFunc::SetAddress;
            }
            REQ_SET_CONFIGURATION | REQ_SET_INTERFACE => {
                request.accepted = true;
            }
            REQ_SET_FEATURE | REQ_CLEAR_FEATURE => self.setup_feature(request, effects),
            REQ_GET_CONFIGURATION | REQ_GET_INTERFACE => {
                request.accepted = true;
                request.direction = ControlDirection::Outbound;
                request.max_length = 1;
            }
            REQ_GET_STATUS => {
                request.accepted = true;
                request.direction = ControlDirection::Outbound;
                request.max_length = 2;
                self.func = ControlFunc::GetStatus;
            }
            _ => {}
        }
    }

    /// Handle the one-shot (non-streamed) data phase, applying whichever
    /// side effect `setup_control_with` selected.
    pub fn handle_control_with(
        &mut self,
        setup: &SetupPacket,
        buffer: &mut [u8],
        length: &mut u32,
        effects: &mut dyn ControlEffects,
    ) -> Result<()> {
        match self.func {
            ControlFunc::Default => self.handle_default_control(setup, buffer, length, effects),
            ControlFunc::SetAddress => {
                effects.set_address(setup.w_value as u8, SetAddressPhase::SetupReceived);
                Ok(())
            }
            ControlFunc::SetStall => {
                effects.stall_endpoint(setup.w_index, setup.b_request == REQ_SET_FEATURE);
                Ok(())
            }
            ControlFunc::GetStatus => self.handle_get_status(setup, buffer, length, effects),
        }
    }

    /// Apply the post-transaction side effect (only `SET_ADDRESS` has
    /// one: the address takes effect once the host acknowledges the
    /// status stage).
    pub fn complete_control_with(&mut self, setup: &SetupPacket, success: bool, effects: &mut dyn ControlEffects) {
        if self.func == ControlFunc::SetAddress && success {
            effects.set_address(setup.w_value as u8, SetAddressPhase::StatusAcknowledged);
        }
    }

    fn handle_default_control(
        &mut self,
        setup: &SetupPacket,
        buffer: &mut [u8],
        length: &mut u32,
        effects: &mut dyn ControlEffects,
    ) -> Result<()> {
        match setup.b_request {
            REQ_SET_CONFIGURATION => {
                let config = setup.w_value as u8;
                if config != 0 {
                    if !self.configured {
                        effects.set_configured()?;
                    }
                    self.configured = true;
                } else if self.configured {
                    effects.deconfigure();
                    self.configured = false;
                }
                Ok(())
            }
            REQ_GET_CONFIGURATION => {
                buffer[0] = self.configured as u8;
                *length = 1;
                Ok(())
            }
            REQ_GET_INTERFACE => {
                buffer[0] = 0;
                *length = 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_get_status(
        &mut self,
        setup: &SetupPacket,
        buffer: &mut [u8],
        length: &mut u32,
        effects: &mut dyn ControlEffects,
    ) -> Result<()> {
        buffer[0] = 0;
        buffer[1] = 0;
        *length = 2;

        match setup.recipient() {
            crate::usb::model::SetupRecipient::Device => buffer[0] = 0x01,
            crate::usb::model::SetupRecipient::Endpoint => {
                if effects.validate_endpoint(setup.w_index) {
                    buffer[0] = effects.stalled(setup.w_index) as u8;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Adapts [`StandardControlHandler`] to the generic [`ControlHandler`]
/// trait for one call, supplying the [`ControlEffects`] it needs but
/// cannot store (see module docs on why handlers aren't stored by
/// reference across calls).
pub struct StandardHandlerCtx<'a, 'b> {
    pub handler: &'a mut StandardControlHandler<'b>,
    pub effects: &'a mut dyn ControlEffects,
}

impl<'a, 'b> ControlHandler for StandardHandlerCtx<'a, 'b> {
    fn setup_control(&mut self, request: &mut ControlRequest) {
        self.handler.setup_control_with(request, self.effects);
    }

    fn handle_control(&mut self, setup: &SetupPacket, buffer: &mut [u8], length: &mut u32) -> Result<()> {
        self.handler.handle_control_with(setup, buffer, length, self.effects)
    }

    fn complete_control(&mut self, setup: &SetupPacket, success: bool) {
        self.handler.complete_control_with(setup, success, self.effects);
    }
}

/// Adapts [`StandardControlHandler`]'s internal descriptor streamer to the
/// generic [`ControlStreamer`] trait for one call, mirroring
/// [`StandardHandlerCtx`]'s role for [`ControlHandler`].
pub struct StdStreamerCtx<'a, 'b> {
    pub handler: &'a mut StandardControlHandler<'b>,
}

impl<'a, 'b> ControlStreamer for StdStreamerCtx<'a, 'b> {
    fn completed(&mut self) {
        self.handler.streamer_completed();
    }

    fn aborted(&mut self) {
        self.handler.streamer_aborted();
    }

    fn packet_received(&mut self, buffer: &[u8], length: usize) {
        self.handler.streamer_packet_received(buffer, length);
    }

    fn transmit_complete(&mut self, endpoint: &mut dyn ControlEndpoint) {
        self.handler.streamer_transmit_complete(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_streamer_reads_blength_from_descriptor() {
        let descriptor = [18u8, 0x01, 0, 0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let s = ByteStreamer::regular(&descriptor);
        assert_eq!(s.remaining, 18);
    }

    #[test]
    fn byte_streamer_reads_wtotallength_from_config_descriptor() {
        let mut descriptor = [0u8; 32];
        descriptor[0] = 9;
        descriptor[1] = 0x02;
        descriptor[2..4].copy_from_slice(&25u16.to_le_bytes());
        let s = ByteStreamer::configuration(&descriptor);
        assert_eq!(s.remaining, 25);
    }

    #[test]
    fn control_request_reset_clears_acceptance() {
        let mut request = ControlRequest::new(SetupPacket::default(), LinkSpeed::Full);
        request.accepted = true;
        request.max_length = 64;
        request.reset();
        assert!(!request.accepted);
        assert_eq!(request.max_length, 0);
    }
}
