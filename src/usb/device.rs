//! Top-level device orchestration: wires the control endpoint, the
//! standard chapter-9 handler, registered functions and the
//! physical/logical resource mapping together into one object that drives
//! a peripheral controller.
//!
//! [`UsbDevice`] does not hold a long-lived reference to a [`Function`] or
//! to the peripheral controller while dispatching a control request — both
//! would alias the owning fields it already holds (`pcd`, `functions`).
//! Instead every dispatch resolves a *route* (which function, or the
//! standard handler) ahead of the call and rebuilds the short-lived
//! adapter object the control engine needs for that one call, the same
//! pattern [`control`](crate::usb::control) uses for [`EndpointCtx`].
//!
//! Side effects the standard handler wants to apply against hardware
//! (bus address, endpoint halt, the configured transition) cannot be
//! applied from inside [`control::ControlEffects`] either, for the same
//! reason: that would require a second live `&mut` borrow of `pcd` while
//! the control engine's own call already holds one. They are recorded
//! into [`PendingActions`] instead and applied once the triggering
//! control-engine call has returned and released its borrow.

use crate::usb::config::MAX_FUNCTIONS;
use crate::usb::control::{
    ControlEffects, ControlEndpointImpl, ControlRequest, Resolution, StandardControlHandler,
    StandardHandlerCtx, StdStreamerCtx, UsbDescriptors,
};
use crate::usb::function::{Function, FunctionHost};
use crate::usb::mapping::{to_logical_endpoint, to_logical_interface, to_physical_endpoint, ResourceMapping};
use crate::usb::model::{LinkSpeed, SetupPacket, SetupRecipient, SetupType, EP_CONTROL_IN, EP_CONTROL_OUT, EP_NUM};
use crate::usb::pcd::{PeripheralController, PeripheralEvent, RxPacket, SetAddressPhase};
use crate::{Error, Result};

/// Compile-time configuration an integrator provides alongside the
/// compiled descriptor set: the resource mapping generated for it and how
/// many functions it expects to have registered.
pub struct StaticConfig<'a> {
    pub descriptors: &'a UsbDescriptors,
    pub mapping: &'a ResourceMapping,
    pub function_count: usize,
    /// Per-function type fingerprint, checked against
    /// [`Function::function_type`] at [`UsbDevice::initialize`] time.
    #[cfg(feature = "function-type-ids")]
    pub function_type_ids: &'a [u32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfgState {
    Reset,
    Deconfigured,
    Configured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveRoute {
    Standard,
    Function(usize),
}

#[derive(Debug, Default, Clone, Copy)]
struct PendingActions {
    address: Option<(u8, SetAddressPhase)>,
    /// `Some(true)` to run the configured transition, `Some(false)` to
    /// deconfigure.
    configure: Option<bool>,
    stall: Option<(u16, bool)>,
}

fn halt_bit(endpoint: u16) -> u32 {
    let num = (endpoint & 0x0F) as u32;
    if endpoint & 0x80 != 0 {
        16 + num
    } else {
        num
    }
}

/// [`ControlEffects`] implementor built fresh for each call into the
/// standard handler; never holds a reference to `pcd`, only to plain
/// bookkeeping fields, so it never conflicts with the control engine's
/// own borrow of the peripheral controller.
struct DeviceEffects<'a> {
    pending: &'a mut PendingActions,
    halted: &'a u32,
    mapping: &'a ResourceMapping,
}

impl<'a> ControlEffects for DeviceEffects<'a> {
    fn set_address(&mut self, address: u8, phase: SetAddressPhase) {
        self.pending.address = Some((address, phase));
    }

    fn set_configured(&mut self) -> Result<()> {
        self.pending.configure = Some(true);
        Ok(())
    }

    fn deconfigure(&mut self) {
        self.pending.configure = Some(false);
    }

    fn stall_endpoint(&mut self, endpoint: u16, stall: bool) {
        self.pending.stall = Some((endpoint, stall));
    }

    fn stalled(&self, endpoint: u16) -> bool {
        (self.halted >> halt_bit(endpoint)) & 1 != 0
    }

    fn validate_endpoint(&self, endpoint: u16) -> bool {
        if endpoint & EP_NUM as u16 == 0 {
            return true;
        }

        if endpoint & 0xFF00 != 0 {
            return false;
        }

        to_logical_endpoint(endpoint as u8, self.mapping).is_present()
    }
}

/// [`FunctionHost`] implementor built fresh for each call down into a
/// function, translating its logical endpoint numbers to physical ones
/// through the compiled resource mapping.
struct FunctionHostCtx<'a, P: PeripheralController> {
    pcd: &'a mut P,
    mapping: &'a ResourceMapping,
    function_index: usize,
    speed: LinkSpeed,
}

impl<'a, P: PeripheralController> FunctionHost for FunctionHostCtx<'a, P> {
    fn link_speed(&self) -> LinkSpeed {
        self.speed
    }

    fn stall_endpoint(&mut self, logical_endpoint: u8, stall: bool) {
        let physical = to_physical_endpoint(self.function_index, logical_endpoint, self.mapping);
        self.pcd.stall_endpoint(physical, stall);
    }

    fn stalled(&self, logical_endpoint: u8) -> bool {
        let physical = to_physical_endpoint(self.function_index, logical_endpoint, self.mapping);
        self.pcd.stalled(physical)
    }

    fn receive_packet(&mut self, logical_endpoint: u8, buffer: &mut [u8]) {
        let physical = to_physical_endpoint(self.function_index, logical_endpoint, self.mapping);
        self.pcd.receive_packet(physical, buffer);
    }

    fn transmit_packet(&mut self, logical_endpoint: u8, buffer: &[u8], length: usize) {
        let physical = to_physical_endpoint(self.function_index, logical_endpoint, self.mapping);
        self.pcd.transmit_packet(physical, buffer, length);
    }
}

/// Primary USB device object.
///
/// Not thread-safe: every method here (and the [`Function`] callbacks it
/// makes) must run under whatever external synchronization guards the
/// peripheral controller's interrupt, same as the controller itself.
pub struct UsbDevice<'a, P: PeripheralController> {
    pcd: P,
    config: &'a StaticConfig<'a>,
    control: ControlEndpointImpl,
    std_handler: StandardControlHandler<'a>,
    functions: [Option<&'a mut dyn Function>; MAX_FUNCTIONS],
    function_count: usize,
    state: CfgState,
    active_route: Option<ActiveRoute>,
    pending: PendingActions,
    halted: u32,
}

impl<'a, P: PeripheralController> UsbDevice<'a, P> {
    pub fn new(pcd: P, config: &'a StaticConfig<'a>) -> Self {
        UsbDevice {
            pcd,
            config,
            control: ControlEndpointImpl::new(),
            std_handler: StandardControlHandler::new(config.descriptors, None),
            functions: core::array::from_fn(|_| None),
            function_count: 0,
            state: CfgState::Reset,
            active_route: None,
            pending: PendingActions::default(),
            halted: 0,
        }
    }

    /// Register a function implementation. Functions must be registered
    /// in the same order the descriptor compiler assigned them.
    pub fn register_function(&mut self, func: &'a mut dyn Function) -> Result<()> {
        if self.function_count >= MAX_FUNCTIONS || self.function_count >= self.config.function_count {
            return Err(Error::InvalidState);
        }

        self.functions[self.function_count] = Some(func);
        self.function_count += 1;
        Ok(())
    }

    /// Set the device serial number as an ASCII string. Only effective
    /// when the descriptor set reserves a runtime serial number index.
    pub fn set_serial_number(&mut self, serial: &'a [u8]) {
        self.std_handler.set_serial_number(Some(serial));
    }

    /// Bring up the peripheral controller. Must be called after all
    /// functions are registered.
    pub fn initialize(&mut self) -> Result<()> {
        if self.function_count != self.config.function_count {
            return Err(Error::FunctionMismatch);
        }

        #[cfg(feature = "function-type-ids")]
        for i in 0..self.function_count {
            let expected = self.config.function_type_ids[i];
            let actual = self.functions[i].as_ref().expect("registered function slot populated").function_type();
            if actual != expected {
                return Err(Error::FunctionMismatch);
            }
        }

        self.pcd.initialize()
    }

    /// Connect to the bus.
    pub fn start(&mut self) {
        self.pcd.connect();
    }

    /// Disconnect from the bus and reset all in-flight state.
    pub fn stop(&mut self) {
        self.pcd.disconnect();
        self.control.reset(&mut self.pcd, LinkSpeed::None);
        self.std_handler.reset();
        self.state = CfgState::Reset;
        self.active_route = None;
    }

    pub fn is_configured(&self) -> bool {
        self.state == CfgState::Configured
    }

    /// Obtain the [`FunctionHost`] for a registered function outside the
    /// event-processing loop, e.g. to push data into a serial function
    /// from application code. The closure gets the function and its host
    /// at the same time so it can downcast the former and drive the
    /// latter in one call.
    pub fn with_function<R>(&mut self, index: usize, f: impl FnOnce(&mut dyn Function, &mut dyn FunctionHost) -> R) -> Option<R> {
        if index >= self.function_count {
            return None;
        }

        let speed = self.control.link_speed();
        let mut host = FunctionHostCtx { pcd: &mut self.pcd, mapping: self.config.mapping, function_index: index, speed };
        let func = self.functions[index].as_mut()?;
        Some(f(&mut **func, &mut host))
    }

    /// Drain and process every pending peripheral event. Returns `true`
    /// if a bus reset was seen.
    pub fn process_events(&mut self) -> Result<bool> {
        let mut saw_reset = false;

        while let Some(event) = self.pcd.pull_event() {
            match event {
                PeripheralEvent::Reset(speed) => {
                    saw_reset = true;
                    self.process_reset(speed);
                }
                PeripheralEvent::Suspend | PeripheralEvent::Wakeup => {}
                PeripheralEvent::PacketReceived(pkt) => self.process_packet_received(pkt)?,
                PeripheralEvent::TransmitComplete(addr) => self.process_transmit_complete(addr)?,
            }
        }

        Ok(saw_reset)
    }

    fn process_reset(&mut self, speed: LinkSpeed) {
        self.control.reset(&mut self.pcd, speed);
        self.std_handler.reset();
        self.state = CfgState::Reset;
        self.active_route = None;
        self.pending = PendingActions::default();
    }

    fn process_packet_received(&mut self, ev: RxPacket) -> Result<()> {
        if ev.setup {
            return self.process_setup(ev.size);
        }

        if ev.addr == EP_CONTROL_OUT {
            return self.dispatch_control_packet(ev.size);
        }

        let logical = to_logical_endpoint(ev.addr, self.config.mapping);
        if logical.is_present() {
            let speed = self.control.link_speed();
            let index = logical.function();
            let mut host = FunctionHostCtx { pcd: &mut self.pcd, mapping: self.config.mapping, function_index: index, speed };
            if let Some(func) = self.functions[index].as_mut() {
                func.packet_received(&mut host, logical.value(), ev.size);
            }
        }

        Ok(())
    }

    fn process_transmit_complete(&mut self, addr: u8) -> Result<()> {
        if addr == EP_CONTROL_IN {
            return self.dispatch_control_transmit_complete();
        }

        let logical = to_logical_endpoint(addr, self.config.mapping);
        if logical.is_present() {
            let speed = self.control.link_speed();
            let index = logical.function();
            let mut host = FunctionHostCtx { pcd: &mut self.pcd, mapping: self.config.mapping, function_index: index, speed };
            if let Some(func) = self.functions[index].as_mut() {
                func.transmit_complete(&mut host, logical.value());
            }
        }

        Ok(())
    }

    /// Decide which handler should receive the SETUP token sitting in
    /// the control buffer: the standard handler for standard-type
    /// requests, a function for class/vendor requests once configured
    /// (broadcast to every registered function in device-recipient order,
    /// or looked up by resource mapping for endpoint/interface
    /// recipients). Runs any candidate handler's `setup_control` eagerly,
    /// so the winning [`ControlRequest`] snapshot can be replayed by the
    /// caller without invoking it a second time.
    fn resolve_control(&mut self, setup: &SetupPacket) -> Option<(ActiveRoute, ControlRequest)> {
        if setup.recipient() == SetupRecipient::Endpoint {
            let effects = DeviceEffects { pending: &mut self.pending, halted: &self.halted, mapping: self.config.mapping };
            if !effects.validate_endpoint(setup.w_index) {
                return None;
            }
        }

        if setup.request_type() == SetupType::Standard {
            let mut request = ControlRequest::new(*setup, self.control.link_speed());
            let effects = DeviceEffects { pending: &mut self.pending, halted: &self.halted, mapping: self.config.mapping };
            self.std_handler.setup_control_with(&mut request, &effects);
            return request.accepted.then_some((ActiveRoute::Standard, request));
        }

        if self.state != CfgState::Configured {
            return None;
        }

        match setup.recipient() {
            SetupRecipient::Device => {
                for i in 0..self.function_count {
                    let mut request = ControlRequest::new(*setup, self.control.link_speed());
                    let func = self.functions[i].as_mut().expect("registered function slot populated");
                    func.setup_control(&mut request);

                    if request.accepted {
                        return Some((ActiveRoute::Function(i), request));
                    }
                }

                None
            }
            SetupRecipient::Endpoint => {
                let logical = to_logical_endpoint(setup.w_index as u8, self.config.mapping);
                if !logical.is_present() {
                    return None;
                }

                let mut remapped = *setup;
                remapped.w_index = logical.value() as u16;
                let mut request = ControlRequest::new(remapped, self.control.link_speed());
                let func = self.functions[logical.function()].as_mut().expect("mapped function slot populated");
                func.setup_control(&mut request);
                request.accepted.then_some((ActiveRoute::Function(logical.function()), request))
            }
            SetupRecipient::Interface => {
                let logical = to_logical_interface(setup.w_index as u8, self.config.mapping);
                if !logical.is_present() {
                    return None;
                }

                let mut remapped = *setup;
                remapped.w_index = logical.value() as u16;
                let mut request = ControlRequest::new(remapped, self.control.link_speed());
                let func = self.functions[logical.function()].as_mut().expect("mapped function slot populated");
                func.setup_control(&mut request);
                request.accepted.then_some((ActiveRoute::Function(logical.function()), request))
            }
        }
    }

    fn process_setup(&mut self, length: usize) -> Result<()> {
        let Ok(setup) = self.control.pending_setup(length) else {
            self.control.abort_request(&mut self.pcd);
            self.active_route = None;
            return Ok(());
        };

        let resolved = self.resolve_control(&setup);
        self.active_route = resolved.as_ref().map(|(route, _)| *route);

        let result = match resolved {
            None => self.control.setup_received(&mut self.pcd, length, |_| {}, None),
            Some((ActiveRoute::Standard, snapshot)) => {
                let mut effects =
                    DeviceEffects { pending: &mut self.pending, halted: &self.halted, mapping: self.config.mapping };
                let mut handler = StandardHandlerCtx { handler: &mut self.std_handler, effects: &mut effects };
                self.control.setup_received(&mut self.pcd, length, move |req| *req = snapshot, Some(&mut handler))
            }
            Some((ActiveRoute::Function(i), snapshot)) => {
                let func = self.functions[i].as_mut().expect("registered function slot populated");
                self.control.setup_received(&mut self.pcd, length, move |req| *req = snapshot, Some(&mut **func))
            }
        };

        match result {
            Ok(Resolution::Rejected) => {
                self.control.abort_request(&mut self.pcd);
                Ok(())
            }
            Ok(Resolution::Streamed) => {
                // `setup_received` only entered `Waiting`; prime the first
                // packet of the descriptor stream before it is otherwise
                // forgotten.
                if let Some(ActiveRoute::Standard) = self.active_route {
                    let mut streamer = StdStreamerCtx { handler: &mut self.std_handler };
                    self.control.prime_streamer(&mut self.pcd, &mut streamer);
                }
                self.apply_pending()
            }
            Ok(Resolution::Handler) => self.apply_pending(),
            Err(e) => self.finish_control_error(e),
        }
    }

    fn dispatch_control_packet(&mut self, length: usize) -> Result<()> {
        let result = match self.active_route {
            None => return Ok(()),
            Some(ActiveRoute::Standard) if self.std_handler.is_streaming() => {
                let mut streamer = StdStreamerCtx { handler: &mut self.std_handler };
                self.control.packet_received_streamed(&mut self.pcd, length, &mut streamer)
            }
            Some(ActiveRoute::Standard) => {
                let mut effects =
                    DeviceEffects { pending: &mut self.pending, halted: &self.halted, mapping: self.config.mapping };
                let mut handler = StandardHandlerCtx { handler: &mut self.std_handler, effects: &mut effects };
                self.control.packet_received(&mut self.pcd, length, &mut handler)
            }
            Some(ActiveRoute::Function(i)) => {
                let func = self.functions[i].as_mut().expect("registered function slot populated");
                self.control.packet_received(&mut self.pcd, length, &mut **func)
            }
        };

        self.finish_control_result(result)
    }

    fn dispatch_control_transmit_complete(&mut self) -> Result<()> {
        match self.active_route {
            None => {}
            Some(ActiveRoute::Standard) if self.std_handler.is_streaming() => {
                let mut streamer = StdStreamerCtx { handler: &mut self.std_handler };
                self.control.transmit_complete_streamed(&mut self.pcd, &mut streamer);
            }
            Some(ActiveRoute::Standard) => {
                let mut effects =
                    DeviceEffects { pending: &mut self.pending, halted: &self.halted, mapping: self.config.mapping };
                let mut handler = StandardHandlerCtx { handler: &mut self.std_handler, effects: &mut effects };
                self.control.transmit_complete(&mut self.pcd, &mut handler);
            }
            Some(ActiveRoute::Function(i)) => {
                let func = self.functions[i].as_mut().expect("registered function slot populated");
                self.control.transmit_complete(&mut self.pcd, &mut **func);
            }
        }

        self.apply_pending()
    }

    fn finish_control_result(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.apply_pending(),
            Err(e) => self.finish_control_error(e),
        }
    }

    /// Control-protocol errors (malformed/rejected/oversized requests) are
    /// host-triggered and recoverable: stall both control endpoints and
    /// swallow the error, the same way the underlying state machine's own
    /// internal transitions never propagate one of these past a single
    /// transfer. Anything else (a function's `handle_control` surfacing a
    /// real resource error) is a genuine fault and is propagated.
    fn finish_control_error(&mut self, error: Error) -> Result<()> {
        match error {
            Error::InvalidSetupLength
            | Error::UnresolvedControlRequest
            | Error::ControlRequestRejected
            | Error::ControlValidationFailed
            | Error::ControlDataTooLong => {
                self.control.abort_request(&mut self.pcd);
                Ok(())
            }
            e => Err(e),
        }
    }

    fn apply_pending(&mut self) -> Result<()> {
        let pending = core::mem::take(&mut self.pending);

        if let Some((address, phase)) = pending.address {
            self.pcd.set_address(address, phase);
        }

        if let Some(configure) = pending.configure {
            if configure {
                self.configure_hardware()?;
                self.state = CfgState::Configured;
            } else if self.state == CfgState::Configured {
                self.state = CfgState::Deconfigured;
            }
        }

        if let Some((endpoint, stall)) = pending.stall {
            let bit = halt_bit(endpoint);
            if stall {
                self.halted |= 1 << bit;
            } else {
                self.halted &= !(1 << bit);
            }

            self.pcd.stall_endpoint(endpoint as u8, stall);
        }

        Ok(())
    }

    fn configure_hardware(&mut self) -> Result<()> {
        self.pcd.configure_device(self.config.descriptors.configuration, 0)?;

        let speed = self.control.link_speed();
        for i in 0..self.function_count {
            let mut host = FunctionHostCtx { pcd: &mut self.pcd, mapping: self.config.mapping, function_index: i, speed };
            let func = self.functions[i].as_mut().expect("registered function slot populated");
            func.initialize(&mut host)?;
        }

        Ok(())
    }
}
