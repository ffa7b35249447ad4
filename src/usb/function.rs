//! Resource virtualization for USB functions: the interface a function
//! sees of the device (logical endpoint numbers only) and the interface
//! the device sees of a function (control/data callbacks).

use crate::usb::control::{ControlHandler, ControlRequest};
use crate::usb::model::LinkSpeed;
use crate::Result;

/// What the device stack exposes *down* to a function: everything a
/// function needs is phrased in the function's own logical endpoint
/// numbering (0, 1, 2, ...), never the physical numbers the rest of the
/// device was actually wired up with.
pub trait FunctionHost {
    fn link_speed(&self) -> LinkSpeed;
    fn stall_endpoint(&mut self, logical_endpoint: u8, stall: bool);
    fn stalled(&self, logical_endpoint: u8) -> bool;
    fn receive_packet(&mut self, logical_endpoint: u8, buffer: &mut [u8]);
    fn transmit_packet(&mut self, logical_endpoint: u8, buffer: &[u8], length: usize);
}

/// A function's reaction to data-plane events, plus the control-request
/// handling every function provides.
///
/// Both callbacks are given the [`FunctionHost`] for this call rather
/// than a stored one: a function that needs host access from outside the
/// device's own dispatch (e.g. to kick off a transmission from
/// application code) takes the same `&mut dyn FunctionHost` as an
/// explicit parameter there too, instead of holding one across calls.
pub trait FunctionLogic: ControlHandler {
    /// A packet arrived on one of this function's data endpoints.
    /// `length == 0` signals a zero-length packet.
    fn packet_received(&mut self, host: &mut dyn FunctionHost, endpoint: u8, length: usize);

    /// A previously queued transmission on one of this function's data
    /// endpoints has completed.
    fn transmit_complete(&mut self, host: &mut dyn FunctionHost, endpoint: u8);
}

/// A registerable USB function (e.g. a CDC-ACM serial port). Functions
/// are configured once the device enters the configured state, at which
/// point they receive a [`FunctionHost`] to drive their endpoints through.
pub trait Function: FunctionLogic {
    /// Type fingerprint used to check that a statically compiled
    /// descriptor set and the function implementation registered at
    /// runtime actually agree on what they describe. Derived from a
    /// human-readable identifier string as the first four bytes,
    /// big-endian, of its SHA-256 hash.
    #[cfg(feature = "function-type-ids")]
    fn function_type(&self) -> u32;

    /// Called once the device has been configured; the function should
    /// queue its first receive(s) here.
    fn initialize(&mut self, host: &mut dyn FunctionHost) -> Result<()>;

    /// Downcast support for application code that registered a concrete
    /// function type and later needs it back from [`crate::usb::device::UsbDevice::with_function`].
    fn as_any_mut(&mut self) -> &mut dyn core::any::Any;
}

/// Helper for implementing [`ControlHandler::setup_control`] in a
/// function: only interface-recipient, class-type requests are ever
/// routed to a function.
pub fn is_class_interface_request(request: &ControlRequest) -> bool {
    request.setup.request_type() == crate::usb::model::SetupType::Class
        && request.setup.recipient() == crate::usb::model::SetupRecipient::Interface
}
