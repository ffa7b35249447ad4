//! The contract a peripheral controller driver implements so the rest of
//! the stack can drive it without knowing which silicon it runs on.

use crate::usb::model::LinkSpeed;
use crate::Result;

/// A received packet, reported through [`PeripheralEvent::PacketReceived`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxPacket {
    /// Physical endpoint address the packet arrived on.
    pub addr: u8,
    /// `true` if this is a SETUP token rather than a regular OUT packet.
    pub setup: bool,
    /// Number of bytes received.
    pub size: usize,
}

/// One notification pulled from the controller's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralEvent {
    /// Bus reset; link speed has just been (re)negotiated.
    Reset(LinkSpeed),
    /// Bus suspend condition detected.
    Suspend,
    /// Bus resumed from suspend.
    Wakeup,
    /// A packet (data or SETUP) has been received.
    PacketReceived(RxPacket),
    /// A previously queued transmission has completed.
    TransmitComplete(u8),
}

/// The two points in the `SET_ADDRESS` request at which a controller may
/// need to act: some hardware must adopt the new bus address immediately
/// on receiving the SETUP token, others only after the status stage has
/// been acknowledged by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetAddressPhase {
    SetupReceived,
    StatusAcknowledged,
}

/// Driver-facing contract for a USB peripheral controller (the hardware
/// block implementing the device-side USB transceiver).
///
/// Every method operates on physical endpoint addresses; the layers above
/// this trait are responsible for any logical/physical remapping.
pub trait PeripheralController {
    /// One-time hardware bring-up.
    fn initialize(&mut self) -> Result<()>;

    /// Pull the next pending event, if any.
    fn pull_event(&mut self) -> Option<PeripheralEvent>;

    /// Apply the configuration selected by `SET_CONFIGURATION`, loading
    /// whatever endpoint descriptor table corresponds to `speed_index`.
    fn configure_device(&mut self, config_data: &[u8], speed_index: usize) -> Result<()>;

    /// Enable the pull-up / signal bus presence to the host.
    fn connect(&mut self);

    /// Disable the pull-up / disconnect from the bus.
    fn disconnect(&mut self);

    /// Adopt a newly assigned bus address.
    fn set_address(&mut self, address: u8, phase: SetAddressPhase);

    /// Queue `target` to receive the next OUT packet on `endpoint`.
    fn receive_packet(&mut self, endpoint: u8, target: &mut [u8]);

    /// Queue `buffer[..length]` for transmission on `endpoint`.
    fn transmit_packet(&mut self, endpoint: u8, buffer: &[u8], length: usize);

    /// Stall or un-stall `address`.
    fn stall_endpoint(&mut self, address: u8, stall: bool);

    /// `true` if `address` is currently stalled.
    fn stalled(&self, address: u8) -> bool;
}
