//! Compile-time size limits for the USB device stack.
//!
//! These mirror the tunable preprocessor knobs of the original firmware:
//! fixed upper bounds the stack is sized against so that no module needs
//! dynamic allocation. An integrator building a larger device can raise
//! them; nothing here scales automatically with the registered function
//! count.

/// Maximum number of IN endpoints per device instance, including control.
pub const MAX_IN_ENDPOINTS: usize = 4;
/// Maximum number of OUT endpoints per device instance, including control.
pub const MAX_OUT_ENDPOINTS: usize = 4;
/// Maximum number of functions that can be registered on one device.
pub const MAX_FUNCTIONS: usize = 15;
/// Maximum number of USB interfaces per device.
pub const MAX_INTERFACES: usize = 4;
/// Maximum number of logical endpoints a single function may claim.
pub const MAX_FUNC_ENDPOINTS: usize = 4;
/// Maximum control transfer packet size; must be 8, 16, 32 or 64 per the
/// USB specification.
pub const MAX_CONTROL_PACKET: usize = 64;
/// Packet size used by the CDC-ACM data endpoints.
pub const SERIAL_PACKET_LENGTH: usize = 64;

const _: () = assert!(
    MAX_CONTROL_PACKET == 8
        || MAX_CONTROL_PACKET == 16
        || MAX_CONTROL_PACKET == 32
        || MAX_CONTROL_PACKET == 64,
    "MAX_CONTROL_PACKET must be 8, 16, 32 or 64"
);
const _: () = assert!(MAX_FUNCTIONS >= 1 && MAX_FUNCTIONS <= 15);
const _: () = assert!(MAX_INTERFACES >= 1);
const _: () = assert!(MAX_FUNC_ENDPOINTS >= 1 && MAX_FUNC_ENDPOINTS <= 16);

/// Whether the compiled configuration has any endpoints beyond the control
/// pair, and therefore needs the physical/logical remapping machinery.
pub const HAVE_DATA_ENDPOINTS: bool = MAX_IN_ENDPOINTS > 1 || MAX_OUT_ENDPOINTS > 1;

/// Whether resource mapping tables are needed at all (either because there
/// are data endpoints, or because more than one function shares the device
/// and needs interface remapping even without extra endpoints).
pub const HAVE_RESOURCE_MAPPING: bool = HAVE_DATA_ENDPOINTS || MAX_FUNCTIONS > 1;
