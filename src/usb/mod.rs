//! USB 2.0 full/low-speed device stack: a control-transfer state machine,
//! physical/logical endpoint remapping for devices that host several
//! functions, a function framework, and a CDC-ACM serial function built
//! on top of it.
//!
//! Everything here is driven synchronously from [`device::UsbDevice::process_events`];
//! there is no background task and no interior mutability anywhere in the
//! stack. The caller is responsible for invoking it from wherever the
//! peripheral controller's interrupt is handled (or a task it wakes).

pub mod cdc_acm;
pub mod config;
pub mod control;
pub mod device;
pub mod function;
pub mod mapping;
pub mod model;
pub mod pcd;

pub use cdc_acm::{LineCoding, SerialFunction};
pub use control::{ControlDirection, ControlEffects, ControlEndpoint, ControlHandler, ControlRequest, ControlStreamer};
pub use device::{StaticConfig, UsbDevice};
pub use function::{Function, FunctionHost, FunctionLogic};
pub use mapping::{LogicalIndex, ResourceMapping};
pub use model::{EndpointType, LinkSpeed, SetupPacket, SetupRecipient, SetupType};
pub use pcd::{PeripheralController, PeripheralEvent};
