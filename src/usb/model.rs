//! Wire-level types shared by every layer of the USB stack: the SETUP
//! packet, endpoint address bits, and link speed/type enumerations.

/// Endpoint address bit: direction is IN (device to host).
pub const EP_IN: u8 = 0x80;
/// Endpoint address bit: direction is OUT (host to device).
pub const EP_OUT: u8 = 0x00;
/// Physical address of the control IN endpoint.
pub const EP_CONTROL_IN: u8 = EP_IN;
/// Physical address of the control OUT endpoint.
pub const EP_CONTROL_OUT: u8 = EP_OUT;
/// Mask isolating the endpoint number from its direction bit.
pub const EP_NUM: u8 = 0x0F;

/// Negotiated USB link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkSpeed {
    /// Not connected / not yet negotiated.
    None = 0,
    Low = 1,
    Full = 2,
    High = 3,
}

/// `bEndpointType` field values from an endpoint descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointType {
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// `bmRequestType` type field (bits 5-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupType {
    Standard = 0,
    Class = 1,
    Vendor = 2,
}

/// `bmRequestType` recipient field (bits 0-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
}

/// An 8-byte USB control transfer SETUP token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub bm_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

impl SetupPacket {
    /// Wire length of a SETUP token.
    pub const LENGTH: usize = 8;

    /// Parse a SETUP token off the wire. Returns `None` if `raw` is not
    /// exactly [`SetupPacket::LENGTH`] bytes.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() != Self::LENGTH {
            return None;
        }

        Some(SetupPacket {
            bm_request_type: raw[0],
            b_request: raw[1],
            w_value: u16::from_le_bytes([raw[2], raw[3]]),
            w_index: u16::from_le_bytes([raw[4], raw[5]]),
            w_length: u16::from_le_bytes([raw[6], raw[7]]),
        })
    }

    /// `true` if the data phase (if any) flows device to host.
    pub fn device_to_host(&self) -> bool {
        self.bm_request_type & 0x80 != 0
    }

    pub fn request_type(&self) -> SetupType {
        match (self.bm_request_type >> 5) & 0x03 {
            0 => SetupType::Standard,
            1 => SetupType::Class,
            _ => SetupType::Vendor,
        }
    }

    pub fn recipient(&self) -> SetupRecipient {
        match self.bm_request_type & 0x1F {
            1 => SetupRecipient::Interface,
            2 => SetupRecipient::Endpoint,
            _ => SetupRecipient::Device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_layout() {
        let raw = [0xA1, 0x06, 0x00, 0x02, 0x01, 0x00, 0x12, 0x00];
        let setup = SetupPacket::parse(&raw).unwrap();
        assert_eq!(setup.bm_request_type, 0xA1);
        assert_eq!(setup.b_request, 0x06);
        assert_eq!(setup.w_value, 0x0200);
        assert_eq!(setup.w_index, 0x0001);
        assert_eq!(setup.w_length, 0x0012);
        assert!(setup.device_to_host());
        assert_eq!(setup.request_type(), SetupType::Class);
        assert_eq!(setup.recipient(), SetupRecipient::Interface);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(SetupPacket::parse(&[0u8; 7]).is_none());
    }
}
