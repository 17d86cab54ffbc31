//! BLE advertisement parsing for controller discovery.
//!
//! The controller advertises the generic HID service, which is useless
//! as a filter on a desk full of keyboards and mice. Discovery instead
//! keys on the vendor's manufacturer-specific AD structure: the company
//! id followed by a product-type prefix identifying the controller
//! family.

use heapless::String;

use crate::config::{ADV_COMPANY_ID, ADV_PRODUCT_PREFIX};

/// AD type: manufacturer-specific data.
const AD_MANUFACTURER: u8 = 0xFF;

/// AD type: shortened local name.
const AD_NAME_SHORT: u8 = 0x08;

/// AD type: complete local name.
const AD_NAME_COMPLETE: u8 = 0x09;

/// Walk the `[len][type][payload]` AD structures of a raw advertisement,
/// calling `visit` on each until it accepts one. Malformed lengths end
/// the walk instead of reading out of bounds.
fn scan_ads(data: &[u8], mut visit: impl FnMut(u8, &[u8]) -> bool) -> bool {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if visit(data[i + 1], &data[i + 2..i + 1 + len]) {
            return true;
        }
        i += len + 1;
    }
    false
}

/// Check if the manufacturer-specific data identifies the controller
/// family: company id followed by the product-type prefix.
pub fn matches_controller(data: &[u8]) -> bool {
    let company_le = ADV_COMPANY_ID.to_le_bytes();
    scan_ads(data, |ad_type, payload| {
        ad_type == AD_MANUFACTURER
            && payload.len() >= 2 + ADV_PRODUCT_PREFIX.len()
            && payload[..2] == company_le
            && payload[2..2 + ADV_PRODUCT_PREFIX.len()] == ADV_PRODUCT_PREFIX
    })
}

/// Advertised local name, truncated to 32 bytes, or `"Controller"` when
/// the advertisement carries none.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    let mut name = String::new();
    scan_ads(data, |ad_type, payload| {
        if ad_type != AD_NAME_SHORT && ad_type != AD_NAME_COMPLETE {
            return false;
        }
        for &b in payload {
            if name.push(b as char).is_err() {
                break;
            }
        }
        true
    });
    if name.is_empty() {
        let _ = name.push_str("Controller");
    }
    name
}
