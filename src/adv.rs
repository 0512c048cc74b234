//! Legacy advertising payload: `[len][type][value...]` structures where
//! `len` counts the type byte plus the value.

use crate::consts::*;

fn push_field(out: &mut Vec<u8>, ad_type: u8, value: &[u8]) {
    out.push((value.len() + 1) as u8);
    out.push(ad_type);
    out.extend_from_slice(value);
}

/// Build the advertisement for the keyboard: flags, optional complete local
/// name, optional appearance and the HID service UUID, in that order.
pub fn build(name: &str, appearance: u16, limited_discoverable: bool, dual_mode: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_LEGACY_ADV_LEN);

    let disc = if limited_discoverable { ADV_FLAG_LIMITED_DISC } else { ADV_FLAG_GENERAL_DISC };
    let br_edr = if dual_mode { ADV_FLAG_LE_BR_EDR } else { ADV_FLAG_BR_EDR_NOT_SUPPORTED };
    push_field(&mut out, AD_FLAGS, &[disc | br_edr]);

    if !name.is_empty() {
        push_field(&mut out, AD_NAME_COMPLETE, name.as_bytes());
    }
    if appearance != 0 {
        push_field(&mut out, AD_APPEARANCE, &appearance.to_le_bytes());
    }
    push_field(&mut out, AD_UUID16_COMPLETE, &UUID_HID_SERVICE.to_le_bytes());
    out
}

/// The fields of an advertisement this crate knows how to read back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvFields {
    pub flags: Option<u8>,
    pub name: Option<String>,
    pub appearance: Option<u16>,
    pub uuids16: Vec<u16>,
}

impl AdvFields {
    /// Walk the AD structures. Stops at a zero length or a structure running
    /// past the end; unknown types are skipped.
    pub fn parse(ad: &[u8]) -> Self {
        let mut fields = AdvFields::default();
        let mut i = 0usize;
        while i < ad.len() {
            let len = ad[i] as usize;
            if len == 0 || i + 1 + len > ad.len() {
                break;
            }
            let ty = ad[i + 1];
            let data = &ad[i + 2..i + 1 + len];
            i += 1 + len;

            match ty {
                AD_FLAGS => fields.flags = data.first().copied(),
                AD_NAME_COMPLETE => fields.name = Some(String::from_utf8_lossy(data).into_owned()),
                AD_APPEARANCE if data.len() == 2 => {
                    fields.appearance = Some(u16::from_le_bytes([data[0], data[1]]))
                }
                AD_UUID16_COMPLETE => fields
                    .uuids16
                    .extend(data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))),
                _ => {}
            }
        }
        fields
    }
}
