//! CAN frame layouts.
//!
//! The six floats of a telemetry record map onto a fixed set of CAN frames.
//! Deployments differ only in how the floats are split across ids, so the
//! split is carried as data rather than as separate code paths: the relay
//! iterates whatever layout its configuration selected.

use crate::{BusFrame, ProtocolError};

/// One CAN frame of a layout: which record fields land in which id.
///
/// A frame carries one f32 (4-byte payload) or two (8-byte payload),
/// little-endian, packed contiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    /// 11-bit CAN identifier.
    pub id: u16,
    /// Indices into the six wire fields, in payload order.
    pub fields: Vec<usize>,
}

/// Ordered mapping of the six record fields onto CAN frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    entries: Vec<LayoutEntry>,
}

impl FrameLayout {
    /// Validate and build a custom layout.
    ///
    /// Each entry must use a standard 11-bit id and map one or two of the
    /// six fields.
    pub fn new(entries: Vec<LayoutEntry>) -> Result<Self, ProtocolError> {
        for entry in &entries {
            if u32::from(entry.id) > 0x7FF {
                return Err(ProtocolError::IdOutOfRange {
                    id: u32::from(entry.id),
                });
            }
            if entry.fields.is_empty() {
                return Err(ProtocolError::EmptyLayoutEntry { id: entry.id });
            }
            if entry.fields.len() > 2 {
                return Err(ProtocolError::OversizedLayoutEntry {
                    id: entry.id,
                    count: entry.fields.len(),
                });
            }
            for &index in &entry.fields {
                if index >= 6 {
                    return Err(ProtocolError::FieldIndexOutOfRange { index });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Three 8-byte frames: alpha+beta, gamma+ax, ay+az.
    pub fn three_frame() -> Self {
        Self {
            entries: vec![
                LayoutEntry { id: 0x501, fields: vec![0, 1] },
                LayoutEntry { id: 0x502, fields: vec![2, 3] },
                LayoutEntry { id: 0x503, fields: vec![4, 5] },
            ],
        }
    }

    /// Four frames, 8/4/8/4 bytes: alpha+beta, gamma, ax+ay, az.
    pub fn four_frame() -> Self {
        Self {
            entries: vec![
                LayoutEntry { id: 0x501, fields: vec![0, 1] },
                LayoutEntry { id: 0x502, fields: vec![2] },
                LayoutEntry { id: 0x503, fields: vec![3, 4] },
                LayoutEntry { id: 0x504, fields: vec![5] },
            ],
        }
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Pack the record fields into the layout's frames, little-endian.
    pub fn pack(&self, values: &[f32; 6]) -> Vec<BusFrame> {
        self.entries
            .iter()
            .map(|entry| {
                let mut payload = [0u8; 8];
                let mut len = 0;
                for &index in &entry.fields {
                    payload[len..len + 4].copy_from_slice(&values[index].to_le_bytes());
                    len += 4;
                }
                BusFrame::new(entry.id, &payload[..len])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_frame_packs_pairs_le() {
        let frames = FrameLayout::three_frame().pack(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].id, 0x501);
        assert_eq!(frames[0].len, 8);
        assert_eq!(&frames[0].data[..4], &1.0f32.to_le_bytes());
        assert_eq!(&frames[0].data[4..], &2.0f32.to_le_bytes());

        assert_eq!(frames[1].id, 0x502);
        assert_eq!(&frames[1].data[..4], &3.0f32.to_le_bytes());
        assert_eq!(&frames[1].data[4..], &4.0f32.to_le_bytes());

        assert_eq!(frames[2].id, 0x503);
        assert_eq!(&frames[2].data[..4], &5.0f32.to_le_bytes());
        assert_eq!(&frames[2].data[4..], &6.0f32.to_le_bytes());
    }

    #[test]
    fn four_frame_alternates_payload_sizes() {
        let frames = FrameLayout::four_frame().pack(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(frames.len(), 4);

        assert_eq!(
            frames.iter().map(|f| (f.id, f.len)).collect::<Vec<_>>(),
            vec![(0x501, 8), (0x502, 4), (0x503, 8), (0x504, 4)]
        );
        // gamma alone on 0x502, az alone on 0x504
        assert_eq!(frames[1].data_slice(), &3.0f32.to_le_bytes());
        assert_eq!(frames[3].data_slice(), &6.0f32.to_le_bytes());
    }

    #[test]
    fn custom_layout_validation() {
        let too_wide = FrameLayout::new(vec![LayoutEntry {
            id: 0x501,
            fields: vec![0, 1, 2],
        }]);
        assert!(matches!(
            too_wide,
            Err(ProtocolError::OversizedLayoutEntry { id: 0x501, count: 3 })
        ));

        let bad_id = FrameLayout::new(vec![LayoutEntry {
            id: 0x800,
            fields: vec![0],
        }]);
        assert!(matches!(bad_id, Err(ProtocolError::IdOutOfRange { .. })));

        let bad_index = FrameLayout::new(vec![LayoutEntry {
            id: 0x501,
            fields: vec![6],
        }]);
        assert!(matches!(
            bad_index,
            Err(ProtocolError::FieldIndexOutOfRange { index: 6 })
        ));
    }
}
