//! Shift and segment value types shared by every module.

pub mod shift;

pub use shift::{
    ParseStatusError, Segment, Shift, Status, segments_from_json, segments_to_json, shift_id_for,
};
