//! Defines the layout of a row in the database.
//!
//! The layout is:
//!
//! left:       8 bytes
//! right:      8 bytes
//! level:      8 bytes
//! payload:    value.size() bytes (variable size)
//!
//! The bounds are a fixed size header so bulk updates can rewrite them
//! without decoding the payload.
#![cfg_attr(not(feature = "redb"), allow(dead_code))]
use anyhow::{Context, Result};
use zerocopy::{AsBytes, FromBytes};

use crate::{Bounds, NodeData, VariableSize};

pub const BOUNDS_OFFSET: usize = 0;
pub const PAYLOAD_OFFSET: usize = BOUNDS_OFFSET + std::mem::size_of::<Bounds>();

pub fn encode<V: VariableSize>(data: &NodeData<V>) -> Vec<u8> {
    let mut buf = vec![0; PAYLOAD_OFFSET + data.value.size()];
    buf[BOUNDS_OFFSET..PAYLOAD_OFFSET].copy_from_slice(data.bounds.as_bytes());
    data.value.write(&mut buf[PAYLOAD_OFFSET..]);
    buf
}

pub fn bounds(row: &[u8]) -> Result<Bounds> {
    row.get(BOUNDS_OFFSET..PAYLOAD_OFFSET)
        .and_then(Bounds::read_from)
        .with_context(|| format!("row too short: {} bytes", row.len()))
}

pub fn set_bounds(row: &mut [u8], bounds: &Bounds) -> Result<()> {
    let header = row
        .get_mut(BOUNDS_OFFSET..PAYLOAD_OFFSET)
        .context("row too short")?;
    header.copy_from_slice(bounds.as_bytes());
    Ok(())
}

pub fn decode<V: VariableSize>(row: &[u8]) -> Result<NodeData<V>> {
    let bounds = bounds(row)?;
    let value = V::read(&row[PAYLOAD_OFFSET..])?;
    Ok(NodeData::new(bounds, value))
}
