//! Controller protocol messages and their fixed-size little-endian encoding
//!
//! Every message starts with a `u32` tag. At rendezvous entry the scheduler
//! sends `StartFrameBoundary` followed by the `u64` frame index; the
//! controller answers with any number of `RuntimeFlags` / `AllInputs`
//! messages and finishes with `EndFrameBoundary`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use virtual_time::FrameIndex;

use crate::error::ProtocolError;
use crate::inputs::{InputSnapshot, PointerState, CONTROLLER_AXES, MAX_CONTROLLERS, MAX_KEYS};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageTag {
    StartFrameBoundary = 0x01,
    RuntimeFlags = 0x10,
    AllInputs = 0x11,
    EndFrameBoundary = 0x12,
}

impl TryFrom<u32> for MessageTag {
    type Error = ProtocolError;

    fn try_from(tag: u32) -> Result<Self, ProtocolError> {
        match tag {
            0x01 => Ok(MessageTag::StartFrameBoundary),
            0x10 => Ok(MessageTag::RuntimeFlags),
            0x11 => Ok(MessageTag::AllInputs),
            0x12 => Ok(MessageTag::EndFrameBoundary),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

/// Settings the controller may change between frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeFlags {
    pub framerate: u32,
    pub fast_forward: bool,
    pub num_controllers: u8,
    pub capture_enabled: bool,
}

/// Messages the controller sends during a rendezvous
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerMessage {
    Flags(RuntimeFlags),
    Inputs(Box<InputSnapshot>),
    EndFrameBoundary,
}

impl ControllerMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            ControllerMessage::Flags(_) => MessageTag::RuntimeFlags,
            ControllerMessage::Inputs(_) => MessageTag::AllInputs,
            ControllerMessage::EndFrameBoundary => MessageTag::EndFrameBoundary,
        }
    }
}

/// Encoded size of a `RuntimeFlags` payload
pub const RUNTIME_FLAGS_SIZE: usize = 8;
/// Encoded size of an `InputSnapshot` payload
pub const INPUT_SNAPSHOT_SIZE: usize =
    MAX_KEYS * 4 + 12 + MAX_CONTROLLERS * CONTROLLER_AXES * 2 + MAX_CONTROLLERS * 2;

pub fn write_frame_start<W: Write>(w: &mut W, frame: FrameIndex) -> Result<(), ProtocolError> {
    w.write_u32::<LittleEndian>(MessageTag::StartFrameBoundary as u32)?;
    w.write_u64::<LittleEndian>(frame)?;
    w.flush()?;
    Ok(())
}

pub fn read_frame_start<R: Read>(r: &mut R) -> Result<FrameIndex, ProtocolError> {
    let tag = r.read_u32::<LittleEndian>()?;
    if tag != MessageTag::StartFrameBoundary as u32 {
        return Err(ProtocolError::UnexpectedTag {
            expected: MessageTag::StartFrameBoundary as u32,
            found: tag,
        });
    }
    Ok(r.read_u64::<LittleEndian>()?)
}

pub fn write_message<W: Write>(w: &mut W, message: &ControllerMessage) -> Result<(), ProtocolError> {
    w.write_u32::<LittleEndian>(message.tag() as u32)?;
    match message {
        ControllerMessage::Flags(flags) => write_flags(w, flags)?,
        ControllerMessage::Inputs(inputs) => write_inputs(w, inputs)?,
        ControllerMessage::EndFrameBoundary => {}
    }
    w.flush()?;
    Ok(())
}

pub fn read_message<R: Read>(r: &mut R) -> Result<ControllerMessage, ProtocolError> {
    let tag = r.read_u32::<LittleEndian>()?;
    match MessageTag::try_from(tag)? {
        MessageTag::RuntimeFlags => Ok(ControllerMessage::Flags(read_flags(r)?)),
        MessageTag::AllInputs => Ok(ControllerMessage::Inputs(Box::new(read_inputs(r)?))),
        MessageTag::EndFrameBoundary => Ok(ControllerMessage::EndFrameBoundary),
        MessageTag::StartFrameBoundary => Err(ProtocolError::UnexpectedTag {
            expected: MessageTag::EndFrameBoundary as u32,
            found: tag,
        }),
    }
}

fn write_flags<W: Write>(w: &mut W, flags: &RuntimeFlags) -> std::io::Result<()> {
    w.write_u32::<LittleEndian>(flags.framerate)?;
    w.write_u8(flags.fast_forward as u8)?;
    w.write_u8(flags.num_controllers)?;
    w.write_u8(flags.capture_enabled as u8)?;
    w.write_u8(0)
}

fn read_bool<R: Read>(r: &mut R, field: &str) -> Result<bool, ProtocolError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::InvalidPayload(format!("{} must be 0 or 1, got {}", field, other))),
    }
}

fn read_flags<R: Read>(r: &mut R) -> Result<RuntimeFlags, ProtocolError> {
    let framerate = r.read_u32::<LittleEndian>()?;
    let fast_forward = read_bool(r, "fast_forward")?;
    let num_controllers = r.read_u8()?;
    let capture_enabled = read_bool(r, "capture_enabled")?;
    let _reserved = r.read_u8()?;
    if num_controllers as usize > MAX_CONTROLLERS {
        return Err(ProtocolError::InvalidPayload(format!(
            "{} controllers requested, at most {} supported",
            num_controllers, MAX_CONTROLLERS
        )));
    }
    Ok(RuntimeFlags { framerate, fast_forward, num_controllers, capture_enabled })
}

fn write_inputs<W: Write>(w: &mut W, inputs: &InputSnapshot) -> std::io::Result<()> {
    for &key in &inputs.keyboard {
        w.write_u32::<LittleEndian>(key)?;
    }
    w.write_i32::<LittleEndian>(inputs.pointer.x)?;
    w.write_i32::<LittleEndian>(inputs.pointer.y)?;
    w.write_u32::<LittleEndian>(inputs.pointer.buttons)?;
    for axes in &inputs.controller_axes {
        for &value in axes {
            w.write_i16::<LittleEndian>(value)?;
        }
    }
    for &buttons in &inputs.controller_buttons {
        w.write_u16::<LittleEndian>(buttons)?;
    }
    Ok(())
}

fn read_inputs<R: Read>(r: &mut R) -> Result<InputSnapshot, ProtocolError> {
    let mut inputs = InputSnapshot::new();
    r.read_u32_into::<LittleEndian>(&mut inputs.keyboard)?;
    inputs.pointer = PointerState {
        x: r.read_i32::<LittleEndian>()?,
        y: r.read_i32::<LittleEndian>()?,
        buttons: r.read_u32::<LittleEndian>()?,
    };
    for axes in inputs.controller_axes.iter_mut() {
        r.read_i16_into::<LittleEndian>(axes)?;
    }
    r.read_u16_into::<LittleEndian>(&mut inputs.controller_buttons)?;
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_frame_start_layout() {
        let mut buf = Vec::new();
        write_frame_start(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, vec![1, 0, 0, 0, 4, 3, 2, 1, 0, 0, 0, 0]);
        assert_eq!(read_frame_start(&mut Cursor::new(buf)).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_payload_sizes() {
        let mut buf = Vec::new();
        let flags = RuntimeFlags { framerate: 60, fast_forward: true, num_controllers: 2, capture_enabled: false };
        write_message(&mut buf, &ControllerMessage::Flags(flags)).unwrap();
        assert_eq!(buf.len(), 4 + RUNTIME_FLAGS_SIZE);

        let mut buf = Vec::new();
        write_message(&mut buf, &ControllerMessage::Inputs(Box::default())).unwrap();
        assert_eq!(buf.len(), 4 + INPUT_SNAPSHOT_SIZE);
        assert_eq!(INPUT_SNAPSHOT_SIZE, 132);
    }

    #[test]
    fn test_message_sequence_decodes() {
        let mut inputs = InputSnapshot::new();
        inputs.press_key(0xff0d);
        inputs.pointer = PointerState { x: -3, y: 480, buttons: 0b10 };
        inputs.controller_axes[3][5] = i16::MIN;
        inputs.controller_buttons[1] = 0xa5a5;
        let flags = RuntimeFlags { framerate: 30, fast_forward: false, num_controllers: 4, capture_enabled: true };

        let sent = vec![
            ControllerMessage::Flags(flags),
            ControllerMessage::Inputs(Box::new(inputs)),
            ControllerMessage::EndFrameBoundary,
        ];
        let mut buf = Vec::new();
        for message in &sent {
            write_message(&mut buf, message).unwrap();
        }

        let mut cursor = Cursor::new(buf);
        let received: Vec<_> = (0..3).map(|_| read_message(&mut cursor).unwrap()).collect();
        assert_eq!(received, sent);
    }

    #[test]
    fn test_rejects_bad_input() {
        let err = read_message(&mut Cursor::new(vec![0x99, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(0x99)));

        let mut buf = Vec::new();
        buf.extend_from_slice(&(MessageTag::RuntimeFlags as u32).to_le_bytes());
        buf.extend_from_slice(&[60, 0, 0, 0, 7, 0, 0, 0]);
        assert!(matches!(read_message(&mut Cursor::new(buf)), Err(ProtocolError::InvalidPayload(_))));

        // Truncated payloads read as a disconnect.
        let truncated = vec![0x11, 0, 0, 0, 1, 2];
        assert!(matches!(read_message(&mut Cursor::new(truncated)), Err(ProtocolError::Disconnected)));
    }
}
