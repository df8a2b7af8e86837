//! Transports between the scheduler and its controller

use std::io::{Read, Write};

use crossbeam::channel::{unbounded, Receiver, Sender};
use virtual_time::FrameIndex;

use crate::error::ProtocolError;
use crate::inputs::InputSnapshot;
use crate::messages::{self, ControllerMessage, RuntimeFlags};

/// Scheduler side of the controller exchange.
///
/// `receive` blocks until the controller sends something; this is what
/// ties the frame rate to the controller.
pub trait ControllerChannel: Send {
    fn send_frame_start(&mut self, frame: FrameIndex) -> Result<(), ProtocolError>;
    fn receive(&mut self) -> Result<ControllerMessage, ProtocolError>;
}

/// Controller reached over a byte stream (socket, pipe)
pub struct StreamChannel<S> {
    stream: S,
}

impl<S: Read + Write + Send> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write + Send> ControllerChannel for StreamChannel<S> {
    fn send_frame_start(&mut self, frame: FrameIndex) -> Result<(), ProtocolError> {
        messages::write_frame_start(&mut self.stream, frame)
    }

    fn receive(&mut self) -> Result<ControllerMessage, ProtocolError> {
        messages::read_message(&mut self.stream)
    }
}

/// Controller running in the same process, connected by channels
pub struct ChannelController {
    frames: Sender<FrameIndex>,
    messages: Receiver<ControllerMessage>,
}

/// The controller's half of a [`ChannelController`]
#[derive(Clone)]
pub struct ControllerEndpoint {
    frames: Receiver<FrameIndex>,
    messages: Sender<ControllerMessage>,
}

impl ChannelController {
    pub fn pair() -> (ChannelController, ControllerEndpoint) {
        let (frame_tx, frame_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        (
            ChannelController { frames: frame_tx, messages: message_rx },
            ControllerEndpoint { frames: frame_rx, messages: message_tx },
        )
    }
}

impl ControllerChannel for ChannelController {
    fn send_frame_start(&mut self, frame: FrameIndex) -> Result<(), ProtocolError> {
        self.frames.send(frame).map_err(|_| ProtocolError::Disconnected)
    }

    fn receive(&mut self) -> Result<ControllerMessage, ProtocolError> {
        self.messages.recv().map_err(|_| ProtocolError::Disconnected)
    }
}

impl ControllerEndpoint {
    /// Block until the scheduler enters its next rendezvous.
    pub fn wait_frame(&self) -> Result<FrameIndex, ProtocolError> {
        self.frames.recv().map_err(|_| ProtocolError::Disconnected)
    }

    pub fn send(&self, message: ControllerMessage) -> Result<(), ProtocolError> {
        self.messages.send(message).map_err(|_| ProtocolError::Disconnected)
    }

    /// Send optional flags, the full input snapshot, and the end token.
    pub fn respond(&self, flags: Option<RuntimeFlags>, inputs: &InputSnapshot) -> Result<(), ProtocolError> {
        if let Some(flags) = flags {
            self.send(ControllerMessage::Flags(flags))?;
        }
        self.send(ControllerMessage::Inputs(Box::new(inputs.clone())))?;
        self.send(ControllerMessage::EndFrameBoundary)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Reads scripted controller bytes and records what the scheduler writes.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_channel_exchange() {
        let mut script = Vec::new();
        messages::write_message(&mut script, &ControllerMessage::EndFrameBoundary).unwrap();
        let mut channel = StreamChannel::new(Duplex { input: Cursor::new(script), output: Vec::new() });

        channel.send_frame_start(7).unwrap();
        assert_eq!(channel.receive().unwrap(), ControllerMessage::EndFrameBoundary);
        assert!(matches!(channel.receive(), Err(ProtocolError::Disconnected)));

        let written = channel.into_inner().output;
        assert_eq!(messages::read_frame_start(&mut Cursor::new(written)).unwrap(), 7);
    }

    #[test]
    fn test_channel_pair_exchange() {
        let (mut scheduler_side, controller) = ChannelController::pair();
        scheduler_side.send_frame_start(3).unwrap();
        assert_eq!(controller.wait_frame().unwrap(), 3);

        controller.respond(None, &InputSnapshot::new()).unwrap();
        assert!(matches!(scheduler_side.receive().unwrap(), ControllerMessage::Inputs(_)));
        assert_eq!(scheduler_side.receive().unwrap(), ControllerMessage::EndFrameBoundary);

        drop(controller);
        assert!(matches!(scheduler_side.receive(), Err(ProtocolError::Disconnected)));
        assert!(matches!(scheduler_side.send_frame_start(4), Err(ProtocolError::Disconnected)));
    }
}
