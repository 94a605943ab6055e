/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound byte sink.
//!
//! The session pushes serialized messages through a [`Responder`] and asks
//! it to drop the transport; whether writes block is the driver's choice,
//! never the session's concern.

/// Outbound sink a session writes through.
pub trait Responder: Send {
    /// Writes one serialized message.
    ///
    /// # Returns
    /// `false` if the transport refused the bytes; the session treats that
    /// as a transport failure and disconnects.
    fn send(&mut self, data: &[u8]) -> bool;

    /// Requests transport disconnection.
    fn disconnect(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Vec<u8>>,
        disconnected: bool,
    }

    impl Responder for Recorder {
        fn send(&mut self, data: &[u8]) -> bool {
            self.sent.push(data.to_vec());
            true
        }

        fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    #[test]
    fn test_responder_object_safety() {
        let mut responder: Box<dyn Responder> = Box::new(Recorder::default());
        assert!(responder.send(b"8=FIX.4.4\x01"));
        responder.disconnect();
    }
}
