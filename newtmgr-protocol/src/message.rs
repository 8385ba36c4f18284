use crate::error::Result;
use crate::frame::Envelope;
use crate::group::Group;
use crate::op::Op;

/// An application-level request/response pair carried in an [`Envelope`] payload.
///
/// Both codec functions are pure: they see only payload bytes, never the
/// header or the transport.
pub trait Message {
    /// Request op; the device replies with `OP.response()`.
    const OP: Op;
    const GROUP: Group;
    const ID: u8;

    type Response;

    fn encode_request(&self) -> Vec<u8>;

    fn decode_response(payload: &[u8]) -> Result<Self::Response>;

    /// Wrap the encoded request in an envelope with sequence 0.
    fn to_envelope(&self) -> Envelope {
        Envelope::request(Self::OP, Self::GROUP, Self::ID, self.encode_request())
    }
}
