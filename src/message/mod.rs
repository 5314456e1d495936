mod deadline;
mod envelope;
mod incoming;
mod outgoing;
mod reply;

pub use deadline::{Deadline, remaining_budget};
pub use envelope::{
    CONTENT_TYPE_JSON, CONTEXT_PREFIX, Context, DEFAULT_CONTENT_ENCODING, DRIVER_VERSION, Decoded,
    DeliveryMode, FAILURE_KEY, MSG_ID_KEY, MessageProperties, Payload, REPLY_QUEUE_KEY,
    RESULT_KEY, SYSTEM_PREFIX, SystemFields, UNIQUE_ID_KEY, VERSION_HEADER, check_content_type,
    compose, decode, encode, encode_body, version_is_compatible,
};
pub use incoming::{DeliveryHandle, DeliveryState, IncomingMessage};
pub use outgoing::{OutgoingMessage, SendOptions};
pub use reply::{ReplyMessage, ReplyOutcome};
