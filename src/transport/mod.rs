pub mod codec;
pub mod in_flight;
pub mod request_id;
