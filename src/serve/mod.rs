//! Transports and static file service.

pub mod static_routes;
mod transport;

pub use transport::{attach, attach_with_signal, load_tls, Attachment, Transports};
