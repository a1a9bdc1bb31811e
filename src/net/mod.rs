//! Network layer: optional TLS termination for the listener.

pub mod tls;
