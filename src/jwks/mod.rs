//! JWK set export of the verification keys.

pub mod publisher;

pub use publisher::{Jwk, Jwks, JwksPublisher};
