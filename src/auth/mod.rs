//! Login, sessions, MFA enrollment, invitations, and user administration.

mod pending;
mod service;
pub(crate) mod utils;

pub use service::{
    AuthService, IssuedSession, LoginOutcome, MfaEnrollment, RegisterTenant,
};
