//! Core domain types shared by the services, the stores, and the API layer.

mod clock;
mod entities;
mod role;
mod severity;

pub use clock::{Clock, SystemClock};
pub use entities::{
    AuditEntry, Certificate, CertificateKind, Company, ExpiryAlert, Group, Invitation,
    Organization, PlanTier, Session, User,
};
pub use role::Role;
pub use severity::Severity;
