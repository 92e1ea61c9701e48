use super::handlers::{audit, auth, certificates, companies, groups, health, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers sharing a path go in
/// the same `routes!` call.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register))
        .routes(routes!(auth::login))
        .routes(routes!(auth::complete_mfa))
        .routes(routes!(auth::session))
        .routes(routes!(auth::logout))
        .routes(routes!(auth::accept_invite))
        .routes(routes!(users::create_invitation))
        .routes(routes!(users::list_users))
        .routes(routes!(users::set_user_active))
        .routes(routes!(users::begin_mfa_enrollment))
        .routes(routes!(users::confirm_mfa_enrollment))
        .routes(routes!(users::disable_mfa))
        .routes(routes!(companies::create_company, companies::list_companies))
        .routes(routes!(companies::get_company, companies::delete_company))
        .routes(routes!(groups::create_group, groups::list_groups))
        .routes(routes!(groups::delete_group))
        .routes(routes!(
            certificates::upload_certificate,
            certificates::list_certificates
        ))
        .routes(routes!(certificates::certificate_summary))
        .routes(routes!(
            certificates::get_certificate,
            certificates::delete_certificate
        ))
        .routes(routes!(certificates::certificate_password))
        .routes(routes!(certificates::list_alerts))
        .routes(routes!(audit::list_audit_entries));

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and store health".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, MFA, and sessions".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("User administration and invitations".to_string());

    let mut companies_tag = Tag::new("companies");
    companies_tag.description = Some("Monitored companies".to_string());

    let mut groups_tag = Tag::new("groups");
    groups_tag.description = Some("Company groups".to_string());

    let mut certificates_tag = Tag::new("certificates");
    certificates_tag.description = Some("Certificates, passwords, and expiry alerts".to_string());

    let mut audit_tag = Tag::new("audit");
    audit_tag.description = Some("Append-only audit trail".to_string());

    router.get_openapi_mut().tags = Some(vec![
        health_tag,
        auth_tag,
        users_tag,
        companies_tag,
        groups_tag,
        certificates_tag,
        audit_tag,
    ]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
