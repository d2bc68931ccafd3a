//! HTML pages as escaped strings.
//!
//! Every value interpolated into markup goes through [`escape`]; every form
//! carries the session user's token in a hidden `csrf` input.

pub mod account;
pub mod episodes;
pub mod subscription;

use crate::context::AssetMap;
use crate::model::Session;
use reel_core::csrf::CSRF_FIELD;
use reel_core::html::escape;
use reel_core::{CsrfToken, FieldError};
use std::fmt::Write;

/// Wrap `body` in the site layout.
#[must_use]
pub fn page(assets: &AssetMap, title: &str, session: Option<&Session>, body: &str) -> String {
    let account = match session {
        Some(session) => format!(
            "<a href=\"/account/billing\">{}</a> <a href=\"/logout\">Log out</a>",
            escape(&session.user.name)
        ),
        None => "<a href=\"/login?continue=%2F\">Log in</a>".to_owned(),
    };
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title} | Reel</title>\
         <link rel=\"stylesheet\" href=\"{stylesheet}\"></head><body>\
         <header><a href=\"/\">Reel</a> <a href=\"/episodes\">Episodes</a> \
         <a href=\"/subscribe\">Subscribe</a> {account}</header>\
         <main>{body}</main></body></html>",
        title = escape(title),
        stylesheet = assets.url("app.css"),
    )
}

/// The hidden token input.
#[must_use]
pub fn csrf_input(token: &CsrfToken) -> String {
    format!(
        "<input type=\"hidden\" name=\"{CSRF_FIELD}\" value=\"{}\">",
        escape(token.as_str())
    )
}

/// A `POST` form around `fields`.
#[must_use]
pub fn form(action: &str, token: &CsrfToken, fields: &str, submit: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\">{}{fields}<button type=\"submit\">{}</button></form>",
        escape(action),
        csrf_input(token),
        escape(submit)
    )
}

/// A labeled text input with its errors.
#[must_use]
pub fn text_field(name: &str, label: &str, value: &str, errors: &[FieldError]) -> String {
    let mut html = format!(
        "<label>{}<input type=\"text\" name=\"{name}\" value=\"{}\"></label>",
        escape(label),
        escape(value)
    );
    for error in errors.iter().filter(|error| error.field == name) {
        let _ = write!(html, "<p class=\"error\">{}</p>", escape(&error.message));
    }
    html
}

/// Errors not tied to a rendered field.
#[must_use]
pub fn form_errors(errors: &[FieldError], fields: &[&str]) -> String {
    errors
        .iter()
        .filter(|error| !fields.contains(&error.field.as_str()))
        .map(|error| format!("<p class=\"error\">{}</p>", escape(&error.message)))
        .collect()
}

/// A one-button form, for cancel, reactivate and delete.
#[must_use]
pub fn button(action: &str, token: &CsrfToken, label: &str) -> String {
    form(action, token, "", label)
}
