//! Form handling on top of [`VerifiedPost`].
//!
//! A form is rendered from a typed value plus field errors. A GET (or any
//! unverified POST) renders the initial value. A verified POST is parsed into
//! the typed value and converted; conversion either yields the value the
//! handler commits, or field errors that re-render the submitted form with
//! `422 Unprocessable Entity`.

use crate::csrf::{FormData, VerifiedPost};
use crate::error::HandlerError;
use crate::interpreter::Respond;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// A validation failure attached to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as used in the form.
    pub field: String,
    /// Message shown next to the field.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

type Parse<T> = Arc<dyn Fn(&FormData) -> Option<T> + Send + Sync>;
type Render<T> = Arc<dyn Fn(&T, &[FieldError]) -> String + Send + Sync>;

/// How to parse a form body into `T` and how to render `T` as HTML.
pub struct FormDefinition<T> {
    parse: Parse<T>,
    render: Render<T>,
}

impl<T> FormDefinition<T> {
    /// Create a definition from a parser and a renderer.
    pub fn new<P, R>(parse: P, render: R) -> Self
    where
        P: Fn(&FormData) -> Option<T> + Send + Sync + 'static,
        R: Fn(&T, &[FieldError]) -> String + Send + Sync + 'static,
    {
        Self {
            parse: Arc::new(parse),
            render: Arc::new(render),
        }
    }

    /// Parse submitted fields.
    #[must_use]
    pub fn parse(&self, data: &FormData) -> Option<T> {
        (self.parse)(data)
    }

    /// Render the form for `value` with `errors`.
    #[must_use]
    pub fn render(&self, value: &T, errors: &[FieldError]) -> String {
        (self.render)(value, errors)
    }
}

impl<T> Clone for FormDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            parse: Arc::clone(&self.parse),
            render: Arc::clone(&self.render),
        }
    }
}

impl<T> fmt::Debug for FormDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormDefinition(<parse>, <render>)")
    }
}

/// Interpreters that can run a CSRF-verified form.
pub trait Forms: VerifiedPost {
    /// Render, parse, validate and commit a form.
    fn form<T, U, C, P>(definition: FormDefinition<T>, initial: T, convert: C, on_post: P) -> Self
    where
        T: Send + 'static,
        C: FnOnce(&T) -> Result<U, Vec<FieldError>> + Send + 'static,
        P: FnOnce(U) -> Self::AfterBody + Send + 'static;
}

impl<I: VerifiedPost> Forms for I {
    fn form<T, U, C, P>(definition: FormDefinition<T>, initial: T, convert: C, on_post: P) -> Self
    where
        T: Send + 'static,
        C: FnOnce(&T) -> Result<U, Vec<FieldError>> + Send + 'static,
        P: FnOnce(U) -> Self::AfterBody + Send + 'static,
    {
        let for_get = definition.clone();
        Self::verified_post(
            move |data| {
                let Some(submitted) = definition.parse(&data) else {
                    return <Self::AfterBody as Respond>::write_error(HandlerError::bad_request(
                        "The submitted form was incomplete.",
                        "form fields failed to parse",
                    ));
                };
                match convert(&submitted) {
                    Ok(value) => on_post(value),
                    Err(errors) => <Self::AfterBody as Respond>::write_html(
                        definition.render(&submitted, &errors),
                        StatusCode::UNPROCESSABLE_ENTITY,
                    ),
                }
            },
            move || {
                <Self::AfterBody as Respond>::write_html(
                    for_get.render(&initial, &[]),
                    StatusCode::OK,
                )
            },
        )
    }
}
