//! Window context lookup
//!
//! Combo rules may be qualified by the focused application's window class.
//! The lookup backend is an injected capability resolved once at startup;
//! without one, class-qualified combos simply never match.

/// Provides the focused window's class label on demand. Only consulted when
/// some combo's key codes are already a subset of the candidate set, so an
/// expensive backend is never paid for on the hot path.
pub trait WindowContext: Send {
    fn focused_window_class(&mut self) -> Option<String>;
}

/// Default no-op provider.
pub struct NoContext;

impl WindowContext for NoContext {
    fn focused_window_class(&mut self) -> Option<String> {
        None
    }
}
