//! Action type marker.

/// Handler type bound to a client-visible action name. Derive it with `#[derive(Action)]`.
pub trait Action {
    fn name() -> &'static str
    where
        Self: Sized;
}
