/// Router Module Index
///
/// Routes are grouped by who may call them; access control is applied per group in
/// `create_router`.

/// Open to everyone. Visibility rules decide what an anonymous or authenticated viewer sees.
pub mod public;

/// Requires a resolved `AuthUser`.
pub mod authenticated;

/// Requires the 'admin' role, checked inside each handler.
pub mod admin;
