/// Router Module Index
///
/// Splits the API by access level. The staff layer is applied to the whole
/// `authenticated` router in `create_router`; admin-only handlers additionally
/// check the role themselves.

/// Routes open to anyone: health probe and login.
pub mod public;

/// Routes behind the staff guard (admin or manager).
pub mod authenticated;
