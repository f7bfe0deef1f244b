/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. Access control is applied explicitly
/// at the module level (via Axum layers), preventing accidental exposure of
/// protected endpoints.
///
/// Auth and admin surfaces live with external collaborators (the auth provider
/// and its console), so the application itself carries exactly two tiers.

/// Routes accessible to all users (anonymous, read-only, plus registration).
/// Handlers must enforce the live-post visibility rules at the Repository level.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated user session.
pub mod authenticated;
