/// API route handlers, one module per resource
///
/// Handlers only parse and validate requests and shape responses; the
/// authorization gate, transactions and the activity log live in
/// `taskdeck_shared::services`.

pub mod account;
pub mod comments;
pub mod health;
pub mod labels;
pub mod members;
pub mod mentions;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod time_logs;
