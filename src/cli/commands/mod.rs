mod activity;
mod digest;
mod stats;
mod user;

pub use activity::cmd_activity;
pub use digest::{cmd_digest_delete, cmd_digest_list, cmd_digest_rename, cmd_digest_upload};
pub use stats::cmd_stats;
pub use user::{
    cmd_user_add, cmd_user_bootstrap, cmd_user_delete, cmd_user_email, cmd_user_list,
    cmd_user_passwd,
};

use crate::services::Session;
use crate::state::SharedState;

/// Whoever runs the CLI has local access to the store and acts as administrator.
fn operator_session(state: &SharedState) -> Session {
    let administrator = &state.config().accounts.administrator;
    Session::new(administrator, administrator)
}
