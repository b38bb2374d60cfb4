use super::operator_session;
use crate::services::NewAccount;
use crate::state::SharedState;

pub async fn cmd_user_list(state: &SharedState) -> anyhow::Result<()> {
    let session = operator_session(state);
    let accounts = state.account_service.list_accounts(&session).await?;

    if accounts.is_empty() {
        println!("No accounts stored.");
        println!("Log in as the administrator with the bootstrap password, or run:");
        println!("  rassegna user bootstrap --password <password>");
        return Ok(());
    }

    println!("Accounts ({}):", accounts.len());
    println!("{:-<70}", "");
    for account in accounts {
        let role = if account.is_administrator { " [admin]" } else { "" };
        let changed = if account.password_changed {
            "password set by user"
        } else {
            "initial password"
        };
        println!("• {}{}", account.username, role);
        println!(
            "  {} | {} | modified {}",
            account.email.as_deref().unwrap_or("no e-mail"),
            changed,
            account.last_modified
        );
    }

    Ok(())
}

pub async fn cmd_user_add(
    state: &SharedState,
    username: &str,
    password: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    let session = operator_session(state);
    let created = state
        .account_service
        .add_account(
            &session,
            NewAccount {
                username: username.to_string(),
                password,
                email,
            },
        )
        .await?;

    println!("✓ Added account '{}'", created.account.username);
    if let Some(password) = created.generated_password {
        println!("  Initial password: {password}");
        println!("  The user will be asked to change it.");
    }
    Ok(())
}

pub async fn cmd_user_delete(state: &SharedState, username: &str) -> anyhow::Result<()> {
    let session = operator_session(state);
    if state
        .account_service
        .delete_account(&session, username)
        .await?
    {
        println!("✓ Deleted account '{username}'");
    } else {
        println!("No account named '{username}'.");
    }
    Ok(())
}

pub async fn cmd_user_passwd(
    state: &SharedState,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let session = operator_session(state);
    let generated = state
        .account_service
        .reset_password(&session, username, password)
        .await?;

    println!("✓ Password reset for '{username}'");
    if let Some(password) = generated {
        println!("  New password: {password}");
    }
    Ok(())
}

pub async fn cmd_user_email(
    state: &SharedState,
    username: &str,
    email: Option<String>,
) -> anyhow::Result<()> {
    let session = operator_session(state);
    let account = state
        .account_service
        .set_email(&session, username, email)
        .await?;

    match account.email {
        Some(email) => println!("✓ E-mail for '{username}' set to {email}"),
        None => println!("✓ E-mail for '{username}' cleared"),
    }
    Ok(())
}

pub async fn cmd_user_bootstrap(
    state: &SharedState,
    password: &str,
    email: Option<String>,
) -> anyhow::Result<()> {
    let session = operator_session(state);
    let account = state
        .account_service
        .bootstrap_administrator(&session, password, email)
        .await?;

    println!("✓ Administrator account '{}' stored", account.username);
    Ok(())
}
