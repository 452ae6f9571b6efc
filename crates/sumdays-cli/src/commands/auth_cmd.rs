use serde::Serialize;
use sumdays_core::auth::{Session, SessionStore};

use crate::cli::AuthCommands;
use crate::commands::common::{print_json, CommandContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct AuthStatus {
    signed_in: bool,
    user_id: Option<String>,
    saved_at: Option<i64>,
}

pub fn run_auth(command: AuthCommands, ctx: &CommandContext) -> Result<(), CliError> {
    let sessions = ctx.sessions();
    match command {
        AuthCommands::SetToken { token, user_id } => {
            let session = Session::new(token, user_id)?;
            sessions.save_session(&session)?;
            println!("Session token stored");
        }
        AuthCommands::Status => {
            let session = sessions.load_session()?;
            let status = AuthStatus {
                signed_in: session.is_some(),
                user_id: session.as_ref().and_then(|session| session.user_id.clone()),
                saved_at: session.as_ref().map(|session| session.saved_at),
            };
            if ctx.json {
                return print_json(&status);
            }
            match (status.signed_in, status.user_id) {
                (false, _) => println!("Not signed in"),
                (true, Some(user_id)) => println!("Signed in as {user_id}"),
                (true, None) => println!("Signed in"),
            }
        }
        AuthCommands::Logout => {
            sessions.clear_session()?;
            println!("Signed out");
        }
    }
    Ok(())
}
