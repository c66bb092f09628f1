//! Account session commands: `login`, `logout`, `whoami`.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::api::ApiError;
use filen_core::auth;
use tracing::instrument;

use crate::prompt;

use super::open_store_and_api;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Account email (prompted when omitted)
    #[arg(long)]
    pub email: Option<String>,
}

/// How many wrong 2FA codes before giving up.
const MAX_TWO_FACTOR_ATTEMPTS: u32 = 3;

#[instrument(level = "info", name = "cmd::login", skip_all)]
pub async fn login(args: &Args) -> Result<()> {
    let (store, api) = open_store_and_api()?;

    let email = match &args.email {
        Some(email) => email.clone(),
        None => prompt::prompt_line("Email")?,
    };
    let password = prompt::prompt_password()?;

    // First attempt without a code; the server tells us if one is needed.
    let mut result = auth::login(&api, &store, &email, &password, None).await;

    let mut attempts = 0;
    while attempts < MAX_TWO_FACTOR_ATTEMPTS {
        match &result {
            Err(auth::AuthError::Api(ApiError::NeedTwoFactor)) => {
                eprintln!("This account is protected by two-factor authentication.");
            }
            Err(auth::AuthError::Api(ApiError::WrongTwoFactor)) => {
                eprintln!("That code was not accepted, try again.");
            }
            _ => break,
        }
        let code = prompt::prompt_two_factor()?;
        result = auth::login(&api, &store, &email, &password, Some(&code)).await;
        attempts += 1;
    }

    let credentials = result?;
    let keys = credentials.master_key_list().len();

    println!("Logged in as {}", credentials.email);
    println!("  Root folder: {}", credentials.base_folder_uuid);
    println!("  Master keys: {keys}");
    Ok(())
}

#[instrument(level = "info", name = "cmd::logout", skip_all)]
pub fn logout() -> Result<()> {
    let (store, api) = open_store_and_api()?;
    auth::logout(&api, &store)?;
    println!("Logged out, local credentials cleared.");
    Ok(())
}

#[instrument(level = "info", name = "cmd::whoami", skip_all)]
pub fn whoami() -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    match auth::whoami(&store) {
        Some(me) => {
            println!("{}", me.email);
            println!("  User id:     {}", me.user_id);
            println!("  Root folder: {}", me.base_folder_uuid);
            Ok(())
        }
        None => bail!("not logged in"),
    }
}
