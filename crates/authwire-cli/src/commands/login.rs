//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use authwire::{ApiUrl, Client, ClientConfig, Credentials};

use crate::output;
use crate::session::SessionFile;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account name or email address
    #[arg(long)]
    pub identifier: String,

    /// Account password
    #[arg(long)]
    pub password: String,

    /// API base URL
    #[arg(long, env = "AUTHWIRE_API")]
    pub api: String,

    /// Login endpoint, relative to the API base URL
    #[arg(long, default_value = "auth/login")]
    pub login_path: String,

    /// Renewal endpoint, relative to the API base URL
    #[arg(long, default_value = "auth/refresh")]
    pub renewal_path: String,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

pub async fn run(args: LoginArgs, file: &SessionFile) -> Result<()> {
    let api = ApiUrl::new(&args.api).context("Invalid API URL")?;
    let config = ClientConfig::new(api)
        .with_login_path(args.login_path)
        .with_renewal_path(args.renewal_path)
        .with_timeout_secs(args.timeout);
    let client = Client::new(config).context("Failed to build client")?;

    eprintln!("{}", "Logging in...".dimmed());

    client
        .login(Credentials::new(&args.identifier, &args.password))
        .await
        .context("Failed to login")?;

    file.save(&client).context("Failed to save session")?;

    output::success("Logged in successfully");
    println!();
    output::field("API", client.config().base_url.as_str());
    output::field("Identifier", &args.identifier);

    Ok(())
}
