//! Subcommand implementations.

mod login;
mod logout;
mod refresh;
mod request;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use authwire::http::Method;

use crate::session::SessionFile;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Exchange credentials for a token pair and store the session
    Login(login::LoginArgs),

    /// Display the stored session
    Whoami(whoami::WhoamiArgs),

    /// Renew the access token now
    Refresh(refresh::RefreshArgs),

    /// End the session and forget the tokens
    Logout(logout::LogoutArgs),

    /// Send a GET request
    Get(request::RequestArgs),

    /// Send a POST request
    Post(request::BodyRequestArgs),

    /// Send a PATCH request
    Patch(request::BodyRequestArgs),

    /// Send a DELETE request
    Delete(request::RequestArgs),
}

pub async fn handle(cmd: Command, file: &SessionFile) -> Result<()> {
    match cmd {
        Command::Login(args) => login::run(args, file).await,
        Command::Whoami(args) => whoami::run(args, file),
        Command::Refresh(args) => refresh::run(args, file).await,
        Command::Logout(args) => logout::run(args, file),
        Command::Get(args) => request::run(Method::GET, args.into(), file).await,
        Command::Post(args) => request::run(Method::POST, args, file).await,
        Command::Patch(args) => request::run(Method::PATCH, args, file).await,
        Command::Delete(args) => request::run(Method::DELETE, args.into(), file).await,
    }
}
