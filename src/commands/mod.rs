pub mod follow;
pub mod list;

use anyhow::Result;
use graphkit::{Client, Token};

use crate::Context;
use crate::config::Config;

/// An authenticated client for one run.
///
/// The token is acquired here once and reused by every call the command
/// makes.
pub struct Session {
    pub client: Client,
    pub token: Token,
}

/// Build the client from config and authenticate.
pub fn connect(ctx: &Context, config: &Config) -> Result<Session> {
    let graph_url = config.graph_url(&ctx.auth);
    let login_url = config.login_url();
    log::debug!("Graph endpoint: {graph_url}");

    let client = Client::with_endpoints(graph_url, login_url);
    let credentials = config.credentials(&ctx.auth);
    let token = client.authenticate(&credentials)?;
    Ok(Session { client, token })
}
