use std::io::Write;

use crate::access::Principal;
use crate::api::InternalApi;
use crate::error::GatewayResult;

/// Greeting for a session opened without a command
pub async fn greet(principal: &Principal, api: &dyn InternalApi, out: &mut dyn Write) -> GatewayResult<()> {
    let name = principal.display_name(api).await;
    writeln!(out, "Welcome to GitLab, {}!", name)?;
    out.flush()?;
    Ok(())
}
