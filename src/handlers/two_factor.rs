use std::io::{BufRead, Write};

use crate::access::GlId;
use crate::api::InternalApi;
use crate::error::GatewayResult;

pub const CONFIRMATION_PROMPT: &str = "Are you sure you want to generate new two-factor recovery codes?\n\
     Any existing recovery codes you saved will be invalidated. (yes/no)";

const NOT_GENERATED: &str =
    "New recovery codes have *not* been generated. Existing codes will remain valid.";

const SIGN_IN_HELP: &str = "During sign in, use one of the codes above when prompted for\n\
     your two-factor code. Then, visit your Profile Settings and add\n\
     a new device so you do not lose access to your account again.";

/// Regenerate recovery codes after an explicit `yes`
pub async fn regenerate_recovery_codes(
    api: &dyn InternalApi,
    who: &GlId,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> GatewayResult<()> {
    writeln!(out, "{}", CONFIRMATION_PROMPT)?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    if answer.trim() != "yes" {
        writeln!(out, "\n{}", NOT_GENERATED)?;
        return Ok(());
    }

    let response = api.two_factor_recovery_codes(who).await?;

    if response.success {
        writeln!(
            out,
            "Your two-factor authentication recovery codes are:\n\n{}\n\n{}",
            response.recovery_codes.join("\n"),
            SIGN_IN_HELP
        )?;
    } else {
        writeln!(
            out,
            "An error occurred while trying to generate new recovery codes.\n{}",
            response.message.unwrap_or_default()
        )?;
    }

    out.flush()?;
    Ok(())
}
