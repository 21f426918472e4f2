//! Exclude command - toggle tinting for one site.

use anyhow::Result;

use super::CommandContext;
use crate::args::GlobalOptions;

pub async fn handle_exclude_command(options: &GlobalOptions, hostname: &str) -> Result<()> {
    log_version!();

    let context = CommandContext::open(options)?;
    let popup = context.popup();
    popup.open().await;

    if popup.toggle_site(hostname).await? {
        log_block_start!("{} is now excluded, its overlay is removed", hostname.trim());
    } else {
        log_block_start!("{} is tinted again", hostname.trim());
    }

    log_end!();
    Ok(())
}

pub fn display_help() {
    log_version!();
    log_block_start!("exclude - Toggle tinting for a site");
    log_block_start!("Usage: nightglow exclude <hostname>");
    log_block_start!("Description:");
    log_indented!("Pages of an excluded hostname never show an overlay. Running the");
    log_indented!("command again for the same hostname removes the exclusion.");
    log_block_start!("Examples:");
    log_indented!("nightglow exclude figma.com");
    log_end!();
}
