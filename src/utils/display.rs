//! Terminal output for the interactive and batch front ends

use crate::core::error::AdminError;
use crate::core::types::Surface;
use crate::moderation::BanStatus;
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "-".repeat(text.chars().count()).bright_cyan());
}

pub fn print_session(identity: &str, surface: Surface) {
    println!(
        "{} {}  {} {}",
        "identity".dimmed(),
        identity.bold(),
        "surface".dimmed(),
        surface.to_string().bold()
    );
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
}

/// Gateway answer; fixed refusal strings are not distinguished
pub fn print_reply(speaker: &str, reply: &str) {
    println!("{} {}", format!("{}:", speaker).bright_magenta().bold(), reply);
}

/// Result of an owner command. Authorization failures stand out from
/// validation errors.
pub fn print_admin(result: Result<String, AdminError>) {
    match result {
        Ok(message) => println!("{}", message.green()),
        Err(AdminError::Unauthorized) => eprintln!("{}", "owner only".red().bold()),
        Err(e) => eprintln!("{}", e.to_string().red()),
    }
}

pub fn print_ban_status(identity: &str, status: Option<&BanStatus>) {
    println!("{}", ban_line(identity, status));
}

fn ban_line(identity: &str, status: Option<&BanStatus>) -> String {
    match status {
        Some(ban) => format!(
            "{} {} ({}), {}s remaining",
            identity.bold(),
            "banned".red().bold(),
            ban.reason,
            ban.remaining.as_secs()
        ),
        None => format!("{} {}", identity.bold(), "not banned".green()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn test_ban_line_reports_reason_and_whole_seconds() {
        colored::control::set_override(false);
        let ban = BanStatus {
            expires_at: Instant::now() + Duration::from_secs(90),
            remaining: Duration::from_millis(89_600),
            reason: "spam".to_string(),
        };

        assert_eq!(ban_line("u1", Some(&ban)), "u1 banned (spam), 89s remaining");
        assert_eq!(ban_line("u2", None), "u2 not banned");
    }
}
