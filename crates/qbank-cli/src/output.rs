//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use qbank_core::UserIdentity;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print the fields of a user identity.
pub fn identity(user: &UserIdentity) {
    field("ID", &user.id.to_string());
    field("Username", &user.username);
    field("Email", &user.email);
    field("Role", user.role.as_str());
    if !user.is_active {
        field("Active", "no");
    }
    if let Some(last_login) = user.last_login {
        field("Last login", &last_login.format("%Y-%m-%d %H:%M:%S").to_string());
    }
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
