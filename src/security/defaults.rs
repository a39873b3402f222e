//! Built-in action catalogues used by the guardrail engine.

/// Actions that are refused outright, whatever the parameters or context.
#[must_use]
pub fn default_blocked_actions() -> Vec<String> {
    vec![
        "format_disk".into(),
        "delete_system_files".into(),
        "disable_firewall".into(),
        "disable_antivirus".into(),
        "modify_boot_config".into(),
        "wipe_device".into(),
    ]
}

#[must_use]
pub fn default_critical_actions() -> Vec<String> {
    vec![
        "system_shutdown".into(),
        "system_restart".into(),
        "delete_all_files".into(),
        "uninstall_application".into(),
        "modify_system_settings".into(),
        "run_shell_command".into(),
        "make_payment".into(),
    ]
}

#[must_use]
pub fn default_high_risk_actions() -> Vec<String> {
    vec![
        "send_email".into(),
        "send_message".into(),
        "post_social_media".into(),
        "delete_file".into(),
        "move_file".into(),
        "share_file".into(),
        "install_application".into(),
        "execute_command".into(),
    ]
}

#[must_use]
pub fn default_medium_risk_actions() -> Vec<String> {
    vec![
        "create_file".into(),
        "write_file".into(),
        "download_file".into(),
        "open_application".into(),
        "close_application".into(),
        "create_calendar_event".into(),
        "fill_form".into(),
        "click_element".into(),
    ]
}

/// Substrings of an action name that raise it to high risk.
pub const RISK_KEYWORDS: &[&str] = &["delete", "remove", "send", "share"];

/// Actions that always need a detailed confirmation, whatever their tier.
#[must_use]
pub fn default_sensitive_actions() -> Vec<String> {
    vec![
        "send_email".into(),
        "send_message".into(),
        "post_social_media".into(),
        "make_payment".into(),
        "share_file".into(),
        "delete_file".into(),
    ]
}
