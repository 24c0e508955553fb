//! Localized display text for the API envelope.
//! Wire error codes are stable and numeric; the human-readable message is a
//! locale lookup keyed by an error-category string so the two never couple.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const DEFAULT_LANG: &str = "en-US";

type Table = HashMap<&'static str, &'static str>;

static MESSAGES: Lazy<HashMap<&'static str, Table>> = Lazy::new(|| {
    let mut all = HashMap::new();

    let mut en: Table = HashMap::new();
    en.insert("general.error_payload", "Invalid request payload");
    en.insert("general.error_query", "Missing query parameter");
    en.insert("general.must_be_number", "{key} must be a number");
    en.insert("general.no_auth", "Authorization required");
    en.insert("general.server_error", "Server error");
    en.insert("general.not_found", "Not found");
    en.insert("manager.login_error", "Manager name or password incorrect");
    en.insert("manager.logout_success", "Logout succeeded");
    en.insert("manager.repeat", "Manager name already exists");
    en.insert("manager.post_success", "Manager created");
    en.insert("manager.post_error", "Failed to create manager");
    en.insert("manager.delete_success", "Manager deleted");
    en.insert("manager.delete_error", "Failed to delete manager");
    en.insert("manager.update_token_fail", "Failed to refresh token");
    en.insert("manager.update_password_fail", "Failed to change password");
    en.insert("manager.manager_required", "Full manager account required");
    en.insert("manager.check_ack", "Check service ready");
    en.insert("team.login_error", "Team name or password incorrect");
    en.insert("team.logout_success", "Logout succeeded");
    all.insert("en-US", en);

    let mut zh: Table = HashMap::new();
    zh.insert("general.error_payload", "请求负载错误");
    zh.insert("general.error_query", "缺少查询参数");
    zh.insert("general.must_be_number", "{key} 必须为数字");
    zh.insert("general.no_auth", "未授权访问");
    zh.insert("general.server_error", "服务器错误");
    zh.insert("general.not_found", "未找到该资源");
    zh.insert("manager.login_error", "管理员名称或密码错误");
    zh.insert("manager.logout_success", "登出成功");
    zh.insert("manager.repeat", "管理员名称重复");
    zh.insert("manager.post_success", "添加管理员成功");
    zh.insert("manager.post_error", "添加管理员失败");
    zh.insert("manager.delete_success", "删除管理员成功");
    zh.insert("manager.delete_error", "删除管理员失败");
    zh.insert("manager.update_token_fail", "更新 Token 失败");
    zh.insert("manager.update_password_fail", "更新密码失败");
    zh.insert("manager.manager_required", "需要完整管理员权限");
    zh.insert("manager.check_ack", "检查服务就绪");
    zh.insert("team.login_error", "队伍名称或密码错误");
    zh.insert("team.logout_success", "登出成功");
    all.insert("zh-CN", zh);

    all
});

/// Look up the message for `key` in `lang`, falling back to en-US and finally
/// to the key itself so a missing entry is visible rather than silent.
pub fn t(lang: &str, key: &str) -> String {
    let lookup = |l: &str| MESSAGES.get(l).and_then(|tbl| tbl.get(key)).copied();
    lookup(lang)
        .or_else(|| lookup(DEFAULT_LANG))
        .unwrap_or(key)
        .to_string()
}

/// Like `t` but substitutes `{name}` placeholders from `args`.
pub fn t_with(lang: &str, key: &str, args: &[(&str, &str)]) -> String {
    let mut msg = t(lang, key);
    for (name, value) in args {
        msg = msg.replace(&format!("{{{}}}", name), value);
    }
    msg
}

/// Pick a supported language from an Accept-Language header value.
/// Only the primary tag matters; anything not Chinese falls back to en-US.
pub fn negotiate(accept_language: Option<&str>) -> &'static str {
    match accept_language {
        Some(v) if v.trim_start().to_ascii_lowercase().starts_with("zh") => "zh-CN",
        _ => DEFAULT_LANG,
    }
}
