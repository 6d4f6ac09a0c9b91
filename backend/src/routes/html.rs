//! Server-rendered pages.

use rolegate_common::User;

use crate::models::{GuildSummary, RoleGrantOutcome, UserRecord};

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; max-width: 960px; margin: 0 auto; padding: 20px; background: #f8f9fa; color: #333; }
.container { background: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
h1 { color: #5865F2; text-align: center; }
.btn { display: inline-block; padding: 12px 24px; background: #5865F2; color: white; text-decoration: none; border: none; border-radius: 8px; font-size: 15px; font-weight: bold; cursor: pointer; margin: 6px; }
.btn:hover { background: #4752C4; }
.btn-danger { background: #dc3545; }
.center { text-align: center; }
.server-card { border: 2px solid #ddd; border-radius: 8px; padding: 12px; margin: 10px 0; }
.role-tag { display: inline-block; background: #eef; border-radius: 4px; padding: 2px 8px; margin: 2px; font-size: 12px; }
.stats { display: flex; gap: 20px; justify-content: center; margin: 20px 0; }
.stat-card { background: #5865F2; color: white; border-radius: 8px; padding: 16px 28px; text-align: center; }
.stat-number { font-size: 28px; font-weight: bold; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th, td { border: 1px solid #ddd; padding: 10px; text-align: left; }
th { background: #5865F2; color: white; }
select { padding: 8px; margin: 6px 0; border-radius: 5px; border: 1px solid #ddd; }
"#;

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<div class="container">
{body}
</div>
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// Landing page with the guild/role picker.
///
/// The picker submits `guild_id` and `role_id_<guild>` to `/login` as a plain GET form.
pub fn login_page(guilds: &[GuildSummary]) -> String {
    let mut body = String::from(
        "<h1>🔐 Member verification</h1>\n\
         <p class=\"center\">Log in with your account to receive your server role.</p>\n\
         <form method=\"GET\" action=\"/login\">\n",
    );

    if !guilds.is_empty() {
        body.push_str("<h3>Choose a server and role:</h3>\n");
        for guild in guilds {
            let tags: String = guild
                .roles
                .iter()
                .take(5)
                .map(|r| format!("<span class=\"role-tag\">{}</span>", escape_html(&r.name)))
                .collect();
            let more = match guild.roles.len() {
                n if n > 5 => format!("<span class=\"role-tag\">+{} more</span>", n - 5),
                _ => String::new(),
            };
            let options: String = guild
                .roles
                .iter()
                .map(|r| format!("<option value=\"{}\">{}</option>", r.id, escape_html(&r.name)))
                .collect();
            let members = guild
                .member_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string());

            body.push_str(&format!(
                r#"<div class="server-card">
<label><input type="radio" name="guild_id" value="{id}"> <strong>{name}</strong></label>
<p>Members: {members}</p>
<div>{tags}{more}</div>
<select name="role_id_{id}">
<option value="">Select a role...</option>
{options}
</select>
</div>
"#,
                id = guild.id,
                name = escape_html(&guild.name),
            ));
        }
    }

    body.push_str(
        "<div class=\"center\"><button type=\"submit\" class=\"btn\">Log in</button></div>\n\
         </form>\n\
         <p class=\"center\" style=\"font-size: 12px; color: #999;\">\
         By logging in you agree to the terms of use and privacy policy.</p>\n",
    );
    layout("Member verification", &body)
}

/// Post-login page.
pub fn status_page(profile: Option<&User>, outcome: Option<RoleGrantOutcome>) -> String {
    let greeting = profile
        .map(|p| format!("Welcome, {}!", escape_html(&p.tag())))
        .unwrap_or_else(|| "Welcome!".to_string());

    let role_status = match outcome {
        Some(outcome) => {
            let icon = match outcome {
                RoleGrantOutcome::Granted => "🎭",
                RoleGrantOutcome::Skipped => "ℹ️",
                RoleGrantOutcome::Failed => "⚠️",
            };
            format!("<p class=\"role-status\">{} {}</p>", icon, outcome.status_message())
        }
        None => String::new(),
    };

    let body = format!(
        r#"<div class="center">
<div style="font-size: 48px;">✅</div>
<h1>Authentication complete!</h1>
<p>{greeting}</p>
{role_status}
<a href="/logout" class="btn">Log out</a>
</div>"#
    );
    layout("Authentication complete", &body)
}

/// Operator dashboard.
pub fn admin_page(users: &[UserRecord], guild_count: usize) -> String {
    let mut body = format!(
        r#"<h1>🔐 Admin dashboard</h1>
<div class="stats">
<div class="stat-card"><div class="stat-number">{users}</div><div>Authenticated users</div></div>
<div class="stat-card"><div class="stat-number">{guild_count}</div><div>Servers</div></div>
</div>
"#,
        users = users.len(),
    );

    if users.is_empty() {
        body.push_str("<div class=\"center\"><h3>No authenticated users</h3><p>Nobody has completed authentication yet.</p></div>\n");
    } else {
        body.push_str(
            "<h2>Authenticated users</h2>\n<table>\n<tr><th>User</th><th>ID</th><th>Email</th><th>IP address</th><th>Authenticated at</th><th></th></tr>\n",
        );
        for user in users {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><a href=\"/admin/user/{}\">Details</a></td></tr>\n",
                escape_html(&user.display_name),
                escape_html(&user.external_id),
                escape_html(user.email.as_deref().unwrap_or("N/A")),
                escape_html(&user.origin_address),
                user.authenticated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                escape_html(&user.external_id),
            ));
        }
        body.push_str("</table>\n");
    }

    body.push_str(
        r#"<div class="center">
<a href="/admin/export" class="btn">📊 Export data</a>
<a href="/admin/clear" class="btn btn-danger">🗑️ Delete all data</a>
<a href="/" class="btn">🏠 Home</a>
</div>"#,
    );
    layout("Admin dashboard", &body)
}

/// Confirmation form for `/admin/clear`.
pub fn clear_confirm_page() -> String {
    layout(
        "Delete all data",
        r#"<form method="POST" action="/admin/clear" class="center">
<p>Really delete all user data?</p>
<button type="submit" class="btn btn-danger">Delete</button>
<a href="/admin" class="btn">Cancel</a>
</form>"#,
    )
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        "<div class=\"center\"><h1>❌ {}</h1><a href=\"/\" class=\"btn\">Back to start</a></div>",
        escape_html(message)
    );
    layout("Error", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rolegate_common::Snowflake;

    use crate::models::RoleSummary;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_login_page_lists_roles() {
        let guilds = vec![GuildSummary {
            id: Snowflake(10),
            name: "<Guild>".to_string(),
            member_count: Some(3),
            roles: (1..=7)
                .map(|i| RoleSummary {
                    id: Snowflake(100 + i),
                    name: format!("Role {}", i),
                    color: "#000000".to_string(),
                })
                .collect(),
        }];
        let page = login_page(&guilds);

        assert!(page.contains("&lt;Guild&gt;"));
        assert!(page.contains("value=\"10\""));
        assert!(page.contains("<option value=\"107\">Role 7</option>"));
        assert!(page.contains("+2 more"));
    }

    #[test]
    fn test_status_page_reports_every_outcome() {
        assert!(status_page(None, Some(RoleGrantOutcome::Granted))
            .contains(RoleGrantOutcome::Granted.status_message()));
        assert!(status_page(None, Some(RoleGrantOutcome::Skipped))
            .contains(RoleGrantOutcome::Skipped.status_message()));
        let failed = status_page(None, Some(RoleGrantOutcome::Failed));
        assert!(failed.contains("role-status"));
        assert!(failed.contains(RoleGrantOutcome::Failed.status_message()));
        assert!(!status_page(None, None).contains("role-status"));
    }

    #[test]
    fn test_admin_page_escapes_records() {
        let users = vec![UserRecord {
            external_id: "123".to_string(),
            display_name: "<b>eve</b>".to_string(),
            email: None,
            origin_address: "1.2.3.4".to_string(),
            authenticated_at: Utc::now(),
        }];
        let page = admin_page(&users, 1);
        assert!(page.contains("&lt;b&gt;eve&lt;/b&gt;"));
        assert!(page.contains("N/A"));
        assert!(page.contains("/admin/user/123"));
    }
}
