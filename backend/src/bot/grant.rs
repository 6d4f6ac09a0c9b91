//! Role resolution and granting.
//!
//! Two entry points share this module: the web flow (`RoleAssigner::assign`),
//! which may have to pull the user into the guild first, and the self-service
//! button (`RoleAssigner::grant_interactive`), where the member is already
//! known from the interaction payload.

use std::sync::Arc;
use std::time::Duration;

use rolegate_common::{Guild, Member, Role, Snowflake};

use crate::models::RoleGrantOutcome;
use crate::platform::{GuildPlatform, MemberJoin, PlatformError};

/// Guild and (optional) role a grant should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub guild_id: Snowflake,
    pub role_id: Option<Snowflake>,
}

/// Where the guild of a grant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTarget {
    Explicit(Target),
    AutoDetected(Target),
    ConfiguredDefault(Target),
    Unresolved,
}

impl GrantTarget {
    pub fn target(&self) -> Option<Target> {
        match self {
            GrantTarget::Explicit(t)
            | GrantTarget::AutoDetected(t)
            | GrantTarget::ConfiguredDefault(t) => Some(*t),
            GrantTarget::Unresolved => None,
        }
    }
}

/// Statically configured fallback guild/role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetDefaults {
    pub guild_id: Option<Snowflake>,
    pub role_id: Option<Snowflake>,
}

impl TargetDefaults {
    fn pair(&self) -> Option<Target> {
        match (self.guild_id, self.role_id) {
            (Some(guild_id), Some(role_id)) => Some(Target {
                guild_id,
                role_id: Some(role_id),
            }),
            _ => None,
        }
    }
}

/// First guild the bot belongs to and its first grantable role.
pub fn auto_detect(guilds: &[Guild]) -> Option<Target> {
    let guild = guilds.first()?;
    Some(Target {
        guild_id: guild.id,
        role_id: guild.first_grantable_role().map(|r| r.id),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Explicit,
    AutoDetected,
    Configured,
}

/// Resolve the effective guild/role of a grant.
///
/// Each field is taken from the first source that has it: the caller, then a
/// fully configured pair, then auto-detection, then any single configured value.
pub fn resolve_target(
    explicit_guild: Option<Snowflake>,
    explicit_role: Option<Snowflake>,
    detected: Option<Target>,
    defaults: TargetDefaults,
) -> GrantTarget {
    let preferred = match defaults.pair() {
        Some(pair) => Some((pair, Source::Configured)),
        None => detected.map(|t| (t, Source::AutoDetected)),
    };

    let guild = explicit_guild
        .map(|g| (g, Source::Explicit))
        .or_else(|| preferred.map(|(t, source)| (t.guild_id, source)))
        .or_else(|| defaults.guild_id.map(|g| (g, Source::Configured)));

    let Some((guild_id, source)) = guild else {
        return GrantTarget::Unresolved;
    };

    let role_id = explicit_role
        .or_else(|| preferred.and_then(|(t, _)| t.role_id))
        .or(defaults.role_id);

    let target = Target { guild_id, role_id };
    match source {
        Source::Explicit => GrantTarget::Explicit(target),
        Source::AutoDetected => GrantTarget::AutoDetected(target),
        Source::Configured => GrantTarget::ConfiguredDefault(target),
    }
}

/// A role-grant request from the web flow.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub user_id: Snowflake,
    /// User access token with the `guilds.join` scope.
    pub access_token: String,
    pub guild_id: Option<Snowflake>,
    pub role_id: Option<Snowflake>,
}

/// Successful outcomes of the self-service button.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveGrant {
    AlreadyHasRole(Role),
    Granted(Role),
}

#[derive(Debug, thiserror::Error)]
pub enum InteractiveGrantError {
    #[error("Role not found")]
    RoleNotFound,
    #[error("Bot lacks permission to grant this role")]
    PermissionDenied,
    #[error("Role grant failed: {0}")]
    Failed(String),
}

impl From<PlatformError> for InteractiveGrantError {
    fn from(e: PlatformError) -> Self {
        if e.is_forbidden() {
            InteractiveGrantError::PermissionDenied
        } else {
            InteractiveGrantError::Failed(e.to_string())
        }
    }
}

/// Grants guild roles through a `GuildPlatform`.
#[derive(Clone)]
pub struct RoleAssigner {
    platform: Arc<dyn GuildPlatform>,
    defaults: TargetDefaults,
    propagation_delay: Duration,
}

impl RoleAssigner {
    pub fn new(
        platform: Arc<dyn GuildPlatform>,
        defaults: TargetDefaults,
        propagation_delay: Duration,
    ) -> Self {
        Self {
            platform,
            defaults,
            propagation_delay,
        }
    }

    pub fn platform(&self) -> &Arc<dyn GuildPlatform> {
        &self.platform
    }

    pub fn defaults(&self) -> TargetDefaults {
        self.defaults
    }

    /// Auto-detected defaults; only available once the bot is ready.
    pub async fn detect(&self) -> Option<Target> {
        if !self.platform.is_ready().await {
            return None;
        }
        auto_detect(&self.platform.guilds().await)
    }

    pub async fn resolve(
        &self,
        guild_id: Option<Snowflake>,
        role_id: Option<Snowflake>,
    ) -> GrantTarget {
        let detected = if guild_id.is_some() && role_id.is_some() {
            None
        } else {
            self.detect().await
        };
        resolve_target(guild_id, role_id, detected, self.defaults)
    }

    /// Make sure the user is in the target guild and holds the target role.
    ///
    /// Never returns an error: every platform failure degrades to `Failed`.
    pub async fn assign(&self, request: &GrantRequest) -> RoleGrantOutcome {
        let resolution = self.resolve(request.guild_id, request.role_id).await;
        let Some(target) = resolution.target() else {
            tracing::info!(
                user_id = %request.user_id,
                "No guild configured or detected, skipping role grant"
            );
            return RoleGrantOutcome::Skipped;
        };
        tracing::debug!(?resolution, user_id = %request.user_id, "Resolved grant target");

        let Some(guild) = self.platform.guild(target.guild_id).await else {
            tracing::warn!(guild_id = %target.guild_id, "Target guild not found");
            return RoleGrantOutcome::Failed;
        };

        match self
            .platform
            .add_guild_member(guild.id, request.user_id, &request.access_token)
            .await
        {
            Ok(MemberJoin::Joined) => {
                tracing::info!(guild_id = %guild.id, user_id = %request.user_id, "Added user to guild");
            }
            Ok(MemberJoin::AlreadyMember) => {}
            Err(e) => {
                tracing::warn!(guild_id = %guild.id, user_id = %request.user_id, "Failed to add user to guild: {}", e);
            }
        }

        tokio::time::sleep(self.propagation_delay).await;

        let member = match self.platform.member(guild.id, request.user_id).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                tracing::warn!(guild_id = %guild.id, user_id = %request.user_id, "Member not found");
                return RoleGrantOutcome::Failed;
            }
            Err(e) => {
                tracing::error!(guild_id = %guild.id, user_id = %request.user_id, "Member lookup failed: {}", e);
                return RoleGrantOutcome::Failed;
            }
        };

        let Some(role) = target.role_id.and_then(|id| guild.role(id).cloned()) else {
            tracing::warn!(guild_id = %guild.id, role_id = ?target.role_id, "Target role not found");
            return RoleGrantOutcome::Failed;
        };

        match self
            .platform
            .add_member_role(guild.id, request.user_id, role.id)
            .await
        {
            Ok(()) => {
                let name = member.user.as_ref().map(|u| u.tag()).unwrap_or_default();
                tracing::info!(
                    guild_id = %guild.id,
                    user_id = %request.user_id,
                    "Granted role '{}' to {}",
                    role.name,
                    name
                );
                RoleGrantOutcome::Granted
            }
            Err(e) => {
                tracing::error!(guild_id = %guild.id, role_id = %role.id, "Role grant failed: {}", e);
                RoleGrantOutcome::Failed
            }
        }
    }

    /// Grant a pre-bound role to a member who pressed a role button.
    pub async fn grant_interactive(
        &self,
        guild_id: Snowflake,
        role_id: Snowflake,
        user_id: Snowflake,
        member: &Member,
    ) -> Result<InteractiveGrant, InteractiveGrantError> {
        let role = self
            .platform
            .role(guild_id, role_id)
            .await
            .ok_or(InteractiveGrantError::RoleNotFound)?;

        if member.has_role(role.id) {
            return Ok(InteractiveGrant::AlreadyHasRole(role));
        }

        self.platform
            .add_member_role(guild_id, user_id, role.id)
            .await?;
        tracing::info!(guild_id = %guild_id, user_id = %user_id, "Granted role '{}' via button", role.name);
        Ok(InteractiveGrant::Granted(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{test_guild, test_member, FakePlatform, PlatformCall};

    fn sf(id: u64) -> Snowflake {
        Snowflake(id)
    }

    fn target(guild: u64, role: Option<u64>) -> Target {
        Target {
            guild_id: sf(guild),
            role_id: role.map(sf),
        }
    }

    #[test]
    fn test_resolve_explicit_wins() {
        let resolved = resolve_target(
            Some(sf(1)),
            Some(sf(2)),
            Some(target(10, Some(11))),
            TargetDefaults {
                guild_id: Some(sf(20)),
                role_id: Some(sf(21)),
            },
        );
        assert_eq!(resolved, GrantTarget::Explicit(target(1, Some(2))));
    }

    #[test]
    fn test_resolve_auto_detected() {
        let resolved = resolve_target(None, None, Some(target(10, Some(11))), TargetDefaults::default());
        assert_eq!(resolved, GrantTarget::AutoDetected(target(10, Some(11))));
    }

    #[test]
    fn test_resolve_configured_pair_beats_auto_detection() {
        let resolved = resolve_target(
            None,
            None,
            Some(target(10, Some(11))),
            TargetDefaults {
                guild_id: Some(sf(20)),
                role_id: Some(sf(21)),
            },
        );
        assert_eq!(resolved, GrantTarget::ConfiguredDefault(target(20, Some(21))));
    }

    #[test]
    fn test_resolve_partial_config_is_fallback() {
        let defaults = TargetDefaults {
            guild_id: Some(sf(20)),
            role_id: None,
        };
        assert_eq!(
            resolve_target(None, None, Some(target(10, None)), defaults),
            GrantTarget::AutoDetected(target(10, None))
        );
        assert_eq!(
            resolve_target(None, None, None, defaults),
            GrantTarget::ConfiguredDefault(target(20, None))
        );
    }

    #[test]
    fn test_resolve_mixes_fields() {
        let resolved = resolve_target(Some(sf(1)), None, Some(target(10, Some(11))), TargetDefaults::default());
        assert_eq!(resolved, GrantTarget::Explicit(target(1, Some(11))));
    }

    #[test]
    fn test_resolve_unresolved() {
        let resolved = resolve_target(
            None,
            Some(sf(5)),
            None,
            TargetDefaults {
                guild_id: None,
                role_id: Some(sf(6)),
            },
        );
        assert_eq!(resolved, GrantTarget::Unresolved);
        assert!(resolved.target().is_none());
    }

    #[test]
    fn test_auto_detect_uses_first_guild() {
        let guilds = vec![test_guild(10, &[(11, "Managed", true), (12, "Member", false)]), test_guild(20, &[(21, "Other", false)])];
        assert_eq!(auto_detect(&guilds), Some(target(10, Some(12))));

        let bare = vec![test_guild(30, &[])];
        assert_eq!(auto_detect(&bare), Some(target(30, None)));
        assert_eq!(auto_detect(&[]), None);
    }

    fn request(guild: Option<u64>, role: Option<u64>) -> GrantRequest {
        GrantRequest {
            user_id: sf(123),
            access_token: "user-token".to_string(),
            guild_id: guild.map(sf),
            role_id: role.map(sf),
        }
    }

    fn assigner(platform: Arc<FakePlatform>, defaults: TargetDefaults) -> RoleAssigner {
        RoleAssigner::new(platform, defaults, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_assign_skips_without_any_guild() {
        let platform = Arc::new(FakePlatform::not_ready());
        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(None, None))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Skipped);
        assert!(platform.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_assign_fails_for_unknown_guild() {
        let platform = Arc::new(FakePlatform::ready(vec![]));
        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(Some(99), Some(1)))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Failed);
        assert!(platform.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_assign_grants_auto_detected_role() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        platform.join_on_add().await;

        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(None, None))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Granted);
        assert_eq!(
            platform.mutations().await,
            vec![
                PlatformCall::AddGuildMember { guild_id: sf(10), user_id: sf(123) },
                PlatformCall::AddMemberRole { guild_id: sf(10), user_id: sf(123), role_id: sf(11) },
            ]
        );
    }

    #[tokio::test]
    async fn test_assign_tolerates_join_failure_for_existing_member() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        platform.insert_member(10, test_member(123, &[])).await;
        platform.fail_joins().await;

        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(Some(10), Some(11)))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Granted);
    }

    #[tokio::test]
    async fn test_assign_fails_when_member_missing() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        platform.fail_joins().await;

        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(Some(10), Some(11)))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Failed);
    }

    #[tokio::test]
    async fn test_assign_fails_when_role_missing() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[])]));
        platform.join_on_add().await;

        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(None, None))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Failed);
        assert_eq!(platform.mutations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_assign_role_error_degrades_to_failed() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        platform.join_on_add().await;
        platform.forbid_role_grants().await;

        let outcome = assigner(platform.clone(), TargetDefaults::default())
            .assign(&request(None, None))
            .await;

        assert_eq!(outcome, RoleGrantOutcome::Failed);
    }

    #[tokio::test]
    async fn test_assign_uses_configured_defaults_when_not_ready() {
        let platform = Arc::new(FakePlatform::not_ready());
        let defaults = TargetDefaults {
            guild_id: Some(sf(10)),
            role_id: Some(sf(11)),
        };
        // Configured guild exists only in the cache of a ready bot
        let outcome = assigner(platform.clone(), defaults).assign(&request(None, None)).await;
        assert_eq!(outcome, RoleGrantOutcome::Failed);
        assert!(platform.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_interactive_already_has_role_makes_no_mutation() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        let member = test_member(123, &[11]);

        let result = assigner(platform.clone(), TargetDefaults::default())
            .grant_interactive(sf(10), sf(11), sf(123), &member)
            .await
            .unwrap();

        assert!(matches!(result, InteractiveGrant::AlreadyHasRole(ref r) if r.name == "Member"));
        assert!(platform.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_interactive_grants_role() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        let member = test_member(123, &[]);

        let result = assigner(platform.clone(), TargetDefaults::default())
            .grant_interactive(sf(10), sf(11), sf(123), &member)
            .await
            .unwrap();

        assert!(matches!(result, InteractiveGrant::Granted(_)));
        assert_eq!(platform.mutations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_interactive_role_not_found() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[])]));
        let member = test_member(123, &[]);

        let err = assigner(platform, TargetDefaults::default())
            .grant_interactive(sf(10), sf(11), sf(123), &member)
            .await
            .unwrap_err();

        assert!(matches!(err, InteractiveGrantError::RoleNotFound));
    }

    #[tokio::test]
    async fn test_interactive_permission_denied_is_distinct() {
        let platform = Arc::new(FakePlatform::ready(vec![test_guild(10, &[(11, "Member", false)])]));
        platform.forbid_role_grants().await;
        let member = test_member(123, &[]);

        let err = assigner(platform, TargetDefaults::default())
            .grant_interactive(sf(10), sf(11), sf(123), &member)
            .await
            .unwrap_err();

        assert!(matches!(err, InteractiveGrantError::PermissionDenied));
    }
}
