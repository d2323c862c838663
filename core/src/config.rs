use crate::types::{ChannelId, Money, RoleId};
use serde::{Deserialize, Serialize};

// ── Role tables ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedRole {
    pub role_id: RoleId,
    pub name: String,
}

/// A role that may time other members out, and for how long.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutGrant {
    pub role_id: RoleId,
    pub name: String,
    pub seconds: u64,
}

/// A role that may create companies, and the base activity bonus
/// companies created under it pay out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyTier {
    pub role_id: RoleId,
    pub name: String,
    pub base_bonus: Money,
}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub daily_reward: Money,
    pub leaderboard_size: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            daily_reward: 100,
            leaderboard_size: 10,
        }
    }
}

/// Activity bonus schedule. The amount paid to an active member is
/// the tier base plus `size_bonus` once the company has more than
/// `size_threshold` members (owner included).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusPolicy {
    pub default_base: Money,
    pub tiers: Vec<CompanyTier>,
    pub size_threshold: usize,
    pub size_bonus: Money,
    pub idle_window_secs: i64,
}

impl Default for BonusPolicy {
    fn default() -> Self {
        Self {
            default_base: 10,
            tiers: vec![
                CompanyTier { role_id: 1352694494797234237, name: "level 35".into(), base_bonus: 25 },
                CompanyTier { role_id: 1352694494813749299, name: "level 50".into(), base_bonus: 50 },
            ],
            size_threshold: 5,
            size_bonus: 25,
            idle_window_secs: 3600,
        }
    }
}

impl BonusPolicy {
    pub fn tier_for(&self, role_id: Option<RoleId>) -> Option<&CompanyTier> {
        let role_id = role_id?;
        self.tiers.iter().find(|t| t.role_id == role_id)
    }

    /// Base bonus for a company created under `creator_role_id`.
    pub fn base_bonus(&self, creator_role_id: Option<RoleId>) -> Money {
        self.tier_for(creator_role_id)
            .map(|t| t.base_bonus)
            .unwrap_or(self.default_base)
    }

    pub fn has_size_bonus(&self, member_count: usize) -> bool {
        member_count > self.size_threshold
    }

    /// Bonus paid per active member of a company of `member_count`.
    pub fn activity_bonus(&self, creator_role_id: Option<RoleId>, member_count: usize) -> Money {
        let base = self.base_bonus(creator_role_id);
        if self.has_size_bonus(member_count) {
            base + self.size_bonus
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyConfig {
    pub max_members: usize,
    pub invite_timeout_secs: i64,
    pub disband_confirm_secs: i64,
    pub notification_channel_id: Option<ChannelId>,
    pub list_limit: usize,
}

impl Default for CompanyConfig {
    fn default() -> Self {
        Self {
            max_members: 10,
            invite_timeout_secs: 300,
            disband_confirm_secs: 60,
            notification_channel_id: Some(1352694495530975240),
            list_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub timeout_cost: Money,
    pub protected_roles: Vec<NamedRole>,
    pub timeout_grants: Vec<TimeoutGrant>,
    pub history_limit: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            timeout_cost: 50,
            protected_roles: vec![
                NamedRole { role_id: 1352694494843240448, name: "Owner".into() },
                NamedRole { role_id: 1352694494813749308, name: "Admin".into() },
                NamedRole { role_id: 1352694494813749307, name: "Moderator/staff".into() },
            ],
            timeout_grants: vec![
                TimeoutGrant { role_id: 1352694494797234234, name: "level 5".into(),  seconds: 10 },
                TimeoutGrant { role_id: 1352694494797234235, name: "level 10".into(), seconds: 30 },
                TimeoutGrant { role_id: 1352694494797234236, name: "level 20".into(), seconds: 60 },
                TimeoutGrant { role_id: 1352694494797234237, name: "level 35".into(), seconds: 120 },
                TimeoutGrant { role_id: 1352694494813749299, name: "level 50".into(), seconds: 300 },
            ],
            history_limit: 10,
        }
    }
}

impl ModerationConfig {
    /// The protected role a member holds, if any.
    pub fn protected_role(&self, roles: &[RoleId]) -> Option<&NamedRole> {
        self.protected_roles.iter().find(|p| roles.contains(&p.role_id))
    }

    /// The longest timeout grant among `roles`.
    pub fn best_grant(&self, roles: &[RoleId]) -> Option<&TimeoutGrant> {
        self.timeout_grants
            .iter()
            .filter(|g| roles.contains(&g.role_id))
            .max_by_key(|g| g.seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobberyConfig {
    pub min_robbers: usize,
    pub cooldown_secs: i64,
    pub min_fraction: f64,
    pub max_fraction: f64,
    pub min_take: Money,
}

impl Default for RobberyConfig {
    fn default() -> Self {
        Self {
            min_robbers: 5,
            cooldown_secs: 3600,
            min_fraction: 0.10,
            max_fraction: 0.25,
            min_take: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub cooldown_secs: i64,
    pub offer_timeout_secs: i64,
    pub success_chance: f64,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 1800,
            offer_timeout_secs: 60,
            success_chance: 0.7,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub prefix: String,
    pub version: String,
    pub economy: EconomyConfig,
    pub bonus: BonusPolicy,
    pub company: CompanyConfig,
    pub moderation: ModerationConfig,
    pub robbery: RobberyConfig,
    pub quest: QuestConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!".into(),
            version: "1.0.0".into(),
            economy: EconomyConfig::default(),
            bonus: BonusPolicy::default(),
            company: CompanyConfig::default(),
            moderation: ModerationConfig::default(),
            robbery: RobberyConfig::default(),
            quest: QuestConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file. A missing file yields the defaults;
    /// a malformed one is an error.
    /// In tests, use BotConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if !std::path::Path::new(path).exists() {
            log::info!("config: {path} not found, using built-in defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with no notification channel, so tests see exactly
    /// the notices a handler emits for users.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.company.notification_channel_id = None;
        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.prefix.is_empty() {
            anyhow::bail!("prefix must not be empty");
        }
        if self.company.max_members < 2 {
            anyhow::bail!("company.max_members must allow at least one employee");
        }
        if self.robbery.min_robbers == 0 {
            anyhow::bail!("robbery.min_robbers must be at least 1");
        }
        let r = &self.robbery;
        if !(0.0..=1.0).contains(&r.min_fraction) || r.max_fraction < r.min_fraction || r.max_fraction > 1.0 {
            anyhow::bail!("robbery fractions must satisfy 0 <= min <= max <= 1");
        }
        if !(0.0..=1.0).contains(&self.quest.success_chance) {
            anyhow::bail!("quest.success_chance must be within [0, 1]");
        }
        Ok(())
    }
}

/// Secrets provided by the environment. Never logged.
#[derive(Clone, Default)]
pub struct Secrets {
    pub bot_token: Option<String>,
    pub generator_api_key: Option<String>,
    pub session_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            bot_token: read("DISCORD_TOKEN"),
            generator_api_key: read("OPENAI_API_KEY"),
            session_secret: read("SESSION_SECRET"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<set>"))
            .field("generator_api_key", &self.generator_api_key.as_ref().map(|_| "<set>"))
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<set>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_steps_exactly_past_threshold() {
        let policy = BonusPolicy::default();
        let level35 = Some(1352694494797234237);
        assert_eq!(policy.activity_bonus(level35, 5), 25);
        assert_eq!(policy.activity_bonus(level35, 6), 50);
        assert_eq!(policy.activity_bonus(None, 1), 10);
        assert_eq!(policy.activity_bonus(Some(1352694494813749299), 6), 75);
    }

    #[test]
    fn best_grant_picks_longest_duration() {
        let moderation = ModerationConfig::default();
        let roles = [1352694494797234234, 1352694494797234236];
        let grant = moderation.best_grant(&roles).unwrap();
        assert_eq!(grant.seconds, 60);
        assert!(moderation.best_grant(&[42]).is_none());
    }

    #[test]
    fn partial_json_falls_back_to_section_defaults() {
        let config: BotConfig = serde_json::from_str(r#"{"prefix": "?", "economy": {"daily_reward": 250}}"#).unwrap();
        assert_eq!(config.prefix, "?");
        assert_eq!(config.economy.daily_reward, 250);
        assert_eq!(config.economy.leaderboard_size, 10);
        assert_eq!(config.company.max_members, 10);
        config.validate().unwrap();
    }
}
