//! Quest generation.
//!
//! A QuestSource produces quest text for a user. The bot ships with a
//! fixed table (FallbackQuests); an external text generator can be
//! plugged in ahead of it. Whenever the generator fails or returns
//! something unusable, the table answers instead.

use crate::{rng::SubsystemRng, types::Money};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub title: String,
    pub description: String,
    pub reward: Money,
    pub time_limit_minutes: i64,
}

impl Quest {
    fn check(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            anyhow::bail!("quest text is empty");
        }
        if self.reward <= 0 {
            anyhow::bail!("quest reward {} is not positive", self.reward);
        }
        if self.time_limit_minutes <= 0 {
            anyhow::bail!("quest time limit {} is not positive", self.time_limit_minutes);
        }
        Ok(())
    }
}

pub trait QuestSource: Send {
    fn name(&self) -> &'static str;

    /// Produce a quest for the user called `username`.
    fn generate(&mut self, username: &str, rng: &mut SubsystemRng) -> anyhow::Result<Quest>;
}

struct Template {
    title: &'static str,
    description: &'static str,
    reward: Money,
    time_limit_minutes: i64,
}

const TEMPLATES: [Template; 10] = [
    Template { title: "Social Media Manager", description: "Post 5 messages in the general chat channel to boost server activity.", reward: 50, time_limit_minutes: 30 },
    Template { title: "Server Guide",         description: "Help a new member understand the server rules and channels.",           reward: 75, time_limit_minutes: 45 },
    Template { title: "Meme Maker",           description: "Create and share an original meme related to the server theme.",        reward: 60, time_limit_minutes: 20 },
    Template { title: "Discussion Starter",   description: "Start an interesting discussion that gets at least 5 replies.",         reward: 70, time_limit_minutes: 60 },
    Template { title: "Voice Chat Hero",      description: "Spend 15 minutes in a voice channel chatting with other members.",      reward: 80, time_limit_minutes: 20 },
    Template { title: "Art Showcase",         description: "Share some original artwork or creation with the community.",          reward: 90, time_limit_minutes: 30 },
    Template { title: "Emoji Reactor",        description: "React to 10 different messages with appropriate emojis.",              reward: 40, time_limit_minutes: 15 },
    Template { title: "Feedback Provider",    description: "Provide constructive feedback on someone's idea or creation.",          reward: 65, time_limit_minutes: 25 },
    Template { title: "Trivia Master",        description: "Answer 3 trivia questions correctly in the chat.",                     reward: 55, time_limit_minutes: 20 },
    Template { title: "Community Cleaner",    description: "Find and report any old messages that break the server rules.",        reward: 85, time_limit_minutes: 40 },
];

/// The built-in quest table. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackQuests;

impl FallbackQuests {
    pub fn pick(&self, username: &str, rng: &mut SubsystemRng) -> Quest {
        let t = &TEMPLATES[rng.next_index(TEMPLATES.len())];
        Quest {
            title: t.title.to_string(),
            description: format!("Hey {username}! {}", t.description),
            reward: t.reward,
            time_limit_minutes: t.time_limit_minutes,
        }
    }
}

impl QuestSource for FallbackQuests {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn generate(&mut self, username: &str, rng: &mut SubsystemRng) -> anyhow::Result<Quest> {
        Ok(self.pick(username, rng))
    }
}

/// A primary source backed by the fallback table.
pub struct QuestGenerator {
    primary: Option<Box<dyn QuestSource>>,
    fallback: FallbackQuests,
}

impl QuestGenerator {
    /// Table only.
    pub fn fallback_only() -> Self {
        Self { primary: None, fallback: FallbackQuests }
    }

    pub fn with_primary(primary: Box<dyn QuestSource>) -> Self {
        Self { primary: Some(primary), fallback: FallbackQuests }
    }

    pub fn set_primary(&mut self, primary: Box<dyn QuestSource>) {
        self.primary = Some(primary);
    }

    pub fn generate(&mut self, username: &str, rng: &mut SubsystemRng) -> Quest {
        if let Some(primary) = self.primary.as_mut() {
            match primary.generate(username, rng).and_then(|q| q.check().map(|_| q)) {
                Ok(quest) => return quest,
                Err(e) => log::error!("quest: {} generator failed, using fallback: {e}", primary.name()),
            }
        }
        self.fallback.pick(username, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, SubsystemSlot};

    struct Broken;

    impl QuestSource for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn generate(&mut self, _: &str, _: &mut SubsystemRng) -> anyhow::Result<Quest> {
            anyhow::bail!("upstream timed out")
        }
    }

    #[test]
    fn fallback_quests_greet_the_user() {
        let mut rng = RngBank::new(3).for_subsystem(SubsystemSlot::Quest);
        let quest = FallbackQuests.pick("Ada", &mut rng);
        assert!(quest.description.starts_with("Hey Ada! "));
        assert!(TEMPLATES.iter().any(|t| t.title == quest.title));
    }

    #[test]
    fn generator_failure_uses_the_table() {
        let mut rng = RngBank::new(3).for_subsystem(SubsystemSlot::Quest);
        let mut generator = QuestGenerator::with_primary(Box::new(Broken));
        let quest = generator.generate("Ada", &mut rng);
        assert!(quest.reward > 0);
        assert!(quest.description.starts_with("Hey Ada! "));
    }
}
