// Stage-2 date proposal: the answer buttons and the "no" escalation script.
use strum::{AsRefStr, Display};

pub const ACCEPT_MESSAGE: &str = "Yay! I love you bubba!! Oooooma  <3 ";
pub const PROPOSAL_PROMPT: &str = "Will you go on a date with me?";

/// Shown in order on consecutive "no" answers; the last entry repeats.
pub const ESCALATION_SCRIPT: [&str; 34] = [
    "That was clearly a misclick. No worries. Try again.",
    "I'll just pretend I didn't see that.",
    "Error: 'No' is not a valid input. Please select 'Yes'.",
    "Initiating quantum recalculation… Surely you meant 'Yes'?",
    "Nice try, but the algorithm is biased toward love.",
    "Every time you click 'No,' a duck forgets how to quack.",
    "eeeeeeeeeee",
    "404: Yes not found. Reattempting...",
    "You've activated sad mode 😢 \nTry again?",
    "Please? I already told my grandma we're going.",
    "Nice joke. Now seriously, hit yes.",
    "AI detected sarcasm. Redirecting to YES…",
    "Simulating alternate reality where you said Yes...",
    "That's okay… I'll just sit here and wait. Forever.",
    "You said no… but your heart said yes, right?",
    "I'll ask again, but this time with boba eyes 🥺",
    "Okay. But just know… you're breaking my Minecraft bed.",
    "*dramatic gasp* HOW COULD YOU.",
    "Cool cool cool… totally fine… I didn't cry or anything.",
    "Say no again and I unleash the raccoons.",
    "Every time you click 'No,' a baby carrot dies.",
    "That's fine. I didn't want to go anyway. *closes 47 tabs of date ideas*",
    "You've unlocked my final form: Sad Ninja Mode 🥷💔",
    "Even Naruto didn't give up on Sasuke… and you're giving up on me?!",
    "Wow. I gave you a love story and you said no like Juliet's dad.",
    "Are you saying baby, baby, baby… no?",
    "You said no… but my ninja way says to never give up!",
    "Are you using a genjutsu? Because this reality doesn't make sense.",
    "The next no click leads to a thousand years of pain.",
    "Bubba I'll do it fr",
    "Ain't no way",
    "This hurts more than when Zayn left 😩",
    "Story of my life 🎶 ask them out 🎵 they click no.",
    "Let me give you a helping hand <3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum DateResponse {
    Yes,
    No,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateProposalState {
    pub no_click_count: usize,
    /// Once set, the NO button answers YES. Only a restart clears it.
    pub both_buttons_yes: bool,
    pub date_accepted: bool,
}

impl DateProposalState {
    /// What a choice button labelled `pressed` actually answers.
    pub fn effective(&self, pressed: DateResponse) -> DateResponse {
        if self.both_buttons_yes {
            DateResponse::Yes
        } else {
            pressed
        }
    }

    /// Counts a refusal and returns the script line to show.
    pub fn refuse(&mut self) -> &'static str {
        self.no_click_count += 1;
        let index = escalation_index(self.no_click_count);
        if index == ESCALATION_SCRIPT.len() - 1 {
            self.both_buttons_yes = true;
        }
        ESCALATION_SCRIPT[index]
    }

    pub fn accept(&mut self) {
        self.date_accepted = true;
    }
}

/// Script index for the `count`-th refusal (1-based).
pub fn escalation_index(count: usize) -> usize {
    count.saturating_sub(1).min(ESCALATION_SCRIPT.len() - 1)
}
