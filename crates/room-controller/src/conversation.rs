//! Ambient room conversations.
//!
//! A periodic background task injects small, random exchanges into the
//! room through the registry coordinator's smalltalk operation. Phrases
//! with embedded newlines are spoken in segments with a brief pause
//! between them; only the first segment credits the speaker, so the rest
//! render as continuations.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::actors::RegistryHandle;

/// Pause between spoken segments of one phrase.
const PAUSE_BETWEEN_SEGMENTS: Duration = Duration::from_secs(2);

const MOUSE_SAYS: &[&str] = &[
    "Ahem.\nHello.",
    "Do you have any chewing gum?",
    "Do you smell something?\nThere's supposed to be a pony.\nI haven't found a pony yet.",
    "The answer is 42, of course.",
    "Excuse me.",
    "They say it snows in the summer here sometimes.",
    "I think I've seen you before. With the cat.",
    "I'm ever so hungry.\nI wonder what's for dinner?",
    "Do you like poetry?",
    "Oh, gross.\n\nI'm pretty sure I stepped in something.",
    "sniff",
    "boo",
    "Pssst! Try /go home",
    "Cats make me nervous.",
];

const CAT_SAYS: &[&str] = &[
    "Pfffttt!!!",
    "Zzzzzzz",
    "zzzzzzzzzzzzz",
    "Purrrrrrrr",
    "Meoooowwwww!",
];

/// One recurring speaker and their repertoire.
struct Conversation {
    /// Actor credited with the first segment of each phrase.
    speaker: &'static str,
    phrases: &'static [&'static str],
    /// Indices into `phrases` not yet spoken this cycle, in a random
    /// order. Refilled when exhausted, so no phrase repeats until the
    /// whole repertoire has been heard.
    unsaid: Vec<usize>,
}

impl Conversation {
    fn new(speaker: &'static str, phrases: &'static [&'static str]) -> Self {
        Self {
            speaker,
            phrases,
            unsaid: Vec::new(),
        }
    }

    fn next_phrase<R: Rng>(&mut self, rng: &mut R) -> &'static str {
        if self.unsaid.is_empty() {
            debug!(
                target: "room.conversation",
                speaker = self.speaker,
                "Reshuffling conversation"
            );
            self.unsaid = (0..self.phrases.len()).collect();
            self.unsaid.shuffle(rng);
        }
        match self.unsaid.pop() {
            Some(index) => self.phrases.get(index).copied().unwrap_or(""),
            None => "",
        }
    }
}

/// The conversation task state.
struct Talker {
    conversations: Vec<Conversation>,
    /// Weighted pick order: the mouse is chattier than the cat.
    weights: Vec<usize>,
    registry: RegistryHandle,
    max_interval: Duration,
    cancel_token: CancellationToken,
}

/// Spawn the ambient conversation task.
///
/// Sleeps a random interval up to `max_interval`, speaks one phrase in
/// segments, and repeats until cancelled.
pub fn spawn(
    registry: RegistryHandle,
    max_interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    let talker = Talker {
        conversations: vec![
            Conversation::new("cat", CAT_SAYS),
            Conversation::new("mouse", MOUSE_SAYS),
        ],
        weights: vec![0, 1, 1, 0, 1],
        registry,
        max_interval,
        cancel_token,
    };
    tokio::spawn(talker.run())
}

impl Talker {
    async fn run(mut self) {
        info!(target: "room.conversation", "Conversation task started");

        loop {
            // Pick timing and words outside any await so the RNG handle
            // does not live across a suspension point.
            let wait = {
                let mut rng = rand::thread_rng();
                let max_secs = self.max_interval.as_secs().max(1);
                Duration::from_secs(rng.gen_range(0..max_secs))
            };

            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }

            let (speaker, phrase) = {
                let mut rng = rand::thread_rng();
                let pick = self
                    .weights
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(0);
                match self.conversations.get_mut(pick) {
                    Some(conversation) => {
                        (conversation.speaker, conversation.next_phrase(&mut rng))
                    }
                    None => continue,
                }
            };

            debug!(target: "room.conversation", speaker, "Time to speak");

            // Segments after the first speak without credit, appearing
            // as continuations of the opening line.
            let mut credited = speaker;
            for line in phrase.split('\n') {
                if !line.is_empty() {
                    self.registry.smalltalk(line, credited);
                }
                tokio::select! {
                    () = self.cancel_token.cancelled() => return,
                    () = tokio::time::sleep(PAUSE_BETWEEN_SEGMENTS) => {}
                }
                credited = "";
            }
        }

        info!(target: "room.conversation", "Conversation task stopped");
    }
}
