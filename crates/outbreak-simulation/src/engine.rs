use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbreak_core::{Participant, ParticipantId, Signal, VenueId};
use outbreak_dsl::{AskKind, Effect, EffectResult, Host, Reply};
use rand::rngs::StdRng;

use crate::collaborators::Collaborators;

/// Runs item effects against a working copy of a participant.
#[derive(Debug, Clone)]
pub struct EffectEngine {
    collaborators: Collaborators,
    input_timeout: Duration,
}

/// A finished effect: the participant as the effect left it, and the
/// reconciled signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The working copy after the effect ran.
    pub participant: Participant,
    /// What the effect returned, or `alive`.
    pub signal: Signal,
}

impl EffectEngine {
    /// Prompts wait at most `input_timeout` for a reply.
    pub fn new(collaborators: Collaborators, input_timeout: Duration) -> Self {
        Self {
            collaborators,
            input_timeout,
        }
    }

    /// Run `effect` on a copy of `participant`. On error the copy is
    /// discarded, so the caller's record is untouched either way.
    pub async fn apply(
        &self,
        effect: &Effect,
        participant: &Participant,
        venue: VenueId,
        rng: &mut StdRng,
        now: DateTime<Utc>,
    ) -> EffectResult<Applied> {
        if participant.is_dead() {
            return Ok(Applied {
                participant: participant.clone(),
                signal: Signal::AlreadyDead,
            });
        }

        let mut working = participant.clone();
        let mut host = SessionHost {
            collaborators: &self.collaborators,
            member: participant.member_id(),
            venue,
            timeout: self.input_timeout,
        };
        let returned = effect.run(&mut working, rng, &mut host, now).await?;
        let signal = reconcile(&mut working, returned, now);
        Ok(Applied {
            participant: working,
            signal,
        })
    }
}

/// Bring the participant's state in line with the signal the effect
/// returned, and the signal in line with the state.
fn reconcile(p: &mut Participant, returned: Signal, now: DateTime<Utc>) -> Signal {
    let latched = p.settle(now).is_some();
    match returned {
        Signal::Dead => {
            p.kill(now);
            Signal::Dead
        }
        _ if latched => Signal::Dead,
        Signal::Cured => p.cure(),
        Signal::BecameHealer => {
            p.become_healer();
            Signal::BecameHealer
        }
        Signal::Alive | Signal::AlreadyDead if p.is_dead() => Signal::Dead,
        other => other,
    }
}

struct SessionHost<'a> {
    collaborators: &'a Collaborators,
    member: ParticipantId,
    venue: VenueId,
    timeout: Duration,
}

#[async_trait]
impl Host for SessionHost<'_> {
    async fn ask(&mut self, prompt: &str, kind: AskKind) -> Reply {
        let read = self.collaborators.input.read_reply(self.member, self.venue, prompt);
        match tokio::time::timeout(self.timeout, read).await {
            Ok(Ok(Some(text))) => kind.parse(&text),
            Ok(Ok(None)) => Reply::TimedOut,
            Ok(Err(e)) => {
                tracing::warn!(member = %self.member, error = %e, "input provider failed");
                Reply::TimedOut
            }
            Err(_) => {
                tracing::debug!(member = %self.member, "input timed out");
                Reply::TimedOut
            }
        }
    }

    async fn broadcast(&mut self, text: &str) {
        if let Err(e) = self.collaborators.chat.broadcast(self.venue, text).await {
            tracing::warn!(venue = %self.venue, error = %e, "broadcast failed");
        }
    }

    async fn narrate(&mut self, text: &str) {
        if let Err(e) = self.collaborators.narrative.announce(text).await {
            tracing::warn!(error = %e, "narrative announcement failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, at};
    use outbreak_dsl::compile_effect;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        at("2020-02-10T12:00:00Z")
    }

    fn infected(sickness: u32) -> Participant {
        let mut p = Participant::with_immunity(ParticipantId(9), false);
        p.infect(now());
        p.set_sickness(sickness);
        p
    }

    async fn apply(engine: &EffectEngine, source: &str, p: &Participant) -> EffectResult<Applied> {
        let effect = compile_effect(source).program.unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        engine.apply(&effect, p, VenueId(1), &mut rng, now()).await
    }

    fn engine(recorder: &Arc<Recorder>, timeout: Duration) -> EffectEngine {
        EffectEngine::new(recorder.collaborators(), timeout)
    }

    #[tokio::test]
    async fn passive_plus_ten_from_ninety_two_latches_dead() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_secs(1));
        let p = infected(92);
        let applied = apply(&engine, "add_sickness(10)", &p).await.unwrap();
        assert_eq!(applied.signal, Signal::Dead);
        assert_eq!(applied.participant.sickness(), 102);
        assert!(applied.participant.death().is_some());
        assert!(p.death().is_none());
    }

    #[tokio::test]
    async fn assignment_past_threshold_latches() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_secs(1));
        let applied = apply(&engine, "sickness = 140", &infected(50)).await.unwrap();
        assert_eq!(applied.signal, Signal::Dead);
        assert_eq!(applied.participant.sickness(), 140);
        assert!(applied.participant.is_dead());
    }

    #[tokio::test]
    async fn returned_signals_are_reconciled() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_secs(1));

        let cured = apply(&engine, "return cured", &infected(50)).await.unwrap();
        assert_eq!(cured.signal, Signal::Cured);
        assert_eq!(cured.participant.sickness(), 0);

        let dead = apply(&engine, "return dead", &infected(50)).await.unwrap();
        assert!(dead.participant.is_dead());

        let healer = apply(&engine, "return became_healer", &infected(50)).await.unwrap();
        assert!(healer.participant.healer());
    }

    #[tokio::test]
    async fn runtime_error_leaves_record_untouched() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_secs(1));
        let p = infected(50);
        let result = apply(&engine, "masked = true\nsickness = randint(9, 1)", &p).await;
        assert!(result.is_err());
        assert!(!p.masked());
    }

    #[tokio::test]
    async fn dead_participant_is_already_dead() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_secs(1));
        let mut p = infected(50);
        p.kill(now());
        let applied = apply(&engine, "masked = true", &p).await.unwrap();
        assert_eq!(applied.signal, Signal::AlreadyDead);
        assert!(!applied.participant.masked());
    }

    const ASK: &str = "let r = ask_confirm(\"Wash?\")\nif timed_out(r) {\n    broadcast(\"too slow\")\n    return alive\n}\nif r == invalid {\n    broadcast(\"what?\")\n    return alive\n}\nmasked = value_or(r, false)";

    #[tokio::test]
    async fn interactive_input_answered_invalid_and_timeout() {
        let recorder = Recorder::new();
        let engine = engine(&recorder, Duration::from_millis(200));

        recorder.queue_reply(Some("yes"));
        let applied = apply(&engine, ASK, &infected(50)).await.unwrap();
        assert!(applied.participant.masked());

        recorder.queue_reply(Some("perhaps"));
        let applied = apply(&engine, ASK, &infected(50)).await.unwrap();
        assert!(!applied.participant.masked());

        recorder.queue_reply(None);
        apply(&engine, ASK, &infected(50)).await.unwrap();

        let said: Vec<String> = recorder.broadcasts().into_iter().map(|(_, t)| t).collect();
        assert_eq!(said, vec!["what?", "too slow"]);
    }

    #[tokio::test]
    async fn slow_reply_times_out() {
        let recorder = Recorder::new();
        *recorder.reply_delay.lock().unwrap() = Some(Duration::from_secs(5));
        recorder.queue_reply(Some("yes"));
        let engine = engine(&recorder, Duration::from_millis(50));
        let applied = apply(&engine, ASK, &infected(50)).await.unwrap();
        assert!(!applied.participant.masked());
        assert_eq!(recorder.broadcasts()[0].1, "too slow");
    }
}
